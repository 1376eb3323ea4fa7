use chrono::{DateTime, Timelike, Utc};

use crate::shared::types::SessionLabel;

/// Classify a UTC hour. Hours outside `0..24` wrap around the clock.
pub fn classify_session(hour_utc: u32) -> SessionLabel {
    match hour_utc % 24 {
        0..=6 => SessionLabel::Asia,
        7..=12 => SessionLabel::London,
        _ => SessionLabel::NewYork,
    }
}

pub fn current_session(now: DateTime<Utc>) -> SessionLabel {
    classify_session(now.hour())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_boundaries() {
        assert_eq!(classify_session(0), SessionLabel::Asia);
        assert_eq!(classify_session(6), SessionLabel::Asia);
        assert_eq!(classify_session(7), SessionLabel::London);
        assert_eq!(classify_session(12), SessionLabel::London);
        assert_eq!(classify_session(13), SessionLabel::NewYork);
        assert_eq!(classify_session(23), SessionLabel::NewYork);
    }

    #[test]
    fn test_every_hour_is_classified() {
        let asia = (0..24).filter(|h| classify_session(*h) == SessionLabel::Asia).count();
        let london = (0..24).filter(|h| classify_session(*h) == SessionLabel::London).count();
        let new_york = (0..24).filter(|h| classify_session(*h) == SessionLabel::NewYork).count();
        assert_eq!((asia, london, new_york), (7, 6, 11));
    }
}
