//! Daily high/low breakout monitoring

use super::BreakEvent;
use crate::shared::config::BreakMode;
use crate::shared::types::DailyLevels;

/// Stateless level check: `BreakHigh` at or above the high, `BreakLow` at or
/// below the low.
pub fn check_level_break(current: f64, levels: &DailyLevels) -> Option<BreakEvent> {
    if current >= levels.high {
        Some(BreakEvent::BreakHigh { level: levels.high, price: current })
    } else if current <= levels.low {
        Some(BreakEvent::BreakLow { level: levels.low, price: current })
    } else {
        None
    }
}

/// Applies the configured break mode on top of [`check_level_break`].
#[derive(Debug, Clone)]
pub struct LevelMonitor {
    levels: DailyLevels,
    mode: BreakMode,
    high_armed: bool,
    low_armed: bool,
}

impl LevelMonitor {
    pub fn new(levels: DailyLevels, mode: BreakMode) -> Self {
        Self {
            levels,
            mode,
            high_armed: true,
            low_armed: true,
        }
    }

    pub fn levels(&self) -> &DailyLevels {
        &self.levels
    }

    /// Replace the band, e.g. for a new session. Re-arms both sides.
    pub fn set_levels(&mut self, levels: DailyLevels) {
        self.levels = levels;
        self.high_armed = true;
        self.low_armed = true;
    }

    pub fn evaluate(&mut self, current: f64) -> Option<BreakEvent> {
        let event = check_level_break(current, &self.levels);
        if self.mode == BreakMode::Repeat {
            return event;
        }

        match event {
            Some(BreakEvent::BreakHigh { .. }) => {
                self.low_armed = true;
                if self.high_armed {
                    self.high_armed = false;
                    event
                } else {
                    None
                }
            }
            Some(BreakEvent::BreakLow { .. }) => {
                self.high_armed = true;
                if self.low_armed {
                    self.low_armed = false;
                    event
                } else {
                    None
                }
            }
            None => {
                self.high_armed = true;
                self.low_armed = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> DailyLevels {
        DailyLevels::new(4620.0, 4480.0).unwrap()
    }

    #[test]
    fn test_break_high_is_inclusive() {
        assert_eq!(
            check_level_break(4620.0, &levels()),
            Some(BreakEvent::BreakHigh { level: 4620.0, price: 4620.0 })
        );
        assert_eq!(check_level_break(4619.9, &levels()), None);
    }

    #[test]
    fn test_break_low_is_inclusive() {
        assert_eq!(
            check_level_break(4480.0, &levels()),
            Some(BreakEvent::BreakLow { level: 4480.0, price: 4480.0 })
        );
        assert_eq!(check_level_break(4480.1, &levels()), None);
    }

    #[test]
    fn test_repeat_mode_fires_every_poll() {
        let mut monitor = LevelMonitor::new(levels(), BreakMode::Repeat);
        assert!(monitor.evaluate(4625.0).is_some());
        assert!(monitor.evaluate(4630.0).is_some());
        assert!(monitor.evaluate(4621.0).is_some());
    }

    #[test]
    fn test_one_shot_rearms_inside_band() {
        let mut monitor = LevelMonitor::new(levels(), BreakMode::OneShot);
        assert!(monitor.evaluate(4625.0).is_some());
        assert!(monitor.evaluate(4630.0).is_none());
        assert!(monitor.evaluate(4620.0).is_none());

        // back inside the band re-arms the high side
        assert!(monitor.evaluate(4600.0).is_none());
        assert!(monitor.evaluate(4621.0).is_some());
    }

    #[test]
    fn test_one_shot_sides_are_independent() {
        let mut monitor = LevelMonitor::new(levels(), BreakMode::OneShot);
        assert!(matches!(monitor.evaluate(4470.0), Some(BreakEvent::BreakLow { .. })));
        assert!(monitor.evaluate(4460.0).is_none());
        assert!(matches!(monitor.evaluate(4625.0), Some(BreakEvent::BreakHigh { .. })));
    }

    #[test]
    fn test_set_levels_rearms() {
        let mut monitor = LevelMonitor::new(levels(), BreakMode::OneShot);
        assert!(monitor.evaluate(4625.0).is_some());
        monitor.set_levels(DailyLevels::new(4624.0, 4500.0).unwrap());
        assert!(monitor.evaluate(4625.0).is_some());
        assert_eq!(monitor.levels().high, 4624.0);
    }
}
