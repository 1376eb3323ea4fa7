//! Operator-facing message text

use chrono::{DateTime, Utc};

use crate::domain::event::{PostEventAnalysis, PreEventWarning};
use crate::domain::price::{BreakEvent, Direction, ShockEvent};
use crate::shared::types::{DailyLevels, SessionLabel};
use crate::shared::utils::{format_pct, format_price};

fn stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub struct StartupInfo<'a> {
    pub symbol: &'a str,
    pub session: SessionLabel,
    pub spike_pct: f64,
    pub dump_pct: f64,
    pub levels: Option<DailyLevels>,
    pub event_count: usize,
    pub price_source: &'a str,
}

pub fn startup(info: &StartupInfo<'_>, now: DateTime<Utc>) -> String {
    let levels = match info.levels {
        Some(l) => format!("{} / {}", format_price(l.high), format_price(l.low)),
        None => "not set".to_string(),
    };
    format!(
        "🟢 {} watchdog online\n\
         Session: {}\n\
         Shock thresholds: {} / {}\n\
         Daily high / low: {}\n\
         Events today: {}\n\
         Price source: {}\n\
         {}",
        info.symbol,
        info.session,
        format_pct(info.spike_pct),
        format_pct(info.dump_pct),
        levels,
        info.event_count,
        info.price_source,
        stamp(now)
    )
}

pub fn shock(symbol: &str, shock: &ShockEvent, session: SessionLabel, now: DateTime<Utc>) -> String {
    let headline = match shock.direction {
        Direction::Spike => "🚀 PRICE SPIKE",
        Direction::Dump => "🩸 PRICE DUMP",
    };
    format!(
        "{} {}\n\
         {} → {} ({})\n\
         Session: {}\n\
         {}",
        headline,
        symbol,
        format_price(shock.previous),
        format_price(shock.current),
        format_pct(shock.pct_change),
        session,
        stamp(now)
    )
}

pub fn level_break(symbol: &str, event: &BreakEvent, session: SessionLabel, now: DateTime<Utc>) -> String {
    let (headline, level, price) = match *event {
        BreakEvent::BreakHigh { level, price } => ("📈 DAILY HIGH BREAK", level, price),
        BreakEvent::BreakLow { level, price } => ("📉 DAILY LOW BREAK", level, price),
    };
    format!(
        "{} {}\n\
         Price {} vs level {}\n\
         Session: {}\n\
         {}",
        headline,
        symbol,
        format_price(price),
        format_price(level),
        session,
        stamp(now)
    )
}

pub fn pre_event_warning(symbol: &str, warning: &PreEventWarning, session: SessionLabel, now: DateTime<Utc>) -> String {
    format!(
        "⚠️ EVENT RISK: {}\n\
         Impact: {}\n\
         Scheduled: {} UTC (in {} min)\n\
         {} price: {}\n\
         Session: {}\n\
         {}\n\
         Expect volatility, manage exposure.",
        warning.event.id,
        warning.event.impact,
        warning.event.scheduled_at_utc.format("%H:%M"),
        (warning.seconds_to_event + 59) / 60,
        symbol,
        format_price(warning.price),
        session,
        stamp(now)
    )
}

/// Post-event message. Without a narrative it carries the plain facts only.
pub fn post_event_analysis(
    symbol: &str,
    analysis: &PostEventAnalysis,
    narrative: Option<&str>,
    session: SessionLabel,
    now: DateTime<Utc>,
) -> String {
    let mut message = format!(
        "📊 POST-EVENT: {}\n\
         Impact: {} | Scheduled: {} UTC\n\
         {} before: {}\n\
         {} now: {}\n\
         Change: {}\n\
         Session: {}\n\
         {}",
        analysis.event_id,
        analysis.impact,
        analysis.scheduled_at_utc,
        symbol,
        format_price(analysis.pre_price),
        symbol,
        format_price(analysis.current_price),
        format_pct(analysis.pct_change),
        session,
        stamp(now)
    );
    if let Some(text) = narrative {
        message.push_str("\n\n🧠 Analysis\n");
        message.push_str(text);
    }
    message
}

pub fn source_unavailable(symbol: &str, reason: &str, retry_in_secs: u64, now: DateTime<Utc>) -> String {
    format!(
        "🔌 {} price feed unavailable\n\
         Reason: {}\n\
         Retrying in {}s\n\
         {}",
        symbol,
        reason,
        retry_in_secs,
        stamp(now)
    )
}

pub fn diagnostic(symbol: &str, error: &str, now: DateTime<Utc>) -> String {
    format!(
        "🛠️ {} watchdog internal error\n\
         {}\n\
         Monitoring continues.\n\
         {}",
        symbol,
        error,
        stamp(now)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::{Impact, ScheduledEvent};
    use chrono::{NaiveTime, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 13, 5, 0).unwrap()
    }

    fn analysis() -> PostEventAnalysis {
        PostEventAnalysis {
            event_id: "US CPI".to_string(),
            impact: Impact::High,
            scheduled_at_utc: "13:30".to_string(),
            pre_price: 4550.0,
            current_price: 4595.5,
            pct_change: 1.0,
            warned_at: now(),
        }
    }

    #[test]
    fn test_shock_message() {
        let event = ShockEvent {
            previous: 4550.0,
            current: 4586.4,
            pct_change: 0.8,
            direction: Direction::Spike,
        };
        let text = shock("XAUUSD", &event, SessionLabel::NewYork, now());
        assert!(text.contains("PRICE SPIKE XAUUSD"));
        assert!(text.contains("4550.00 → 4586.40 (+0.80%)"));
        assert!(text.contains("New York"));
    }

    #[test]
    fn test_pre_event_warning_message() {
        let warning = PreEventWarning {
            event: ScheduledEvent::new("US CPI", Impact::High, NaiveTime::from_hms_opt(13, 30, 0).unwrap()),
            price: 4550.0,
            seconds_to_event: 1500,
        };
        let text = pre_event_warning("XAUUSD", &warning, SessionLabel::NewYork, now());
        assert!(text.contains("EVENT RISK: US CPI"));
        assert!(text.contains("Impact: High"));
        assert!(text.contains("in 25 min"));
        assert!(text.contains("XAUUSD price: 4550.00"));
        assert!(text.contains("2026-03-10 13:05 UTC"));
    }

    #[test]
    fn test_post_event_with_and_without_narrative() {
        let plain = post_event_analysis("XAUUSD", &analysis(), None, SessionLabel::NewYork, now());
        assert!(plain.contains("XAUUSD before: 4550.00"));
        assert!(plain.contains("XAUUSD now: 4595.50"));
        assert!(plain.contains("Change: +1.00%"));
        assert!(!plain.contains("Analysis"));

        let rich = post_event_analysis("XAUUSD", &analysis(), Some("Buyers absorbed the print."), SessionLabel::NewYork, now());
        assert!(rich.ends_with("Buyers absorbed the print."));
    }

    #[test]
    fn test_level_break_message() {
        let text = level_break(
            "XAUUSD",
            &BreakEvent::BreakLow { level: 4480.0, price: 4479.5 },
            SessionLabel::Asia,
            now(),
        );
        assert!(text.contains("DAILY LOW BREAK"));
        assert!(text.contains("Price 4479.50 vs level 4480.00"));
    }
}
