//! On-demand market intelligence report.
//!
//! Three chained generator calls: a market narrative, a scenario tree built
//! on that narrative, and the expected behaviour of the current session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use super::narration::generate_with_timeout;
use crate::infrastructure::NarrativeGenerator;
use crate::shared::errors::GenerationError;
use crate::shared::types::{DailyLevels, ScheduledEvent, SessionLabel};
use crate::shared::utils::format_price;

/// Market data the report is built from
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub levels: Option<DailyLevels>,
    pub events: Vec<ScheduledEvent>,
    pub session: SessionLabel,
}

impl MarketSnapshot {
    fn price_line(&self) -> String {
        match self.levels {
            Some(l) => format!(
                "current {}, daily high {}, daily low {}",
                format_price(self.price),
                format_price(l.high),
                format_price(l.low)
            ),
            None => format!("current {}", format_price(self.price)),
        }
    }

    fn calendar_line(&self) -> String {
        if self.events.is_empty() {
            return "no scheduled events".to_string();
        }
        self.events
            .iter()
            .map(|e| format!("{} ({} impact, {} UTC)", e.id, e.impact, e.scheduled_at_utc.format("%H:%M")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntelReport {
    pub session: SessionLabel,
    pub market_narrative: String,
    pub scenario_tree: String,
    pub session_behavior: String,
    pub generated_at: DateTime<Utc>,
}

impl IntelReport {
    pub fn to_message(&self, symbol: &str) -> String {
        format!(
            "🧭 {} MARKET INTELLIGENCE\n\
             Session: {}\n\
             {}\n\n\
             === MARKET NARRATIVE ===\n{}\n\n\
             === SCENARIO TREE ===\n{}\n\n\
             === SESSION BEHAVIOR ===\n{}",
            symbol,
            self.session,
            self.generated_at.format("%Y-%m-%d %H:%M UTC"),
            self.market_narrative,
            self.scenario_tree,
            self.session_behavior
        )
    }
}

fn narrative_prompt(snapshot: &MarketSnapshot) -> String {
    format!(
        "DATA:\n\
         Price: {}\n\
         Calendar: {}\n\
         Session: {}\n\n\
         TASK:\n\
         Write today's market narrative for {}.\n\n\
         FOCUS:\n\
         - Who is in control (positioning, institutions or the event calendar)\n\
         - Character of the movement (calm, aggressive, erratic)\n\
         - Main risk to watch",
        snapshot.price_line(),
        snapshot.calendar_line(),
        snapshot.session,
        snapshot.symbol
    )
}

fn scenario_prompt(snapshot: &MarketSnapshot, narrative: &str) -> String {
    format!(
        "DATA:\n\
         Price: {}\n\
         Market narrative: {}\n\
         Calendar: {}\n\n\
         TASK:\n\
         Build a scenario tree for {}.\n\n\
         REQUIRED FORMAT:\n\
         Primary scenario (probability %):\n\
         Secondary scenario (probability %):\n\
         Tail risk scenario (probability %):\n\n\
         Give direction and price range for each.",
        snapshot.price_line(),
        narrative,
        snapshot.calendar_line(),
        snapshot.symbol
    )
}

fn session_prompt(snapshot: &MarketSnapshot, narrative: &str) -> String {
    format!(
        "DATA:\n\
         Session: {}\n\
         Price: {}\n\
         Market narrative: {}\n\n\
         TASK:\n\
         Analyse how {} usually trades in the {} session today.\n\n\
         FOCUS:\n\
         - Range, continuation or reversal\n\
         - Implication for the intraday bias",
        snapshot.session,
        snapshot.price_line(),
        narrative,
        snapshot.symbol,
        snapshot.session
    )
}

/// Build the full report. Any failed step aborts the whole report.
pub async fn run_intelligence(
    narrator: &dyn NarrativeGenerator,
    snapshot: &MarketSnapshot,
    limit: Duration,
    now: DateTime<Utc>,
) -> Result<IntelReport, GenerationError> {
    info!("🧭 Building intelligence report for {} at {}", snapshot.symbol, format_price(snapshot.price));

    let market_narrative = generate_with_timeout(narrator, &narrative_prompt(snapshot), limit).await?;
    let scenario_tree = generate_with_timeout(narrator, &scenario_prompt(snapshot, &market_narrative), limit).await?;
    let session_behavior = generate_with_timeout(narrator, &session_prompt(snapshot, &market_narrative), limit).await?;

    Ok(IntelReport {
        session: snapshot.session,
        market_narrative,
        scenario_tree,
        session_behavior,
        generated_at: now,
    })
}
