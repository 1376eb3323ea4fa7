//! Prompt construction and bounded calls to the narrative generator

use std::time::Duration;
use tokio::time::timeout;

use crate::domain::event::PostEventAnalysis;
use crate::infrastructure::NarrativeGenerator;
use crate::shared::errors::GenerationError;
use crate::shared::types::SessionLabel;
use crate::shared::utils::{format_pct, format_price};

/// Call the generator, failing with `GenerationError::Timeout` if it hangs.
pub async fn generate_with_timeout(
    narrator: &dyn NarrativeGenerator,
    prompt: &str,
    limit: Duration,
) -> Result<String, GenerationError> {
    match timeout(limit, narrator.generate(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout(limit.as_secs())),
    }
}

/// Facts for a post-event risk commentary
pub fn post_event_prompt(symbol: &str, analysis: &PostEventAnalysis, session: SessionLabel) -> String {
    format!(
        "DATA:\n\
         Instrument: {symbol}\n\
         Event: {} (impact {}, scheduled {} UTC)\n\
         Price before event: {}\n\
         Price now: {}\n\
         Change: {}\n\
         Session: {session}\n\n\
         TASK:\n\
         Explain in a few sentences how {symbol} reacted to this event, \
         whether the move looks like continuation or a fade, and the main risk for the rest of the session.",
        analysis.event_id,
        analysis.impact,
        analysis.scheduled_at_utc,
        format_price(analysis.pre_price),
        format_price(analysis.current_price),
        format_pct(analysis.pct_change),
    )
}
