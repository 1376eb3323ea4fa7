//! Shock detection against the immediately preceding sample

use super::{Direction, ShockEvent};
use crate::shared::utils::{calculate_percentage_change, PCT_EPSILON};

/// Classify the move from `previous` to `current`.
///
/// Returns `None` when there is no baseline yet, when the baseline is not a
/// positive price, or when the move stays inside both thresholds. The caller
/// owns the baseline and should replace it with `current` after every
/// successful poll, whether or not a shock fired.
pub fn detect_shock(
    previous: Option<f64>,
    current: f64,
    spike_threshold: f64,
    dump_threshold: f64,
) -> Option<ShockEvent> {
    let previous = previous?;
    let pct_change = calculate_percentage_change(previous, current)?;

    let direction = if pct_change >= spike_threshold - PCT_EPSILON {
        Direction::Spike
    } else if pct_change <= dump_threshold + PCT_EPSILON {
        Direction::Dump
    } else {
        return None;
    };

    Some(ShockEvent {
        previous,
        current,
        pct_change,
        direction,
    })
}
