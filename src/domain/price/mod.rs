//! Price domain - shock detection and daily level monitoring

mod shock_detector;
mod level_monitor;

pub use shock_detector::detect_shock;
pub use level_monitor::{check_level_break, LevelMonitor};

use serde::Serialize;

/// Direction of an abrupt move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Spike,
    Dump,
}

/// Single-poll move beyond a configured threshold. Lives for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShockEvent {
    pub previous: f64,
    pub current: f64,
    pub pct_change: f64,
    pub direction: Direction,
}

/// Price at or beyond a daily level
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum BreakEvent {
    BreakHigh { level: f64, price: f64 },
    BreakLow { level: f64, price: f64 },
}
