//! Event domain - per-event warning/analysis lifecycle

mod lifecycle;

pub use lifecycle::{EvaluationReport, EventLifecycleManager, LifecycleSnapshot};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::types::ScheduledEvent;

/// Lifecycle phase. `Pending` is implicit: no stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPhase {
    Pending,
    Warned,
    Analyzed,
}

/// Tracked state of one event for the current monitoring day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventState {
    pub event_id: String,
    pub phase: EventPhase,
    /// Set once at the warning transition, never changed afterwards
    pub pre_price: Option<f64>,
    pub warned_at: Option<DateTime<Utc>>,
}

/// One-time warning ahead of a scheduled event
#[derive(Debug, Clone, PartialEq)]
pub struct PreEventWarning {
    pub event: ScheduledEvent,
    pub price: f64,
    pub seconds_to_event: i64,
}

/// Facts handed to the narrative generator and the post-event message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostEventAnalysis {
    pub event_id: String,
    pub impact: crate::shared::types::Impact,
    pub scheduled_at_utc: String,
    pub pre_price: f64,
    pub current_price: f64,
    pub pct_change: f64,
    pub warned_at: DateTime<Utc>,
}

/// Transition emitted by the lifecycle manager
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleAction {
    Warn(PreEventWarning),
    Analyze(PostEventAnalysis),
}
