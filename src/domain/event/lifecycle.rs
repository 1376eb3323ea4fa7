//! Event lifecycle state machine: PENDING -> WARNED -> ANALYZED, at most
//! once per event id per UTC day.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::{EventPhase, EventState, LifecycleAction, PostEventAnalysis, PreEventWarning};
use crate::shared::errors::LifecycleError;
use crate::shared::types::ScheduledEvent;
use crate::shared::utils::calculate_percentage_change;

/// Serializable view of the manager, used for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    pub day: NaiveDate,
    pub states: Vec<EventState>,
}

/// Result of one evaluation pass
#[derive(Debug, Default)]
pub struct EvaluationReport {
    pub actions: Vec<LifecycleAction>,
    pub faults: Vec<LifecycleError>,
    /// True if any stored state changed, including a daily reset
    pub changed: bool,
}

pub struct EventLifecycleManager {
    pre_window: Duration,
    post_window: Duration,
    day: Option<NaiveDate>,
    states: HashMap<String, EventState>,
}

impl EventLifecycleManager {
    pub fn new(pre_window_secs: i64, post_window_secs: i64) -> Self {
        Self {
            pre_window: Duration::seconds(pre_window_secs),
            post_window: Duration::seconds(post_window_secs),
            day: None,
            states: HashMap::new(),
        }
    }

    /// Restore persisted state. Ignored unless it belongs to `today`.
    pub fn restore(&mut self, snapshot: LifecycleSnapshot, today: NaiveDate) -> bool {
        if snapshot.day != today {
            debug!("Discarding lifecycle snapshot from {}", snapshot.day);
            return false;
        }
        self.day = Some(snapshot.day);
        self.states = snapshot
            .states
            .into_iter()
            .map(|s| (s.event_id.clone(), s))
            .collect();
        true
    }

    pub fn snapshot(&self) -> Option<LifecycleSnapshot> {
        let day = self.day?;
        let mut states: Vec<EventState> = self.states.values().cloned().collect();
        states.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        Some(LifecycleSnapshot { day, states })
    }

    pub fn state(&self, event_id: &str) -> Option<&EventState> {
        self.states.get(event_id)
    }

    pub fn phase(&self, event_id: &str) -> EventPhase {
        self.states
            .get(event_id)
            .map(|s| s.phase)
            .unwrap_or(EventPhase::Pending)
    }

    /// Advance every event against `now` and the poll's `price`.
    pub fn evaluate(&mut self, events: &[ScheduledEvent], now: DateTime<Utc>, price: f64) -> EvaluationReport {
        let mut report = EvaluationReport::default();
        let today = now.date_naive();
        report.changed = self.roll_day(today);

        for event in events {
            let event_time = today.and_time(event.scheduled_at_utc).and_utc();
            let time_to_event = event_time - now;

            match self.states.get_mut(&event.id) {
                None => {
                    if time_to_event >= Duration::zero() && time_to_event <= self.pre_window {
                        info!("⚠️  Pre-event window open for {} ({}s to go)", event.id, time_to_event.num_seconds());
                        self.states.insert(
                            event.id.clone(),
                            EventState {
                                event_id: event.id.clone(),
                                phase: EventPhase::Warned,
                                pre_price: Some(price),
                                warned_at: Some(now),
                            },
                        );
                        report.changed = true;
                        report.actions.push(LifecycleAction::Warn(PreEventWarning {
                            event: event.clone(),
                            price,
                            seconds_to_event: time_to_event.num_seconds(),
                        }));
                    }
                }
                Some(state) if state.phase == EventPhase::Warned => {
                    let Some(warned_at) = state.warned_at else {
                        state.phase = EventPhase::Analyzed;
                        report.changed = true;
                        report.faults.push(LifecycleError::MissingWarnedAt(event.id.clone()));
                        continue;
                    };
                    let post_event_elapsed = now - event_time >= self.post_window;
                    let since_warning_elapsed = now - warned_at >= self.post_window;
                    if !(post_event_elapsed && since_warning_elapsed) {
                        continue;
                    }

                    // Advance first so a fault or a failed follow-up can never re-trigger analysis
                    state.phase = EventPhase::Analyzed;
                    report.changed = true;

                    let Some(pre_price) = state.pre_price else {
                        report.faults.push(LifecycleError::MissingPrePrice(event.id.clone()));
                        continue;
                    };
                    let pct_change = calculate_percentage_change(pre_price, price).unwrap_or(0.0);
                    info!("📊 Post-event window reached for {} ({:+.2}%)", event.id, pct_change);

                    report.actions.push(LifecycleAction::Analyze(PostEventAnalysis {
                        event_id: event.id.clone(),
                        impact: event.impact,
                        scheduled_at_utc: event.scheduled_at_utc.format("%H:%M").to_string(),
                        pre_price,
                        current_price: price,
                        pct_change,
                        warned_at,
                    }));
                }
                Some(_) => {}
            }
        }

        report
    }

    /// Clear all states when the UTC date changes. Returns true on reset.
    fn roll_day(&mut self, today: NaiveDate) -> bool {
        match self.day {
            Some(day) if day == today => false,
            Some(day) => {
                info!("🗓️  New monitoring day {} (was {}), clearing {} event states", today, day, self.states.len());
                self.states.clear();
                self.day = Some(today);
                true
            }
            None => {
                self.day = Some(today);
                false
            }
        }
    }
}
