//! Common types used across the application

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::errors::IngressError;

/// A single observation of the tracked instrument's price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    /// Build a sample, rejecting non-positive or non-finite prices.
    pub fn new(value: f64, observed_at: DateTime<Utc>) -> Result<Self, IngressError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(IngressError::NonPositivePrice(value));
        }
        Ok(Self { value, observed_at })
    }
}

/// Daily high/low band for the instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyLevels {
    pub high: f64,
    pub low: f64,
}

impl DailyLevels {
    pub fn new(high: f64, low: f64) -> Option<Self> {
        if high >= low {
            Some(Self { high, low })
        } else {
            None
        }
    }
}

/// Economic event impact rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Low => "Low",
            Impact::Medium => "Medium",
            Impact::High => "High",
        }
    }
}

impl FromStr for Impact {
    type Err = String;

    /// Case-insensitive, so feeds sending `HIGH` or `high` still parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Impact::Low),
            "medium" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            other => Err(format!("unknown impact '{}'", other)),
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar entry. `scheduled_at_utc` is a time of day, so the same
/// `id` recurs every day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub id: String,
    pub impact: Impact,
    pub scheduled_at_utc: NaiveTime,
}

impl ScheduledEvent {
    pub fn new(id: impl Into<String>, impact: Impact, scheduled_at_utc: NaiveTime) -> Self {
        Self {
            id: id.into(),
            impact,
            scheduled_at_utc,
        }
    }
}

/// Calendar record as it travels over the wire and in config files.
/// Fields stay raw strings so one bad record can be skipped on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRecord {
    pub event: String,
    pub impact: String,
    pub time_utc: String,
}

impl TryFrom<CalendarRecord> for ScheduledEvent {
    type Error = String;

    fn try_from(record: CalendarRecord) -> Result<Self, Self::Error> {
        let impact = record
            .impact
            .parse::<Impact>()
            .map_err(|e| format!("invalid impact for {}: {}", record.event, e))?;
        let time = NaiveTime::parse_from_str(record.time_utc.trim(), "%H:%M")
            .map_err(|e| format!("invalid time_utc '{}' for {}: {}", record.time_utc, record.event, e))?;
        Ok(ScheduledEvent::new(record.event, impact, time))
    }
}

/// Trading session bucket, used for message annotation only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionLabel {
    Asia,
    London,
    NewYork,
}

impl SessionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionLabel::Asia => "Asia",
            SessionLabel::London => "London",
            SessionLabel::NewYork => "New York",
        }
    }
}

impl fmt::Display for SessionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
