//! Economic calendar sources

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::shared::errors::SourceError;
use crate::shared::types::{CalendarRecord, ScheduledEvent};

/// Supplies today's scheduled events
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch_events(&self) -> Result<Vec<ScheduledEvent>, SourceError>;
}

/// Fixed list of events, typically from the config file
#[derive(Debug, Clone, Default)]
pub struct StaticCalendar {
    events: Vec<ScheduledEvent>,
}

impl StaticCalendar {
    pub fn new(events: Vec<ScheduledEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl CalendarSource for StaticCalendar {
    async fn fetch_events(&self) -> Result<Vec<ScheduledEvent>, SourceError> {
        Ok(self.events.clone())
    }
}

/// Convert wire records, skipping entries with an unreadable time.
pub fn records_to_events(records: Vec<CalendarRecord>) -> Vec<ScheduledEvent> {
    records
        .into_iter()
        .filter_map(|record| match ScheduledEvent::try_from(record) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Skipping calendar record: {}", e);
                None
            }
        })
        .collect()
}

/// Remote calendar returning a JSON array of `{event, impact, time_utc}`
pub struct HttpCalendar {
    client: Client,
    url: String,
}

impl HttpCalendar {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SourceError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl CalendarSource for HttpCalendar {
    async fn fetch_events(&self) -> Result<Vec<ScheduledEvent>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!("calendar returned {}", response.status())));
        }

        let records: Vec<CalendarRecord> = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidPayload(e.to_string()))?;

        let events = records_to_events(records);
        debug!("Fetched {} calendar events", events.len());
        Ok(events)
    }
}
