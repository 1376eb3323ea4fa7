//! Price source adapters: HTTP poll and the webhook-fed shared cell

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::shared::errors::SourceError;
use crate::shared::types::PriceSample;

/// Supplies the latest price sample
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn latest(&self) -> Result<PriceSample, SourceError>;

    /// Short label for logs
    fn name(&self) -> &str;
}

/// Quote body returned by the polled endpoint
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuotePayload {
    Last { price: f64 },
    BidAsk { bid: f64, ask: f64 },
}

/// Parse `{price}` or `{bid, ask}`. The mid is used for bid/ask quotes.
pub fn parse_quote(body: &str, observed_at: DateTime<Utc>) -> Result<PriceSample, SourceError> {
    let payload: QuotePayload =
        serde_json::from_str(body).map_err(|e| SourceError::InvalidPayload(format!("unrecognised quote: {}", e)))?;

    let value = match payload {
        QuotePayload::Last { price } => price,
        QuotePayload::BidAsk { bid, ask } => (bid + ask) / 2.0,
    };

    PriceSample::new(value, observed_at).map_err(|e| SourceError::InvalidPayload(e.to_string()))
}

/// Polls a JSON quote endpoint
pub struct HttpPriceSource {
    client: Client,
    url: String,
}

impl HttpPriceSource {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SourceError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn latest(&self) -> Result<PriceSample, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!("quote endpoint returned {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        let sample = parse_quote(&body, Utc::now())?;
        debug!("Polled price {:.2}", sample.value);
        Ok(sample)
    }

    fn name(&self) -> &str {
        "http-poll"
    }
}

#[derive(Debug, Clone, Copy)]
struct Received {
    sample: PriceSample,
    received_at: DateTime<Utc>,
}

/// Latest-price cell shared between the webhook handler (writer) and the
/// watchdog loop (reader). Readers always see a whole sample.
#[derive(Debug, Clone, Default)]
pub struct SharedPriceCell {
    inner: Arc<RwLock<Option<Received>>>,
}

impl SharedPriceCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store(&self, sample: PriceSample, received_at: DateTime<Utc>) {
        *self.inner.write().await = Some(Received { sample, received_at });
    }

    pub async fn load(&self) -> Option<PriceSample> {
        let guard = self.inner.read().await;
        guard.as_ref().map(|r| r.sample)
    }

    async fn load_received(&self) -> Option<Received> {
        let guard = self.inner.read().await;
        *guard
    }
}

/// Reads the shared cell written by the webhook
pub struct WebhookPriceSource {
    cell: SharedPriceCell,
    max_age: Duration,
}

impl WebhookPriceSource {
    pub fn new(cell: SharedPriceCell, max_age_secs: u64) -> Self {
        Self {
            cell,
            max_age: Duration::seconds(max_age_secs as i64),
        }
    }
}

#[async_trait]
impl PriceSource for WebhookPriceSource {
    async fn latest(&self) -> Result<PriceSample, SourceError> {
        let received = self
            .cell
            .load_received()
            .await
            .ok_or_else(|| SourceError::Unavailable("no webhook price received yet".to_string()))?;

        let age = Utc::now() - received.received_at;
        if age > self.max_age {
            return Err(SourceError::Unavailable(format!(
                "webhook price is stale ({}s old)",
                age.num_seconds()
            )));
        }
        Ok(received.sample)
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_last_price() {
        let sample = parse_quote(r#"{"price": 4550.25}"#, Utc::now()).unwrap();
        assert_eq!(sample.value, 4550.25);
    }

    #[test]
    fn test_parse_bid_ask_uses_mid() {
        let sample = parse_quote(r#"{"bid": 4550.0, "ask": 4551.0, "symbol": "XAUUSD"}"#, Utc::now()).unwrap();
        assert_eq!(sample.value, 4550.5);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_quote("not json", Utc::now()), Err(SourceError::InvalidPayload(_))));
        assert!(matches!(parse_quote(r#"{"last": 1.0}"#, Utc::now()), Err(SourceError::InvalidPayload(_))));
        assert!(matches!(parse_quote(r#"{"price": 0}"#, Utc::now()), Err(SourceError::InvalidPayload(_))));
        assert!(matches!(parse_quote(r#"{"price": -3.5}"#, Utc::now()), Err(SourceError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_webhook_source_requires_a_sample() {
        let cell = SharedPriceCell::new();
        let source = WebhookPriceSource::new(cell.clone(), 300);
        assert!(matches!(source.latest().await, Err(SourceError::Unavailable(_))));

        let now = Utc::now();
        cell.store(PriceSample::new(4550.0, now).unwrap(), now).await;
        assert_eq!(source.latest().await.unwrap().value, 4550.0);
    }

    #[tokio::test]
    async fn test_webhook_source_rejects_stale_sample() {
        let cell = SharedPriceCell::new();
        let source = WebhookPriceSource::new(cell.clone(), 60);
        let old = Utc::now() - Duration::seconds(120);
        cell.store(PriceSample::new(4550.0, old).unwrap(), old).await;

        let err = source.latest().await.unwrap_err();
        assert!(err.to_string().contains("stale"));
    }
}
