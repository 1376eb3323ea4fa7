//! Price webhook ingress.
//!
//! - `POST /price` - `{"price": <number>, "time": <string>}` written into the shared cell
//! - `GET /health` - liveness probe

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use super::price_source::SharedPriceCell;
use crate::shared::errors::{AppError, IngressError};
use crate::shared::types::PriceSample;

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    price: f64,
    #[serde(default)]
    time: Option<String>,
}

/// Response body for `POST /price`
#[derive(Debug, Serialize, PartialEq)]
pub struct IngestResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parse the sender's timestamp. Accepts RFC 3339 and the common
/// `YYYY-MM-DD HH:MM:SS` / `YYYY.MM.DD HH:MM:SS` forms, read as UTC.
fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y.%m.%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|t| t.and_utc())
}

/// Validate an inbound body. An unreadable `time` falls back to `received_at`.
pub fn parse_payload(body: &str, received_at: DateTime<Utc>) -> Result<PriceSample, IngressError> {
    let payload: WebhookPayload = serde_json::from_str(body).map_err(|e| IngressError::Malformed(e.to_string()))?;
    let observed_at = payload
        .time
        .as_deref()
        .and_then(parse_time)
        .unwrap_or(received_at);
    PriceSample::new(payload.price, observed_at)
}

async fn ingest_price(State(cell): State<SharedPriceCell>, body: String) -> (StatusCode, Json<IngestResponse>) {
    let received_at = Utc::now();
    match parse_payload(&body, received_at) {
        Ok(sample) => {
            cell.store(sample, received_at).await;
            (
                StatusCode::OK,
                Json(IngestResponse {
                    status: "ok",
                    price: Some(sample.value),
                    error: None,
                }),
            )
        }
        Err(e) => {
            warn!("Rejected webhook payload: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(IngestResponse {
                    status: "rejected",
                    price: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

pub fn create_router(cell: SharedPriceCell) -> Router {
    Router::new()
        .route("/price", post(ingest_price))
        .route("/health", get(health))
        .with_state(cell)
}

/// Bind the webhook address. Done up front so a taken port fails the
/// command instead of leaving the loop without price ingress.
pub async fn bind(addr: &str) -> Result<TcpListener, AppError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::ConfigError(format!("cannot bind price webhook on {}: {}", addr, e)))
}

/// Serve the webhook on `listener` until `shutdown` flips to true.
pub async fn serve(listener: TcpListener, cell: SharedPriceCell, mut shutdown: watch::Receiver<bool>) -> Result<(), AppError> {
    if let Ok(addr) = listener.local_addr() {
        info!("🌐 Price webhook listening on {}", addr);
    }

    axum::serve(listener, create_router(cell))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    info!("Price webhook stopped");
    Ok(())
}
