//! Error handling for the application

use thiserror::Error;

/// Price or calendar source errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Source timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid source payload: {0}")]
    InvalidPayload(String),
}

/// Notification delivery errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("Delivery failed: {0}")]
    Transport(String),

    #[error("Delivery rejected by channel: {0}")]
    Rejected(String),
}

/// Narrative generation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Narrative generation timed out after {0}s")]
    Timeout(u64),

    #[error("Narrative service error: {0}")]
    Remote(String),

    #[error("Narrative service returned an empty response")]
    EmptyResponse,
}

/// Inbound price payload errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngressError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Price must be positive and finite, got {0}")]
    NonPositivePrice(f64),
}

/// Event lifecycle logic errors. These indicate a broken invariant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("Event {0} reached analysis without a pre-event price")]
    MissingPrePrice(String),

    #[error("Event {0} reached analysis without a warning timestamp")]
    MissingWarnedAt(String),
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("State persistence error: {0}")]
    StateError(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Ingress(#[from] IngressError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
