//! Domain layer - detectors and the event lifecycle state machine

pub mod event;
pub mod price;
pub mod session;
