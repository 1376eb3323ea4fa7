//! Session domain - maps a UTC hour to a trading session label

mod session_classifier;

pub use session_classifier::{classify_session, current_session};
