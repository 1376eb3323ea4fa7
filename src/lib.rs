//! XAU Watchdog - XAUUSD price shock, daily level and economic event alerts
//! Built with Domain-Driven Design principles

pub mod domain;
pub mod infrastructure;
pub mod application;
pub mod shared;

// Re-export main types for convenience
pub use application::{Watchdog, WatchdogContext, WatchdogHandle};
pub use domain::event::EventLifecycleManager;
pub use domain::price::{detect_shock, LevelMonitor};
pub use domain::session::classify_session;
pub use shared::config::{ConfigLoader, WatchdogConfig};
pub use shared::errors::AppError;
