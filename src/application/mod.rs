//! Application layer - the watchdog loop, reports and CLI commands

pub mod commands;
pub mod intel;
pub mod messages;
pub mod narration;
pub mod watchdog;

pub use commands::{Cli, CommandExecutor, Commands, RunArgs};
pub use intel::{run_intelligence, IntelReport, MarketSnapshot};
pub use watchdog::{Clock, PollOutcome, SystemClock, Watchdog, WatchdogContext, WatchdogHandle, WatchdogSettings, WatchdogStats};
