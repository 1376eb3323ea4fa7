//! Outbound channels: operator notifications and narrative generation

pub mod narrative;
pub mod notifier;

pub use narrative::{NarrativeGenerator, OpenAiNarrator};
pub use notifier::{AlertDispatcher, LogDispatcher, TelegramDispatcher};
