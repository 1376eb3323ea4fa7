//! Infrastructure layer - external collaborators behind async traits

pub mod channels;
pub mod feeds;
pub mod state_store;

pub use channels::{AlertDispatcher, LogDispatcher, NarrativeGenerator, OpenAiNarrator, TelegramDispatcher};
pub use feeds::{CalendarSource, HttpCalendar, HttpPriceSource, PriceSource, SharedPriceCell, StaticCalendar, WebhookPriceSource};
pub use state_store::StateStore;
