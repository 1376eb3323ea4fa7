//! Inbound data: price samples and the economic calendar

pub mod calendar;
pub mod price_source;
pub mod webhook;

pub use calendar::{CalendarSource, HttpCalendar, StaticCalendar};
pub use price_source::{HttpPriceSource, PriceSource, SharedPriceCell, WebhookPriceSource};
