//! The watchdog loop: polls the price source on a fixed cadence, runs the
//! detectors and the event lifecycle against each sample, and dispatches
//! alerts. One failing iteration never stops the loop.

use chrono::{DateTime, NaiveDate, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::messages::{self, StartupInfo};
use super::narration::{generate_with_timeout, post_event_prompt};
use crate::domain::event::{EventLifecycleManager, LifecycleAction, PostEventAnalysis};
use crate::domain::price::{detect_shock, LevelMonitor};
use crate::domain::session::current_session;
use crate::infrastructure::{AlertDispatcher, CalendarSource, NarrativeGenerator, PriceSource, StateStore};
use crate::shared::config::{BreakMode, WatchdogConfig};
use crate::shared::errors::{AppError, SourceError};
use crate::shared::types::{DailyLevels, PriceSample, ScheduledEvent, SessionLabel};

/// Source of "now". Swapped out in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tunables for the loop, resolved once from configuration
#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    pub symbol: String,
    pub spike_pct: f64,
    pub dump_pct: f64,
    pub pre_window_secs: i64,
    pub post_window_secs: i64,
    pub interval: Duration,
    pub error_backoff: Duration,
    pub max_backoff: Duration,
    pub price_timeout: Duration,
    pub narrative_timeout: Duration,
    pub calendar_refresh: Duration,
    pub levels: Option<DailyLevels>,
    pub break_mode: BreakMode,
}

impl From<&WatchdogConfig> for WatchdogSettings {
    fn from(cfg: &WatchdogConfig) -> Self {
        Self {
            symbol: cfg.instrument.symbol.clone(),
            spike_pct: cfg.thresholds.spike_pct,
            dump_pct: cfg.thresholds.dump_pct,
            pre_window_secs: cfg.events.pre_window_secs,
            post_window_secs: cfg.events.post_window_secs,
            interval: cfg.poll_interval(),
            error_backoff: Duration::from_secs(cfg.watchdog.error_backoff_secs),
            max_backoff: Duration::from_secs(cfg.watchdog.max_backoff_secs),
            price_timeout: Duration::from_secs(cfg.price.timeout_secs),
            narrative_timeout: Duration::from_secs(cfg.narrative.timeout_secs),
            calendar_refresh: Duration::from_secs(cfg.calendar.refresh_secs),
            levels: cfg.daily_levels(),
            break_mode: cfg.levels.break_mode,
        }
    }
}

/// Everything the loop talks to, built once at startup
pub struct WatchdogContext {
    pub settings: WatchdogSettings,
    pub price_source: Arc<dyn PriceSource>,
    pub calendar: Arc<dyn CalendarSource>,
    pub dispatcher: Arc<dyn AlertDispatcher>,
    pub narrator: Option<Arc<dyn NarrativeGenerator>>,
    pub clock: Arc<dyn Clock>,
    pub state_store: Option<StateStore>,
}

/// Requests a clean stop. The loop checks it once per iteration and wakes
/// from its sleep when it fires.
#[derive(Debug, Clone)]
pub struct WatchdogHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl WatchdogHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Running counters, logged at shutdown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchdogStats {
    pub polls: u64,
    pub samples: u64,
    pub source_failures: u64,
    pub shocks: u64,
    pub level_breaks: u64,
    pub warnings: u64,
    pub analyses: u64,
    pub narrative_failures: u64,
    pub alerts_sent: u64,
    pub delivery_failures: u64,
    pub iteration_errors: u64,
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Sampled(PriceSample),
    SourceUnavailable(SourceError),
}

pub struct Watchdog {
    ctx: WatchdogContext,
    last_price: Option<f64>,
    level_monitor: Option<LevelMonitor>,
    lifecycle: EventLifecycleManager,
    events: Vec<ScheduledEvent>,
    calendar_day: Option<NaiveDate>,
    calendar_fetched_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    consecutive_errors: u32,
    stats: WatchdogStats,
}

impl Watchdog {
    pub fn new(ctx: WatchdogContext) -> Self {
        let level_monitor = ctx
            .settings
            .levels
            .map(|levels| LevelMonitor::new(levels, ctx.settings.break_mode));
        let lifecycle = EventLifecycleManager::new(ctx.settings.pre_window_secs, ctx.settings.post_window_secs);
        Self {
            ctx,
            last_price: None,
            level_monitor,
            lifecycle,
            events: Vec::new(),
            calendar_day: None,
            calendar_fetched_at: None,
            consecutive_failures: 0,
            consecutive_errors: 0,
            stats: WatchdogStats::default(),
        }
    }

    pub fn stats(&self) -> &WatchdogStats {
        &self.stats
    }

    pub fn lifecycle(&self) -> &EventLifecycleManager {
        &self.lifecycle
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }

    /// Failed price fetches in the current outage
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Failed or panicked iterations since the last clean one
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Restore persisted state, load the calendar and announce startup.
    pub async fn start(&mut self) {
        let now = self.ctx.clock.now();

        if let Some(store) = &self.ctx.state_store {
            match store.load() {
                Ok(Some(snapshot)) => {
                    if self.lifecycle.restore(snapshot, now.date_naive()) {
                        info!("♻️  Restored event state from {}", store.path().display());
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable event state: {}", e),
            }
        }

        self.refresh_calendar(now, true).await;

        let info = StartupInfo {
            symbol: &self.ctx.settings.symbol,
            session: current_session(now),
            spike_pct: self.ctx.settings.spike_pct,
            dump_pct: self.ctx.settings.dump_pct,
            levels: self.level_monitor.as_ref().map(|m| *m.levels()),
            event_count: self.events.len(),
            price_source: self.ctx.price_source.name(),
        };
        let text = messages::startup(&info, now);
        self.send(&text).await;
        info!("🚀 {} watchdog started ({} events today)", self.ctx.settings.symbol, self.events.len());
    }

    /// Run until `shutdown` flips to true. Returns the final counters.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> WatchdogStats {
        self.start().await;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = AssertUnwindSafe(self.poll_once()).catch_unwind().await;
            match result {
                Ok(Ok(outcome)) => {
                    self.consecutive_errors = 0;
                    debug!("Poll finished: {:?}", outcome);
                }
                Ok(Err(e)) => self.on_iteration_error(&e.to_string()).await,
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    self.on_iteration_error(&format!("iteration panicked: {}", reason)).await;
                }
            }

            let delay = self.next_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    // Every handle dropped
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("🛑 Watchdog stopped: {:?}", self.stats);
        self.stats
    }

    /// One iteration: sample, shock check, level check, event lifecycle,
    /// always in that order against the same sample.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, AppError> {
        self.stats.polls += 1;
        let now = self.ctx.clock.now();
        self.refresh_calendar(now, false).await;

        let sample = match self.fetch_price().await {
            Ok(sample) => sample,
            Err(e) => {
                self.on_source_failure(&e, now).await;
                return Ok(PollOutcome::SourceUnavailable(e));
            }
        };

        if self.consecutive_failures > 0 {
            info!("✅ Price source recovered after {} failed polls", self.consecutive_failures);
            self.consecutive_failures = 0;
        }
        self.stats.samples += 1;

        let price = sample.value;
        let session = current_session(now);
        let symbol = self.ctx.settings.symbol.clone();

        // The baseline always moves to the latest good sample
        let shock = detect_shock(self.last_price, price, self.ctx.settings.spike_pct, self.ctx.settings.dump_pct);
        self.last_price = Some(price);
        if let Some(shock) = shock {
            info!("⚡ {:?} {:+.2}% ({:.2} -> {:.2})", shock.direction, shock.pct_change, shock.previous, shock.current);
            self.stats.shocks += 1;
            self.send(&messages::shock(&symbol, &shock, session, now)).await;
        }

        let level_break = self.level_monitor.as_mut().and_then(|m| m.evaluate(price));
        if let Some(event) = level_break {
            info!("🎯 Level break: {:?}", event);
            self.stats.level_breaks += 1;
            self.send(&messages::level_break(&symbol, &event, session, now)).await;
        }

        let report = self.lifecycle.evaluate(&self.events, now, price);
        if report.changed {
            self.persist_state();
        }

        for action in report.actions {
            match action {
                LifecycleAction::Warn(warning) => {
                    self.stats.warnings += 1;
                    self.send(&messages::pre_event_warning(&symbol, &warning, session, now)).await;
                }
                LifecycleAction::Analyze(analysis) => {
                    self.stats.analyses += 1;
                    let narrative = self.narrate(&analysis, session).await;
                    let text = messages::post_event_analysis(&symbol, &analysis, narrative.as_deref(), session, now);
                    self.send(&text).await;
                }
            }
        }

        for fault in &report.faults {
            error!("❌ Event lifecycle fault: {}", fault);
        }
        if let Some(fault) = report.faults.into_iter().next() {
            return Err(fault.into());
        }

        Ok(PollOutcome::Sampled(sample))
    }

    /// Sleep before the next poll. Grows while the loop keeps failing.
    pub fn next_delay(&self) -> Duration {
        let streak = self.consecutive_failures + self.consecutive_errors;
        if streak == 0 {
            return self.ctx.settings.interval;
        }
        let exponent = (streak - 1).min(16);
        let backoff = self
            .ctx
            .settings
            .error_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.ctx.settings.max_backoff);
        backoff.max(self.ctx.settings.interval)
    }

    async fn fetch_price(&self) -> Result<PriceSample, SourceError> {
        let limit = self.ctx.settings.price_timeout;
        match timeout(limit, self.ctx.price_source.latest()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(limit.as_secs())),
        }
    }

    async fn on_source_failure(&mut self, error: &SourceError, now: DateTime<Utc>) {
        self.stats.source_failures += 1;
        self.consecutive_failures += 1;
        let retry_in = self.next_delay().as_secs();
        warn!(
            "⚠️  Price source {} failed ({} in a row): {}",
            self.ctx.price_source.name(),
            self.consecutive_failures,
            error
        );

        // Report once per outage, not on every retry
        if self.consecutive_failures == 1 {
            let text = messages::source_unavailable(&self.ctx.settings.symbol, &error.to_string(), retry_in, now);
            self.send(&text).await;
        }
    }

    async fn on_iteration_error(&mut self, reason: &str) {
        self.stats.iteration_errors += 1;
        self.consecutive_errors += 1;
        error!("❌ Watchdog iteration failed: {}", reason);
        let text = messages::diagnostic(&self.ctx.settings.symbol, reason, self.ctx.clock.now());
        self.send(&text).await;
    }

    async fn narrate(&mut self, analysis: &PostEventAnalysis, session: SessionLabel) -> Option<String> {
        let narrator = self.ctx.narrator.clone()?;
        let prompt = post_event_prompt(&self.ctx.settings.symbol, analysis, session);
        match generate_with_timeout(narrator.as_ref(), &prompt, self.ctx.settings.narrative_timeout).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Narrative for {} unavailable, sending plain facts: {}", analysis.event_id, e);
                self.stats.narrative_failures += 1;
                None
            }
        }
    }

    /// Re-query the calendar on startup, on a new UTC day, and every
    /// `calendar_refresh`. A failed fetch keeps the previous list.
    async fn refresh_calendar(&mut self, now: DateTime<Utc>, force: bool) {
        let today = now.date_naive();
        let due = force
            || self.calendar_day != Some(today)
            || self
                .calendar_fetched_at
                .map(|t| (now - t).to_std().unwrap_or_default() >= self.ctx.settings.calendar_refresh)
                .unwrap_or(true);
        if !due {
            return;
        }

        match self.ctx.calendar.fetch_events().await {
            Ok(events) => {
                debug!("Calendar refreshed: {} events", events.len());
                self.events = events;
                self.calendar_day = Some(today);
                self.calendar_fetched_at = Some(now);
            }
            Err(e) => {
                warn!("Calendar refresh failed, keeping {} known events: {}", self.events.len(), e);
                // Retry on the next poll rather than waiting a full refresh period
                self.calendar_fetched_at = None;
            }
        }
    }

    fn persist_state(&self) {
        let (Some(store), Some(snapshot)) = (&self.ctx.state_store, self.lifecycle.snapshot()) else {
            return;
        };
        if let Err(e) = store.save(&snapshot) {
            warn!("Failed to persist event state to {}: {}", store.path().display(), e);
        }
    }

    async fn send(&mut self, text: &str) {
        match self.ctx.dispatcher.deliver(text).await {
            Ok(()) => self.stats.alerts_sent += 1,
            Err(e) => {
                self.stats.delivery_failures += 1;
                warn!("Alert delivery failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::StaticCalendar;
    use crate::shared::errors::DeliveryError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct QueuedPrices(Mutex<VecDeque<Result<f64, SourceError>>>);

    #[async_trait]
    impl PriceSource for QueuedPrices {
        async fn latest(&self) -> Result<PriceSample, SourceError> {
            let next = self
                .0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::Unavailable("empty".to_string())));
            next.map(|value| PriceSample::new(value, Utc::now()).unwrap())
        }

        fn name(&self) -> &str {
            "queued"
        }
    }

    #[derive(Default)]
    struct Outbox(Mutex<Vec<String>>);

    #[async_trait]
    impl AlertDispatcher for Outbox {
        async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    fn watchdog(prices: Vec<Result<f64, SourceError>>, outbox: Arc<Outbox>) -> Watchdog {
        Watchdog::new(WatchdogContext {
            settings: WatchdogSettings::from(&WatchdogConfig::default()),
            price_source: Arc::new(QueuedPrices(Mutex::new(prices.into()))),
            calendar: Arc::new(StaticCalendar::default()),
            dispatcher: outbox,
            narrator: None,
            clock: Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap())),
            state_store: None,
        })
    }

    #[tokio::test]
    async fn test_iteration_error_does_not_hide_next_outage() {
        let outbox = Arc::new(Outbox::default());
        let down = Err(SourceError::Unavailable("connection refused".to_string()));
        let mut wd = watchdog(vec![down, Ok(4550.0)], outbox.clone());

        wd.on_iteration_error("boom").await;
        assert_eq!(wd.consecutive_errors(), 1);
        assert_eq!(wd.consecutive_failures(), 0);
        assert_eq!(wd.next_delay(), Duration::from_secs(120));

        wd.poll_once().await.unwrap();
        assert_eq!(wd.consecutive_failures(), 1);
        let outage_alerts = outbox
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.contains("price feed unavailable"))
            .count();
        assert_eq!(outage_alerts, 1);

        wd.poll_once().await.unwrap();
        assert_eq!(wd.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_source_failures_alone_drive_recovery_counter() {
        let outbox = Arc::new(Outbox::default());
        let mut wd = watchdog(vec![Ok(4550.0)], outbox);

        wd.on_iteration_error("boom").await;
        wd.poll_once().await.unwrap();
        // The source never failed, so there is no outage to recover from
        assert_eq!(wd.consecutive_failures(), 0);
        assert_eq!(wd.stats().source_failures, 0);
        assert_eq!(wd.stats().iteration_errors, 1);
    }
}
