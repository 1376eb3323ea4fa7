//! CLI commands and handlers
use clap::{Args, Parser, Subcommand};
use chrono::{Timelike, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::application::intel::{run_intelligence, MarketSnapshot};
use crate::application::watchdog::{SystemClock, Watchdog, WatchdogContext, WatchdogHandle, WatchdogSettings};
use crate::domain::session::{classify_session, current_session};
use crate::infrastructure::feeds::webhook;
use crate::infrastructure::{
    AlertDispatcher, CalendarSource, HttpCalendar, HttpPriceSource, LogDispatcher, NarrativeGenerator,
    OpenAiNarrator, PriceSource, SharedPriceCell, StateStore, StaticCalendar, TelegramDispatcher,
    WebhookPriceSource,
};
use crate::shared::config::{PriceMode, WatchdogConfig};
use crate::shared::errors::AppError;
use crate::shared::utils::{format_pct, format_price};

#[derive(Parser)]
#[command(name = "xau-watchdog", version)]
#[command(about = "XAUUSD price shock, daily level and economic event watchdog")]
pub struct Cli {
    /// Path to the TOML config file (defaults to ./Watchdog.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "xau_watchdog=trace". Overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Filter directive: `--log-level`, then `rust_log`, then `info`.
    pub fn log_directive(&self, rust_log: Option<String>) -> String {
        self.log_level
            .clone()
            .or(rust_log)
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "info".to_string())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the watchdog loop
    Run(RunArgs),

    /// Print the trading session for the current UTC hour
    Session {
        /// Classify this UTC hour instead of the current one
        #[arg(long)]
        hour: Option<u32>,
    },

    /// Load and validate the configuration, then print a summary
    CheckConfig,

    /// Build a one-off market intelligence report
    Intel {
        /// Also deliver the report through the notification channel
        #[arg(long)]
        send: bool,

        /// Use this price instead of querying the price source
        #[arg(long)]
        price: Option<f64>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run(RunArgs::default())
    }
}

/// Overrides for the `run` command. Anything set here wins over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Poll interval in seconds
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Spike threshold in percent (positive)
    #[arg(long)]
    pub spike: Option<f64>,

    /// Dump threshold in percent (negative)
    #[arg(long, allow_negative_numbers = true)]
    pub dump: Option<f64>,

    /// Poll this URL for prices
    #[arg(long, conflicts_with = "webhook")]
    pub price_url: Option<String>,

    /// Receive prices on this address instead of polling, e.g. 0.0.0.0:8080
    #[arg(long)]
    pub webhook: Option<String>,

    /// Log alerts instead of sending them
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn apply(&self, config: &mut WatchdogConfig) {
        if let Some(interval) = self.interval {
            config.watchdog.interval_secs = interval;
        }
        if let Some(spike) = self.spike {
            config.thresholds.spike_pct = spike;
        }
        if let Some(dump) = self.dump {
            config.thresholds.dump_pct = dump;
        }
        if let Some(url) = &self.price_url {
            config.price.mode = PriceMode::Poll;
            config.price.url = Some(url.clone());
        }
        if let Some(bind) = &self.webhook {
            config.price.mode = PriceMode::Webhook;
            config.webhook.bind = bind.clone();
        }
    }
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(command: Commands, config: WatchdogConfig) -> Result<(), AppError> {
        match command {
            Commands::Run(args) => Self::execute_run_command(args, config).await,
            Commands::Session { hour } => Self::execute_session_command(hour),
            Commands::CheckConfig => Self::execute_check_config_command(config),
            Commands::Intel { send, price } => Self::execute_intel_command(send, price, config).await,
        }
    }

    async fn execute_run_command(args: RunArgs, mut config: WatchdogConfig) -> Result<(), AppError> {
        args.apply(&mut config);
        config.validate()?;

        let (handle, shutdown) = WatchdogHandle::new();
        let dispatcher = Self::build_dispatcher(&config, args.dry_run)?;
        let calendar = Self::build_calendar(&config)?;
        let narrator = if config.narrative.enabled {
            Self::build_narrator(&config)?
        } else {
            None
        };

        let mut server = None;
        let price_source: Arc<dyn PriceSource> = match config.price.mode {
            PriceMode::Poll => {
                let url = config
                    .price
                    .url
                    .clone()
                    .ok_or_else(|| AppError::ConfigError("price.url is required in poll mode".to_string()))?;
                Arc::new(HttpPriceSource::new(url, config.price.timeout_secs)?)
            }
            PriceMode::Webhook => {
                let cell = SharedPriceCell::new();
                let listener = webhook::bind(&config.webhook.bind).await?;
                server = Some(tokio::spawn(webhook::serve(listener, cell.clone(), handle.subscribe())));
                Arc::new(WebhookPriceSource::new(cell, config.price.max_age_secs))
            }
        };

        info!("📊 Watchdog configuration:");
        info!("   Symbol: {}", config.instrument.symbol);
        info!("   Price source: {}", price_source.name());
        info!("   Interval: {}s", config.watchdog.interval_secs);
        info!(
            "   Thresholds: {} / {}",
            format_pct(config.thresholds.spike_pct),
            format_pct(config.thresholds.dump_pct)
        );
        info!("   Narrative: {}", if narrator.is_some() { "enabled" } else { "disabled" });

        let ctx = WatchdogContext {
            settings: WatchdogSettings::from(&config),
            price_source,
            calendar,
            dispatcher,
            narrator,
            clock: Arc::new(SystemClock),
            state_store: config.state.path.as_ref().map(StateStore::new),
        };

        let signal_handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping watchdog...");
                signal_handle.stop();
            }
        });

        let stats = Watchdog::new(ctx).run(shutdown).await;
        handle.stop();

        if let Some(server) = server {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("❌ Price webhook failed: {}", e),
                Err(e) => error!("❌ Price webhook task panicked: {:?}", e),
            }
        }

        info!(
            "✅ Watchdog finished: {} polls, {} alerts sent, {} delivery failures",
            stats.polls, stats.alerts_sent, stats.delivery_failures
        );
        Ok(())
    }

    fn execute_session_command(hour: Option<u32>) -> Result<(), AppError> {
        let hour = hour.unwrap_or_else(|| Utc::now().hour());
        if hour > 23 {
            return Err(AppError::ConfigError(format!("hour must be 0-23, got {}", hour)));
        }
        println!("{}", classify_session(hour));
        Ok(())
    }

    fn execute_check_config_command(config: WatchdogConfig) -> Result<(), AppError> {
        config.validate()?;
        let events = config.static_events()?;

        info!("✅ Configuration is valid");
        info!("   Symbol: {}", config.instrument.symbol);
        info!("   Price mode: {:?}", config.price.mode);
        match config.price.mode {
            PriceMode::Poll => info!("   Price URL: {}", config.price.url.as_deref().unwrap_or_default()),
            PriceMode::Webhook => info!("   Webhook bind: {}", config.webhook.bind),
        }
        info!(
            "   Thresholds: {} / {}",
            format_pct(config.thresholds.spike_pct),
            format_pct(config.thresholds.dump_pct)
        );
        match config.daily_levels() {
            Some(l) => info!(
                "   Daily levels: {} / {} ({:?})",
                format_price(l.high),
                format_price(l.low),
                config.levels.break_mode
            ),
            None => info!("   Daily levels: not set"),
        }
        info!(
            "   Event windows: pre {}s, post {}s",
            config.events.pre_window_secs, config.events.post_window_secs
        );
        match &config.calendar.url {
            Some(url) => info!("   Calendar: {}", url),
            None => info!("   Calendar: {} static events", events.len()),
        }
        info!(
            "   Telegram: {}",
            if Self::telegram_credentials(&config).is_some() { "configured" } else { "not configured" }
        );
        info!("   Narrative: {}", if config.narrative.enabled { "enabled" } else { "disabled" });
        if let Some(path) = &config.state.path {
            info!("   State file: {}", path);
        }
        Ok(())
    }

    async fn execute_intel_command(send: bool, price: Option<f64>, config: WatchdogConfig) -> Result<(), AppError> {
        let narrator = Self::build_narrator(&config)?.ok_or_else(|| {
            AppError::ConfigError(format!("{} must be set for the intel report", config.narrative.api_key_env))
        })?;

        let price = match price {
            Some(price) => price,
            None => {
                let url = config.price.url.clone().ok_or_else(|| {
                    AppError::ConfigError("pass --price or set price.url to build a report".to_string())
                })?;
                HttpPriceSource::new(url, config.price.timeout_secs)?.latest().await?.value
            }
        };

        let events = match Self::build_calendar(&config)?.fetch_events().await {
            Ok(events) => events,
            Err(e) => {
                warn!("Calendar unavailable, building report without it: {}", e);
                Vec::new()
            }
        };

        let now = Utc::now();
        let snapshot = MarketSnapshot {
            symbol: config.instrument.symbol.clone(),
            price,
            levels: config.daily_levels(),
            events,
            session: current_session(now),
        };
        let limit = Duration::from_secs(config.narrative.timeout_secs);
        let report = run_intelligence(narrator.as_ref(), &snapshot, limit, now).await?;
        let text = report.to_message(&snapshot.symbol);
        println!("{}", text);

        if send {
            Self::build_dispatcher(&config, false)?.deliver(&text).await?;
            info!("📨 Report delivered");
        }
        Ok(())
    }

    fn telegram_credentials(config: &WatchdogConfig) -> Option<(String, String)> {
        let token = std::env::var(&config.notify.token_env).ok().filter(|t| !t.is_empty())?;
        let chat_id = config.notify.chat_id.clone()?;
        Some((token, chat_id))
    }

    fn build_dispatcher(config: &WatchdogConfig, dry_run: bool) -> Result<Arc<dyn AlertDispatcher>, AppError> {
        if dry_run {
            info!("Dry run: alerts will only be logged");
            return Ok(Arc::new(LogDispatcher));
        }
        match Self::telegram_credentials(config) {
            Some((token, chat_id)) => Ok(Arc::new(TelegramDispatcher::new(
                config.notify.api_base.clone(),
                token,
                chat_id,
                config.notify.timeout_secs,
            )?)),
            None => {
                warn!(
                    "⚠️  {} or notify.chat_id missing, alerts will only be logged",
                    config.notify.token_env
                );
                Ok(Arc::new(LogDispatcher))
            }
        }
    }

    fn build_narrator(config: &WatchdogConfig) -> Result<Option<Arc<dyn NarrativeGenerator>>, AppError> {
        let Some(api_key) = std::env::var(&config.narrative.api_key_env).ok().filter(|k| !k.is_empty()) else {
            warn!("{} not set, narratives disabled", config.narrative.api_key_env);
            return Ok(None);
        };
        let narrator = OpenAiNarrator::new(
            config.narrative.endpoint.clone(),
            config.narrative.model.clone(),
            api_key,
            config.narrative.timeout_secs,
        )?;
        Ok(Some(Arc::new(narrator)))
    }

    fn build_calendar(config: &WatchdogConfig) -> Result<Arc<dyn CalendarSource>, AppError> {
        match &config.calendar.url {
            Some(url) => Ok(Arc::new(HttpCalendar::new(url.clone(), config.calendar.timeout_secs)?)),
            None => Ok(Arc::new(StaticCalendar::new(config.static_events()?))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["xau-watchdog"]).unwrap();
        assert!(cli.command.is_none());
        assert!(matches!(cli.command.unwrap_or_default(), Commands::Run(_)));
    }

    #[test]
    fn test_run_overrides_config() {
        let cli = Cli::try_parse_from([
            "xau-watchdog",
            "run",
            "--interval",
            "30",
            "--spike",
            "0.5",
            "--dump",
            "-0.6",
            "--webhook",
            "127.0.0.1:9000",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };

        let mut config = WatchdogConfig::default();
        args.apply(&mut config);
        assert_eq!(config.watchdog.interval_secs, 30);
        assert_eq!(config.thresholds.spike_pct, 0.5);
        assert_eq!(config.thresholds.dump_pct, -0.6);
        assert_eq!(config.price.mode, PriceMode::Webhook);
        assert_eq!(config.webhook.bind, "127.0.0.1:9000");
        config.validate().unwrap();
    }

    #[test]
    fn test_price_url_conflicts_with_webhook() {
        let result = Cli::try_parse_from([
            "xau-watchdog",
            "run",
            "--price-url",
            "http://localhost/price",
            "--webhook",
            "0.0.0.0:8080",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["xau-watchdog", "check-config", "--config", "alt.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
    }

    #[test]
    fn test_log_level_flag_overrides_rust_log() {
        let cli = Cli::try_parse_from(["xau-watchdog", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_directive(Some("warn".to_string())), "debug");

        let cli = Cli::try_parse_from(["xau-watchdog"]).unwrap();
        assert_eq!(cli.log_directive(Some("warn".to_string())), "warn");
        assert_eq!(cli.log_directive(None), "info");
    }

    #[test]
    fn test_session_rejects_bad_hour() {
        assert!(CommandExecutor::execute_session_command(Some(24)).is_err());
        assert!(CommandExecutor::execute_session_command(Some(13)).is_ok());
    }

    #[tokio::test]
    async fn test_run_fails_fast_when_webhook_port_is_taken() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let args = RunArgs {
            webhook: Some(taken.local_addr().unwrap().to_string()),
            dry_run: true,
            ..Default::default()
        };

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            CommandExecutor::execute_run_command(args, WatchdogConfig::default()),
        )
        .await
        .expect("run command should return instead of starting the loop");
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_dry_run_uses_log_dispatcher() {
        let dispatcher = CommandExecutor::build_dispatcher(&WatchdogConfig::default(), true).unwrap();
        assert!(dispatcher.deliver("hello").await.is_ok());
    }
}
