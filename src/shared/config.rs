//! Watchdog configuration, loaded once at startup from a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::shared::errors::AppError;
use crate::shared::types::{CalendarRecord, DailyLevels, ScheduledEvent};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "Watchdog.toml";

/// How price samples reach the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceMode {
    /// Outbound HTTP poll every iteration
    Poll,
    /// Inbound webhook writes into a shared cell
    Webhook,
}

/// Level-break alerting behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakMode {
    /// Alert on every poll while price is beyond a level
    Repeat,
    /// Alert once per side, re-arm when price returns inside the band
    OneShot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentCfg {
    pub symbol: String,
}

impl Default for InstrumentCfg {
    fn default() -> Self {
        Self { symbol: "XAUUSD".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceCfg {
    pub mode: PriceMode,
    pub url: Option<String>,
    pub timeout_secs: u64,
    /// Webhook samples older than this are treated as unavailable
    pub max_age_secs: u64,
}

impl Default for PriceCfg {
    fn default() -> Self {
        Self {
            mode: PriceMode::Poll,
            url: None,
            timeout_secs: 15,
            max_age_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookCfg {
    pub bind: String,
}

impl Default for WebhookCfg {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsCfg {
    pub spike_pct: f64,
    pub dump_pct: f64,
}

impl Default for ThresholdsCfg {
    fn default() -> Self {
        Self {
            spike_pct: 0.8,
            dump_pct: -0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelsCfg {
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub break_mode: BreakMode,
}

impl Default for LevelsCfg {
    fn default() -> Self {
        Self {
            high: None,
            low: None,
            break_mode: BreakMode::Repeat,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsCfg {
    pub pre_window_secs: i64,
    pub post_window_secs: i64,
}

impl Default for EventsCfg {
    fn default() -> Self {
        Self {
            pre_window_secs: 1800,
            post_window_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarCfg {
    /// Remote calendar returning a JSON list of records
    pub url: Option<String>,
    pub timeout_secs: u64,
    pub refresh_secs: u64,
    /// Static events, used when no url is configured
    pub events: Vec<CalendarRecord>,
}

impl Default for CalendarCfg {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 15,
            refresh_secs: 6 * 3600,
            events: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyCfg {
    pub chat_id: Option<String>,
    pub api_base: String,
    /// Environment variable holding the bot token
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for NotifyCfg {
    fn default() -> Self {
        Self {
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            token_env: "TELEGRAM_BOT_TOKEN".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeCfg {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for NarrativeCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/responses".to_string(),
            model: "gpt-4.1-mini".to_string(),
            timeout_secs: 15,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopCfg {
    pub interval_secs: u64,
    pub error_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            error_backoff_secs: 120,
            max_backoff_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateCfg {
    /// Persist event lifecycle state here when set
    pub path: Option<String>,
}

/// Full watchdog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub instrument: InstrumentCfg,
    pub price: PriceCfg,
    pub webhook: WebhookCfg,
    pub thresholds: ThresholdsCfg,
    pub levels: LevelsCfg,
    pub events: EventsCfg,
    pub calendar: CalendarCfg,
    pub notify: NotifyCfg,
    pub narrative: NarrativeCfg,
    pub watchdog: LoopCfg,
    pub state: StateCfg,
}

impl WatchdogConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, AppError> {
        toml::from_str(s).map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Check invariants the rest of the system relies on.
    pub fn validate(&self) -> Result<(), AppError> {
        let t = &self.thresholds;
        if !(t.spike_pct > 0.0) {
            return Err(AppError::ConfigError(format!("spike_pct must be > 0, got {}", t.spike_pct)));
        }
        if !(t.dump_pct < 0.0) {
            return Err(AppError::ConfigError(format!("dump_pct must be < 0, got {}", t.dump_pct)));
        }

        match (self.levels.high, self.levels.low) {
            (Some(high), Some(low)) if high < low => {
                return Err(AppError::ConfigError(format!("levels.high ({}) is below levels.low ({})", high, low)));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(AppError::ConfigError("levels.high and levels.low must be set together".to_string()));
            }
            _ => {}
        }

        if self.events.pre_window_secs <= 0 || self.events.post_window_secs <= 0 {
            return Err(AppError::ConfigError("event windows must be positive".to_string()));
        }
        if self.watchdog.interval_secs == 0 {
            return Err(AppError::ConfigError("watchdog.interval_secs must be positive".to_string()));
        }
        if self.price.timeout_secs == 0 || self.narrative.timeout_secs == 0 {
            return Err(AppError::ConfigError("timeouts must be positive".to_string()));
        }
        if self.price.mode == PriceMode::Poll && self.price.url.is_none() {
            return Err(AppError::ConfigError("price.url is required in poll mode".to_string()));
        }

        // Surface calendar typos at startup rather than at the first refresh
        self.static_events()?;
        Ok(())
    }

    pub fn daily_levels(&self) -> Option<DailyLevels> {
        match (self.levels.high, self.levels.low) {
            (Some(high), Some(low)) => DailyLevels::new(high, low),
            _ => None,
        }
    }

    pub fn static_events(&self) -> Result<Vec<ScheduledEvent>, AppError> {
        self.calendar
            .events
            .iter()
            .cloned()
            .map(|r| ScheduledEvent::try_from(r).map_err(AppError::ConfigError))
            .collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog.interval_secs)
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from `path`, or from `Watchdog.toml` if it exists,
    /// falling back to defaults. Not validated here: CLI overrides are
    /// applied first, then the caller runs `validate`.
    pub fn load(path: Option<&Path>) -> Result<WatchdogConfig, AppError> {
        let config = match path {
            Some(path) => Self::load_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load_file(Path::new(DEFAULT_CONFIG_PATH))?,
            None => WatchdogConfig::default(),
        };
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<WatchdogConfig, AppError> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e)))?;
        WatchdogConfig::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::Impact;

    fn poll_config() -> WatchdogConfig {
        let mut cfg = WatchdogConfig::default();
        cfg.price.url = Some("http://localhost/price".to_string());
        cfg
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg = WatchdogConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.instrument.symbol, "XAUUSD");
        assert_eq!(cfg.events.pre_window_secs, 1800);
        assert_eq!(cfg.events.post_window_secs, 900);
        assert_eq!(cfg.watchdog.interval_secs, 60);
        assert_eq!(cfg.levels.break_mode, BreakMode::Repeat);
    }

    #[test]
    fn test_parse_full_file() {
        let cfg = WatchdogConfig::from_toml_str(
            r#"
            [price]
            mode = "webhook"

            [thresholds]
            spike_pct = 0.5
            dump_pct = -0.7

            [levels]
            high = 4620.0
            low = 4480.0
            break_mode = "one_shot"

            [[calendar.events]]
            event = "US CPI"
            impact = "High"
            time_utc = "13:30"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.price.mode, PriceMode::Webhook);
        assert_eq!(cfg.thresholds.dump_pct, -0.7);
        assert_eq!(cfg.levels.break_mode, BreakMode::OneShot);
        assert_eq!(cfg.daily_levels(), DailyLevels::new(4620.0, 4480.0));
        cfg.validate().unwrap();

        let events = cfg.static_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].impact, Impact::High);
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut cfg = poll_config();
        cfg.thresholds.dump_pct = 0.5;
        assert!(matches!(cfg.validate(), Err(AppError::ConfigError(_))));

        let mut cfg = poll_config();
        cfg.thresholds.spike_pct = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_levels() {
        let mut cfg = poll_config();
        cfg.levels.high = Some(4400.0);
        cfg.levels.low = Some(4500.0);
        assert!(cfg.validate().is_err());

        cfg.levels.low = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_requires_url_in_poll_mode() {
        let cfg = WatchdogConfig::default();
        assert!(cfg.validate().is_err());
        assert!(poll_config().validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = ConfigLoader::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
