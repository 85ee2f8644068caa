use config::{Config, ConfigBuilder, ConfigError, Environment, File, Map, builder::DefaultState};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub links: LinkConfig,
    pub scheduler: SchedulerConfig,
    pub publisher: PublisherConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub channel_id: String,
    pub owner_ids: Vec<i64>,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
    pub skip_pending_updates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub deal_selector: String,
    pub max_posts_per_cycle: usize,
    pub seed_sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    #[serde(alias = "no-op", alias = "passthrough", alias = "pass-through")]
    Noop,
    #[serde(alias = "playwright", alias = "browser")]
    Automated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub mode: LinkMode,
    pub email: Option<String>,
    pub password: Option<String>,
    pub login_url: String,
    pub profit_link_url: String,
    pub chrome_path: Option<String>,
    pub session_timeout_secs: u64,
    pub login_settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub post_interval_min: u64,
    pub single_flight: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub message_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
}

/// Flat variables accepted for compatibility with existing deployments.
/// Each maps onto a key of the layered configuration.
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("BOT_TOKEN", "telegram.bot_token"),
    ("CHANNEL_ID", "telegram.channel_id"),
    ("EARNKARO_EMAIL", "links.email"),
    ("EARNKARO_PASSWORD", "links.password"),
    ("POST_INTERVAL_MIN", "scheduler.post_interval_min"),
    ("MAX_POSTS_PER_CYCLE", "scraper.max_posts_per_cycle"),
    ("LINK_MODE", "links.mode"),
];

const LEGACY_LIST_KEYS: &[(&str, &str)] = &[
    ("SOURCES", "scraper.seed_sources"),
    ("OWNER_IDS", "telegram.owner_ids"),
];

impl TelegramConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl LinkConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn login_settle(&self) -> Duration {
        Duration::from_millis(self.login_settle_ms)
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.post_interval_min * 60)
    }
}

impl PublisherConfig {
    pub fn message_delay(&self) -> Duration {
        Duration::from_millis(self.message_delay_ms)
    }
}

impl AppConfig {
    /// Loads configuration from the process environment and an optional file.
    pub fn from_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let vars: Map<String, String> = env::vars().collect();
        Self::from_sources(path, &vars)
    }

    /// Builds configuration from an explicit variable map, lowest to highest
    /// precedence: defaults, file, `DEALCAST__*` variables, legacy flat keys.
    pub fn from_sources(
        path: Option<&Path>,
        vars: &Map<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("config/default").required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("DEALCAST")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("telegram.owner_ids")
                .with_list_parse_key("scraper.seed_sources")
                .source(Some(vars.clone())),
        );

        for (var, key) in LEGACY_KEYS {
            let value = vars.get(*var).map(|v| v.trim().to_string());
            builder = builder.set_override_option(*key, value)?;
        }

        for (var, key) in LEGACY_LIST_KEYS {
            let value = vars.get(*var).map(|v| split_list(v));
            builder = builder.set_override_option(*key, value)?;
        }

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("telegram.bot_token", "")?
            .set_default("telegram.channel_id", "")?
            .set_default("telegram.owner_ids", Vec::<i64>::new())?
            .set_default("telegram.api_base_url", "https://api.telegram.org")?
            .set_default("telegram.poll_timeout_secs", 30)?
            .set_default("telegram.skip_pending_updates", true)?
            .set_default("database.url", "sqlite://sources.db")?
            .set_default("database.max_connections", 5)?
            .set_default("scraper.request_timeout_secs", 10)?
            .set_default("scraper.user_agent", concat!("dealcast/", env!("CARGO_PKG_VERSION")))?
            .set_default("scraper.deal_selector", ".deal-card")?
            .set_default("scraper.max_posts_per_cycle", 10)?
            .set_default("scraper.seed_sources", Vec::<String>::new())?
            .set_default("links.mode", "noop")?
            .set_default("links.login_url", "https://earnkaro.com")?
            .set_default("links.profit_link_url", "https://earnkaro.com/profit-link")?
            .set_default("links.session_timeout_secs", 60)?
            .set_default("links.login_settle_ms", 5000)?
            .set_default("scheduler.post_interval_min", 30)?
            .set_default("scheduler.single_flight", true)?
            .set_default("publisher.message_delay_ms", 2000)?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.port", 9001)?
            .set_default("logging.level", "info")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate Telegram configuration
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Message("telegram.bot_token (BOT_TOKEN) must be set".into()));
        }

        if self.telegram.channel_id.trim().is_empty() {
            return Err(ConfigError::Message("telegram.channel_id (CHANNEL_ID) must be set".into()));
        }

        if Url::parse(&self.telegram.api_base_url).is_err() {
            return Err(ConfigError::Message("Invalid telegram.api_base_url".into()));
        }

        // Validate database configuration
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Message("database.url must be set".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        // Validate scraper configuration
        if self.scraper.max_posts_per_cycle == 0 {
            return Err(ConfigError::Message("max_posts_per_cycle must be greater than 0".into()));
        }

        if self.scraper.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Scraper request_timeout_secs must be greater than 0".into(),
            ));
        }

        if scraper::Selector::parse(&self.scraper.deal_selector).is_err() {
            return Err(ConfigError::Message(format!(
                "Invalid CSS selector in scraper.deal_selector: '{}'",
                self.scraper.deal_selector
            )));
        }

        // Validate link transformation
        if self.links.mode == LinkMode::Automated {
            let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
            if !has(&self.links.email) || !has(&self.links.password) {
                return Err(ConfigError::Message(
                    "Automated link mode requires links.email and links.password".into(),
                ));
            }

            if Url::parse(&self.links.login_url).is_err()
                || Url::parse(&self.links.profit_link_url).is_err()
            {
                return Err(ConfigError::Message(
                    "Invalid affiliate login or profit-link URL".into(),
                ));
            }
        }

        // Validate scheduler configuration
        if self.scheduler.post_interval_min == 0 {
            return Err(ConfigError::Message("post_interval_min must be greater than 0".into()));
        }

        // Validate metrics configuration
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
