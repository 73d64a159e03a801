use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Stores rendered at the same time. 1 keeps extraction strictly sequential.
    pub max_concurrent_stores: usize,
    /// Upper bound in seconds for loading a page and waiting for it to settle.
    pub render_timeout: u64,
    /// How long the page content must stay unchanged to count as quiescent.
    pub network_idle_ms: u64,
    pub user_agent: String,
    pub chrome_path: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrent_stores: 1,
            render_timeout: 60,
            network_idle_ms: 500,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36 shopwatch/0.1".to_string(),
            chrome_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_secs: 900 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub rules_path: PathBuf,
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from("data/stores.json"),
            snapshot_path: PathBuf::from("data/listings.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Per-channel delivery bound in seconds.
    pub delivery_timeout: u64,
    pub sms: SmsConfig,
    pub email: SmtpConfig,
    pub chat: ChatConfig,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: 30,
            sms: SmsConfig::default(),
            email: SmtpConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub enabled: bool,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub to_number: String,
    pub max_length: usize,
    pub api_base: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            to_number: String::new(),
            max_length: 1600,
            api_base: "https://api.twilio.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub to_address: String,
    pub use_tls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: None,
            password: None,
            from_address: String::new(),
            from_name: "Shopwatch".to_string(),
            to_address: String::new(),
            use_tls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub channel_id: String,
    pub api_base: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            channel_id: String::new(),
            api_base: "https://discord.com/api/v10".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    pub level: String,
    /// Directory for a daily rolling log file; stdout only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "shopwatch=info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

impl AppConfig {
    /// Loads defaults, then `config/default`, `config/{RUN_MODE}`, `config/local`
    /// (all optional), then `SHOPWATCH__*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false));

        Self::finish(builder)
    }

    /// Same layering as [`AppConfig::from_env`] but with one explicit file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::from(path));

        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let s = builder
            // Values stay strings until deserialized so phone numbers keep their `+`
            .add_source(Environment::with_prefix("SHOPWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scraper.max_concurrent_stores == 0 {
            return Err(ConfigError::Message("Scraper max_concurrent_stores must be greater than 0".into()));
        }

        if self.scraper.render_timeout == 0 {
            return Err(ConfigError::Message("Scraper render_timeout must be greater than 0".into()));
        }

        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Message("Scheduler interval_secs must be greater than 0".into()));
        }

        if self.notifications.delivery_timeout == 0 {
            return Err(ConfigError::Message("Notifications delivery_timeout must be greater than 0".into()));
        }

        let sms = &self.notifications.sms;
        if sms.enabled {
            if sms.account_sid.is_empty() || sms.auth_token.is_empty() {
                return Err(ConfigError::Message("SMS account_sid and auth_token are required".into()));
            }
            if sms.from_number.is_empty() || sms.to_number.is_empty() {
                return Err(ConfigError::Message("SMS from_number and to_number are required".into()));
            }
            if sms.max_length == 0 {
                return Err(ConfigError::Message("SMS max_length must be greater than 0".into()));
            }
            if Url::parse(&sms.api_base).is_err() {
                return Err(ConfigError::Message("Invalid SMS api_base URL".into()));
            }
        }

        let email = &self.notifications.email;
        if email.enabled {
            if email.host.is_empty() || email.port == 0 {
                return Err(ConfigError::Message("SMTP host and port are required".into()));
            }
            if email.from_address.is_empty() || email.to_address.is_empty() {
                return Err(ConfigError::Message("SMTP from_address and to_address are required".into()));
            }
            if email.username.is_some() != email.password.is_some() {
                return Err(ConfigError::Message("SMTP username and password must be set together".into()));
            }
        }

        let chat = &self.notifications.chat;
        if chat.enabled {
            if chat.bot_token.is_empty() || chat.channel_id.is_empty() {
                return Err(ConfigError::Message("Chat bot_token and channel_id are required".into()));
            }
            if Url::parse(&chat.api_base).is_err() {
                return Err(ConfigError::Message("Invalid chat api_base URL".into()));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
