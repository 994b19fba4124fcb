//! Configuration management
//!
//! YAML configuration with:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Outbound email; when absent emails are logged and dropped
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// development, staging or production
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
        }
    }
}

const ENVIRONMENTS: &[&str] = &["development", "staging", "production"];

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    25
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    900
}

/// Per-client token bucket settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LimiterConfig {
    #[serde(default = "default_limiter_enabled")]
    pub enabled: bool,
    /// Sustained refill rate
    #[serde(default = "default_rps")]
    pub requests_per_second: f64,
    /// Bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_limiter_enabled() -> bool {
    true
}

fn default_rps() -> f64 {
    2.0
}

fn default_burst() -> u32 {
    4
}

impl LimiterConfig {
    /// Time to refill one permit, or `None` when the rate has no nanosecond
    /// representation
    pub fn replenish_period(&self) -> Option<Duration> {
        let rps = self.requests_per_second;
        if !rps.is_finite() || rps <= 0.0 {
            return None;
        }
        let period = Duration::try_from_secs_f64(1.0 / rps).ok()?;
        (!period.is_zero() && period.as_nanos() <= u128::from(u64::MAX)).then_some(period)
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: default_limiter_enabled(),
            requests_per_second: default_rps(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Exact origins allowed to make cross-origin requests
    #[serde(default)]
    pub trusted_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_smtp_sender")]
    pub sender: String,
}

fn default_smtp_port() -> u16 {
    25
}

fn default_smtp_sender() -> String {
    "Greenlight <no-reply@greenlight.local>".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub target: LogTarget,
    /// Directory for log files (file and both targets)
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Console,
    File,
    Both,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_log_prefix() -> String {
    "greenlight".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "sqlite://./data/greenlight.db".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            limiter: LimiterConfig::default(),
            cors: CorsConfig::default(),
            smtp: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("GREENLIGHT_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                Self::from_file(path)?
            }
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("[CONFIG] No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/greenlight/config.yaml"),
            dirs::config_dir()
                .map(|p| p.join("greenlight/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; unparsable values are ignored
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server
        if let Some(host) = lookup("GREENLIGHT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("GREENLIGHT_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(env) = lookup("GREENLIGHT_ENV") {
            self.server.environment = env;
        }

        // Database
        if let Some(url) = lookup("GREENLIGHT_DB_DSN").or_else(|| lookup("DATABASE_URL")) {
            self.database.url = url;
        }

        // Rate limiter
        if let Some(enabled) = lookup("GREENLIGHT_LIMITER_ENABLED").and_then(|v| v.parse().ok()) {
            self.limiter.enabled = enabled;
        }
        if let Some(rps) = lookup("GREENLIGHT_LIMITER_RPS").and_then(|v| v.parse().ok()) {
            self.limiter.requests_per_second = rps;
        }
        if let Some(burst) = lookup("GREENLIGHT_LIMITER_BURST").and_then(|v| v.parse().ok()) {
            self.limiter.burst = burst;
        }

        // CORS
        if let Some(origins) = lookup("GREENLIGHT_CORS_TRUSTED_ORIGINS") {
            self.cors.trusted_origins = origins.split_whitespace().map(str::to_string).collect();
        }

        // SMTP
        if let Some(host) = lookup("SMTP_HOST") {
            let smtp = self.smtp.get_or_insert_with(|| SmtpConfig {
                host: host.clone(),
                port: default_smtp_port(),
                username: String::new(),
                password: String::new(),
                sender: default_smtp_sender(),
            });
            smtp.host = host;
        }
        if let Some(ref mut smtp) = self.smtp {
            if let Some(port) = lookup("SMTP_PORT").and_then(|p| p.parse().ok()) {
                smtp.port = port;
            }
            if let Some(username) = lookup("SMTP_USERNAME") {
                smtp.username = username;
            }
            if let Some(password) = lookup("SMTP_PASSWORD") {
                smtp.password = password;
            }
            if let Some(sender) = lookup("SMTP_SENDER") {
                smtp.sender = sender;
            }
        }

        // Logging
        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("GREENLIGHT_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
        if let Some(target) = lookup("GREENLIGHT_LOG_TARGET") {
            self.logging.target = match target.to_lowercase().as_str() {
                "file" => LogTarget::File,
                "both" => LogTarget::Both,
                _ => LogTarget::Console,
            };
        }
        if let Some(dir) = lookup("GREENLIGHT_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if !ENVIRONMENTS.contains(&self.server.environment.as_str()) {
            anyhow::bail!(
                "Invalid environment: {}. Must be one of {:?}",
                self.server.environment,
                ENVIRONMENTS
            );
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections < self.database.min_connections {
            anyhow::bail!(
                "database.max_connections ({}) must be >= database.min_connections ({})",
                self.database.max_connections,
                self.database.min_connections
            );
        }

        let rps = self.limiter.requests_per_second;
        if !rps.is_finite() || rps <= 0.0 {
            anyhow::bail!("limiter.requests_per_second must be a positive number, got {}", rps);
        }

        if self.limiter.replenish_period().is_none() {
            anyhow::bail!(
                "limiter.requests_per_second {} is outside the supported range (one permit per nanosecond at most)",
                rps
            );
        }

        if self.limiter.burst == 0 {
            anyhow::bail!("limiter.burst must be greater than 0");
        }

        Ok(())
    }
}
