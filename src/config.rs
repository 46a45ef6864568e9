use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::frame::ONE_HOUR_MS;
use crate::rl::networks::actor_critic::MIN_INPUT_SIZE;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base directory for persisted model snapshots
    pub model_folder: String,
    pub a3c: A3cConfig,
    /// Bin count of the one-hour lookback frame
    pub frame_size: usize,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct A3cConfig {
    /// Frame length fed to the network
    #[serde(alias = "inputsize")]
    pub input_size: usize,
    /// Discount factor applied to the bootstrapped return
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// SGD step size for the batch update
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_gamma() -> f64 {
    0.99
}

fn default_learning_rate() -> f64 {
    1e-3
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Table holding raw price ticks
    #[serde(default = "default_price_table")]
    pub price_table: String,
    /// Table holding logged model predictions
    #[serde(default = "default_prediction_table")]
    pub prediction_table: String,
    /// Longest wait for a pooled connection
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_max_connections() -> u32 {
    5
}

fn default_price_table() -> String {
    "price_points".to_string()
}

fn default_prediction_table() -> String {
    "model_predictions".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per store call, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Time limit on a single attempt
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rotated log files; console only when unset
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("model_folder", "./models")?
            .set_default("frame_size", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("A3C_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // A3C_A3C__INPUT_SIZE, A3C_DATABASE__URL, ...
            .add_source(
                Environment::with_prefix("A3C")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Configuration suitable for local runs and tests
    pub fn default_config(model_folder: &str) -> Self {
        Self {
            model_folder: model_folder.to_string(),
            a3c: A3cConfig {
                input_size: 60,
                gamma: default_gamma(),
                learning_rate: default_learning_rate(),
            },
            frame_size: 60,
            database: DatabaseConfig {
                url: "postgres://localhost/a3c".to_string(),
                max_connections: default_max_connections(),
                price_table: default_price_table(),
                prediction_table: default_prediction_table(),
                acquire_timeout_ms: default_acquire_timeout_ms(),
            },
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(self.a3c.gamma > 0.0 && self.a3c.gamma < 1.0) {
            errors.push(format!("a3c.gamma must be in (0, 1), got {}", self.a3c.gamma));
        }

        if self.a3c.learning_rate <= 0.0 {
            errors.push("a3c.learning_rate must be positive".to_string());
        }

        if self.a3c.input_size < MIN_INPUT_SIZE {
            errors.push(format!(
                "a3c.input_size must be at least {MIN_INPUT_SIZE}, got {}",
                self.a3c.input_size
            ));
        }

        if self.frame_size == 0 || ONE_HOUR_MS % self.frame_size as i64 != 0 {
            errors.push(format!(
                "frame_size must evenly divide one hour of milliseconds, got {}",
                self.frame_size
            ));
        }

        for (key, table) in [
            ("database.price_table", &self.database.price_table),
            ("database.prediction_table", &self.database.prediction_table),
        ] {
            if !crate::adapters::is_valid_identifier(table) {
                errors.push(format!("{key} is not a valid table identifier: {table:?}"));
            }
        }

        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }

        if self.retry.attempt_timeout_ms == 0 {
            errors.push("retry.attempt_timeout_ms must be positive".to_string());
        }

        if self.database.acquire_timeout_ms == 0 {
            errors.push("database.acquire_timeout_ms must be positive".to_string());
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            errors.push("retry.base_delay_ms must not exceed retry.max_delay_ms".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
