//! # strata-config
//!
//! Layered configuration loading for Strata using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`STRATA_*` prefix, `__` as separator)
//! 2. Project-level `.strata/config.toml`
//! 3. User-level `~/.config/strata/config.toml`
//! 4. Built-in defaults
//!
//! Figment maps `STRATA_STORAGE__BUCKET` -> `storage.bucket`,
//! `STRATA_RETRY__MAX_ATTEMPTS` -> `retry.max_attempts`, and so on.
//!
//! ```no_run
//! use strata_config::StrataConfig;
//!
//! let config = StrataConfig::load_with_dotenv().expect("config");
//! println!("database at {}", config.database.path);
//! ```

mod database;
mod error;
mod import;
mod retry;
mod storage;

pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use import::ImportConfig;
pub use retry::RetrySettings;
pub use storage::{StorageBackend, StorageConfig};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl StrataConfig {
    /// Load configuration from TOML files and environment variables, then validate it.
    ///
    /// Does NOT read `.env`; use [`Self::load_with_dotenv`] for that.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when extraction fails or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// Load `.env` from the current directory (if any) before [`Self::load`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Err(err) if !err.not_found() => Err(ConfigError::invalid(".env", err.to_string())),
            _ => Self::load(),
        }
    }

    /// Extract and validate from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when extraction fails or a value is out of range.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or layer providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".strata/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("STRATA_").split("__"))
    }

    /// Reject combinations the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first offending field as [`ConfigError::InvalidValue`], or
    /// [`ConfigError::NotConfigured`] for an S3 backend without a bucket.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.is_empty() {
            return Err(ConfigError::invalid("database.path", "must not be empty"));
        }
        if self.import.chunk_size == 0 {
            return Err(ConfigError::invalid("import.chunk_size", "must be at least 1"));
        }
        if self.import.parse_workers == 0 {
            return Err(ConfigError::invalid(
                "import.parse_workers",
                "must be at least 1",
            ));
        }
        if self.import.max_file_size == 0 {
            return Err(ConfigError::invalid(
                "import.max_file_size",
                "must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::invalid("retry.jitter", "must be within [0, 1]"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid(
                "retry.base_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }
        if self.storage.backend == StorageBackend::S3 && !self.storage.is_s3_configured() {
            return Err(ConfigError::NotConfigured {
                section: "storage".to_string(),
            });
        }
        Ok(())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("strata").join("config.toml"))
    }
}
