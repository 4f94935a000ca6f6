//! Engine configuration
//!
//! Values come from built-in defaults, an optional TOML file and finally
//! `BOOK_*` environment variables, in that order of precedence.

use crate::constants::{BP_SCALE, CONFIG_ENV_PREFIX, DEFAULT_FEE_BPS};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Book engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fee withheld from every deposit, in basis points
    pub fee_bps: u32,
    /// Keep emitted events in the in-memory journal
    pub journal_events: bool,
    /// Journal capacity, oldest events are evicted first (0 = unbounded)
    pub max_journal_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
            journal_events: true,
            max_journal_events: 0,
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("fee_bps", i64::from(defaults.fee_bps))?
            .set_default("journal_events", defaults.journal_events)?
            .set_default("max_journal_events", defaults.max_journal_events as i64)?;

        if let Some(path) = path {
            debug!("Loading engine configuration from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fee_bps > BP_SCALE {
            return Err(ConfigError::Message(format!(
                "fee_bps must be at most {BP_SCALE}, got {}",
                self.fee_bps
            )));
        }
        Ok(())
    }

    /// Override the fee rate
    #[must_use]
    pub fn with_fee_bps(mut self, fee_bps: u32) -> Self {
        self.fee_bps = fee_bps;
        self
    }

    /// Disable the in-memory event journal
    #[must_use]
    pub fn without_journal(mut self) -> Self {
        self.journal_events = false;
        self
    }
}
