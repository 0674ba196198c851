//! Store configuration. Loading a file at a known path is in scope; walking
//! up a directory tree to *find* that path is a CLI-front-end concern this
//! crate does not implement.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, StoreError};

/// Top-level configuration document: `[store]` table in a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// The `[store]` table.
    pub store: StoreSection,
}

/// The `[store]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Root label every stored-object anchor carries.
    pub base_label: String,
    /// Prefix for the uid label.
    pub uid_prefix: String,
    /// Reaction content conventions.
    pub reactions: ReactionsConfig,
    /// Rate-limit retry policy.
    pub retries: RetryConfig,
    /// Advisory rate-limit cap, not enforced by the core.
    pub rate_limit: RateLimitConfig,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            base_label: gh_store_core::DEFAULT_BASE_LABEL.to_string(),
            uid_prefix: gh_store_core::DEFAULT_UID_PREFIX.to_string(),
            reactions: ReactionsConfig::default(),
            retries: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Reaction content used by the processed/initial-state markers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReactionsConfig {
    /// Content of the "consumed" reaction.
    pub processed: String,
    /// Content of the initial-state marker reaction.
    pub initial_state: String,
}

impl Default for ReactionsConfig {
    fn default() -> Self {
        Self {
            processed: gh_store_core::DEFAULT_PROCESSED_REACTION.to_string(),
            initial_state: gh_store_core::DEFAULT_INITIAL_STATE_REACTION.to_string(),
        }
    }
}

/// Rate-limit retry policy.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts before surfacing the transport error.
    pub max_attempts: u32,
    /// Base of the exponential backoff, in seconds.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 2.0,
        }
    }
}

/// Advisory rate-limit cap. Not enforced anywhere in this crate.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per hour the caller intends to stay under.
    pub max_requests_per_hour: Option<u32>,
}

impl StoreConfig {
    /// Parse a configuration document from a TOML string.
    ///
    /// # Errors
    /// Returns [`StoreError::Configuration`] if the document does not parse.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|err| StoreError::Configuration(err.to_string()))
    }

    /// Load a configuration document from an explicit file path.
    ///
    /// # Errors
    /// Returns [`StoreError::Configuration`] if the file cannot be read or does
    /// not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| StoreError::Configuration(format!("reading {}: {err}", path.display())))?;
        Self::from_toml_str(&contents)
    }
}
