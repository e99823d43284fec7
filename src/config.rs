//! Engine configuration.
//!
//! Loaded from YAML. Every field has a default so a partial (or empty)
//! document is valid:
//!
//! ```yaml
//! sync:
//!   enabled: true
//!   bulk:
//!     download_enabled: true
//!     upload_enabled: false
//!     require_preview: true
//!   individual:
//!     require_confirmation: true
//!   privacy:
//!     scan_for_secrets: true
//! portfolio:
//!   root: ~/.portfolio
//!   repository: portfolio
//! cache:
//!   ttl_secs: 900
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default values
pub mod defaults {
    pub const REPOSITORY: &str = "portfolio";
    pub const PORTFOLIO_ROOT: &str = "portfolio";
    pub const CACHE_TTL_SECS: u64 = 15 * 60;
    pub const ACTION_GRACE_SECS: u64 = 2 * 60;
    pub const BATCH_SIZE: usize = 5;
    pub const BATCH_DELAY_MS: u64 = 100;
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const ENRICH_MAX_BYTES: u64 = 10 * 1024;
    pub const MIN_CONFIDENCE: f64 = 0.5;
    pub const MAX_PER_ELEMENT: usize = 20;
    pub const DISCOVERY_BUDGET_MS: u64 = 3_000;
}

// ============================================================================
// Top level
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub portfolio: PortfolioConfig,
    pub cache: CacheConfig,
    pub relationships: RelationshipConfig,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.batch_size == 0 {
            return Err(Error::Config("cache.batch_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.relationships.min_confidence) {
            return Err(Error::Config(format!(
                "relationships.min_confidence must be within [0, 1], got {}",
                self.relationships.min_confidence
            )));
        }
        if self.portfolio.repository.trim().is_empty() {
            return Err(Error::Config("portfolio.repository must not be empty".into()));
        }
        Ok(())
    }
}

// ============================================================================
// sync.*
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Master switch. When false only remote listing is allowed.
    pub enabled: bool,
    pub bulk: BulkConfig,
    pub individual: IndividualConfig,
    pub privacy: PrivacyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    pub download_enabled: bool,
    pub upload_enabled: bool,
    pub require_preview: bool,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self { download_enabled: false, upload_enabled: false, require_preview: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndividualConfig {
    pub require_confirmation: bool,
}

impl Default for IndividualConfig {
    fn default() -> Self {
        Self { require_confirmation: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub scan_for_secrets: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self { scan_for_secrets: true }
    }
}

// ============================================================================
// portfolio.*
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Local portfolio root; elements live at `<root>/<type>/<name>.md`.
    pub root: PathBuf,
    /// Remote repository name, owned by the authenticated user.
    pub repository: String,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(defaults::PORTFOLIO_ROOT),
            repository: defaults::REPOSITORY.to_string(),
        }
    }
}

// ============================================================================
// cache.*
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// How long after a mutating action reads force a refresh.
    pub action_grace_secs: u64,
    /// Maximum concurrent file fetches per batch.
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Files below this size get their header fetched for metadata.
    pub enrich_max_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::CACHE_TTL_SECS,
            action_grace_secs: defaults::ACTION_GRACE_SECS,
            batch_size: defaults::BATCH_SIZE,
            batch_delay_ms: defaults::BATCH_DELAY_MS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            enrich_max_bytes: defaults::ENRICH_MAX_BYTES,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn action_grace(&self) -> Duration {
        Duration::from_secs(self.action_grace_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// relationships.*
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipConfig {
    pub min_confidence: f64,
    pub max_per_element: usize,
    /// Wall-clock budget for a full-index discovery pass.
    pub discovery_budget_ms: u64,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            min_confidence: defaults::MIN_CONFIDENCE,
            max_per_element: defaults::MAX_PER_ELEMENT,
            discovery_budget_ms: defaults::DISCOVERY_BUDGET_MS,
        }
    }
}

impl RelationshipConfig {
    pub fn discovery_budget(&self) -> Duration {
        Duration::from_millis(self.discovery_budget_ms)
    }
}
