//! Rate limit configuration document and validation.
//!
//! The document is stored as JSON under a well-known key in the shared store.
//! It carries the master switch, the bucket interval, the refresh period of
//! the process-local cache, the counting algorithm and per-group limits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::error::{LimitError, Result};

/// Shortest accepted bucket interval, in seconds.
pub const MIN_INTERVAL_SECS: u64 = 30;
/// Longest accepted bucket interval, in seconds.
pub const MAX_INTERVAL_SECS: u64 = 86_400;
/// Refresh periods below this are replaced by [`DEFAULT_CACHE_TTL_SECS`].
pub const MIN_CACHE_TTL_SECS: u64 = 5;
/// Refresh period applied when the document declares none (or too short a one).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Validation failures for a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("intervalInSec must be between 30 and 86400, got {interval}")]
    IntervalOutOfRange { interval: u64 },

    #[error("group {group:?} must have a limit of at least 1")]
    GroupLimit { group: String },

    #[error("override {key:?} in group {group:?} must have a limit of at least 1")]
    OverrideLimit { group: String, key: String },

    #[error("unknown rate limit algorithm {0:?}")]
    UnknownAlgorithm(String),
}

/// The rate limit configuration document.
///
/// Missing fields decode to zero values and are then caught by
/// [`RateLimitConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Master switch; when false every request passes through
    #[serde(default)]
    pub enabled: bool,

    /// Length of one counting bucket in seconds
    #[serde(rename = "intervalInSec", default)]
    pub interval_secs: u64,

    /// Period of the background configuration refresher in seconds
    #[serde(rename = "inMemoryCacheTTL", default)]
    pub cache_ttl_secs: u64,

    /// Discriminant of the counting algorithm
    #[serde(default)]
    pub algorithm: String,

    /// Group name to group limits
    #[serde(default)]
    pub groups: BTreeMap<String, GroupConfig>,
}

/// Limits for one group of requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Default limit for every endpoint key in the group
    #[serde(default)]
    pub limit: u64,

    /// Per endpoint key limits
    #[serde(default)]
    pub overrides: BTreeMap<String, u64>,
}

impl GroupConfig {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            overrides: BTreeMap::new(),
        }
    }

    /// Add a per-key override.
    pub fn with_override(mut self, key: impl Into<String>, limit: u64) -> Self {
        self.overrides.insert(key.into(), limit);
        self
    }
}

impl RateLimitConfig {
    /// Create an enabled sliding-window document with no groups.
    pub fn new(interval_secs: u64) -> Self {
        Self {
            enabled: true,
            interval_secs,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            algorithm: crate::ratelimit::SLIDING_WINDOW.to_string(),
            groups: BTreeMap::new(),
        }
    }

    /// Add or replace a group.
    pub fn with_group(mut self, name: impl Into<String>, group: GroupConfig) -> Self {
        self.groups.insert(name.into(), group);
        self
    }

    /// Decode a document from its JSON form.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode the document to JSON.
    pub fn to_json_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Load a document from a YAML or JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit document");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a document from YAML. JSON input is accepted as well.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LimitError::Config(format!("Failed to parse rate limit document: {}", e)))
    }

    /// Replace refresh periods shorter than the minimum with the default.
    pub fn apply_defaults(&mut self) {
        if self.cache_ttl_secs < MIN_CACHE_TTL_SECS {
            self.cache_ttl_secs = DEFAULT_CACHE_TTL_SECS;
        }
    }

    /// Check the numeric constraints of the document.
    ///
    /// The algorithm discriminant is checked against the algorithm registry
    /// when the document is compiled.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&self.interval_secs) {
            return Err(ValidationError::IntervalOutOfRange {
                interval: self.interval_secs,
            });
        }

        for (name, group) in &self.groups {
            if group.limit < 1 {
                return Err(ValidationError::GroupLimit {
                    group: name.clone(),
                });
            }
            if let Some((key, _)) = group.overrides.iter().find(|(_, limit)| **limit < 1) {
                return Err(ValidationError::OverrideLimit {
                    group: name.clone(),
                    key: key.clone(),
                });
            }
        }

        Ok(())
    }

    /// Effective limit for a group and endpoint key.
    ///
    /// Returns `None` when the group is not configured.
    pub fn effective_limit(&self, group: &str, key: &str) -> Option<u64> {
        let group = self.groups.get(group)?;
        Some(group.overrides.get(key).copied().unwrap_or(group.limit))
    }

    /// Period of the background refresher.
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
