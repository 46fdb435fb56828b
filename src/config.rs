//! Service configuration for the `ratekeeper` binary.
//!
//! Settings come from an optional YAML file, then environment variables
//! prefixed `RATEKEEPER__` with `__` between path segments, for example
//! `RATEKEEPER__STORE__REDIS_URL`. Every field has a default.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{LimitError, Result};
use crate::ratelimit::{DEFAULT_CONFIG_KEY, DEFAULT_UNHEALTHY_AFTER};
use crate::store::default_not_found_markers;

/// Main configuration for the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Shared store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Rate limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Which shared store backs the limiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, for single instances and development
    #[default]
    Memory,
    /// Redis, shared between instances
    Redis,
}

/// Shared store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Connection URL, used by the redis backend
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Seconds between sweeps of expired entries, used by the memory backend
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: default_redis_url(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

fn default_purge_interval() -> u64 {
    60
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Key of the configuration document in the shared store
    #[serde(default = "default_config_key")]
    pub config_key: String,

    /// Error message fragments that mean "key not found"
    #[serde(default = "default_not_found_markers")]
    pub not_found_markers: Vec<String>,

    /// Path prefix of the admin routes
    #[serde(default = "default_admin_prefix")]
    pub admin_prefix: String,

    /// Consecutive refresh failures before the refresher reports unhealthy
    #[serde(default = "default_unhealthy_after")]
    pub unhealthy_after: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            config_key: default_config_key(),
            not_found_markers: default_not_found_markers(),
            admin_prefix: default_admin_prefix(),
            unhealthy_after: default_unhealthy_after(),
        }
    }
}

fn default_config_key() -> String {
    DEFAULT_CONFIG_KEY.to_string()
}

fn default_admin_prefix() -> String {
    "/admin/ratelimit".to_string()
}

fn default_unhealthy_after() -> u32 {
    DEFAULT_UNHEALTHY_AFTER
}

impl ServiceConfig {
    /// Load configuration from an optional YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }
        Self::build(builder.add_source(Self::environment()))
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("RATEKEEPER")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("limiter.not_found_markers")
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config = builder
            .build()
            .map_err(|e| LimitError::Config(e.to_string()))?;
        let settings: ServiceConfig = config
            .try_deserialize()
            .map_err(|e| LimitError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !self.limiter.admin_prefix.starts_with('/') || self.limiter.admin_prefix.len() < 2 {
            return Err(LimitError::Config(format!(
                "admin_prefix must be a non-root path starting with '/', got {:?}",
                self.limiter.admin_prefix
            )));
        }
        if self.store.purge_interval_secs == 0 {
            return Err(LimitError::Config("purge_interval_secs must be at least 1".to_string()));
        }
        if self.limiter.config_key.is_empty() {
            return Err(LimitError::Config("config_key must not be empty".to_string()));
        }
        Ok(())
    }
}
