//! Configuration types for the linewatch system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::classifier::KeywordSets;

/// Main linewatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinewatchConfig {
    /// Router connection settings
    pub router: RouterConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Tracker scheduling settings
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Log classification keywords
    #[serde(default)]
    pub keywords: KeywordSets,
}

impl LinewatchConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.router.validate()?;
        self.store.validate()?;
        self.tracker.validate()?;
        self.keywords.validate()?;
        Ok(())
    }
}

/// Router connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Host name or IP address of the router
    #[serde(default = "default_router_address")]
    pub address: String,

    /// Username (optional, some routers allow anonymous TR-064 reads)
    #[serde(default)]
    pub username: Option<String>,

    /// Password
    #[serde(default)]
    pub password: Option<String>,

    /// Use HTTPS on port 49443 instead of HTTP on 49000
    #[serde(default)]
    pub use_tls: bool,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_router_timeout_secs")]
    pub timeout_secs: u64,
}

impl RouterConfig {
    /// Validate the router configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.address.trim().is_empty() {
            return Err(crate::Error::config("Router address cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Router timeout must be > 0"));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(crate::Error::config(
                "Router password given without a username",
            ));
        }
        Ok(())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            address: default_router_address(),
            username: None,
            password: None,
            use_tls: false,
            timeout_secs: default_router_timeout_secs(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

/// Tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Interval between status polls (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Interval between device log syncs (in seconds)
    #[serde(default = "default_log_sync_interval_secs")]
    pub log_sync_interval_secs: u64,

    /// Capacity of the tracker event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.log_sync_interval_secs == 0 {
            return Err(crate::Error::config("Log sync interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            log_sync_interval_secs: default_log_sync_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_router_address() -> String {
    "fritz.box".to_string()
}

fn default_router_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_log_sync_interval_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    1000
}
