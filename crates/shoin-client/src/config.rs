//! Session configuration.
//!
//! Configs are RON files; every field is optional and falls back to the
//! values in [`constants`](crate::constants):
//!
//! ```ron
//! (
//!     backoff: (base_delay_ms: 500, max_delay_ms: 10000, jitter_ms: 250),
//!     connect_timeout_ms: 5000,
//!     resync: Request,
//! )
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backoff::BackoffConfig;
use crate::constants::{CONNECT_TIMEOUT, EVENT_CHANNEL_CAPACITY};

/// Errors loading a session config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
}

/// How a session recovers after a patch fails to apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResyncPolicy {
    /// Drop the connection and reopen it. Every fresh connection starts
    /// with a snapshot.
    #[default]
    Reconnect,
    /// Send `{"type":"resync"}` on the live connection and ignore patches
    /// until the snapshot arrives.
    Request,
}

/// Tunables for a sync session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backoff: BackoffConfig,
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    pub resync: ResyncPolicy,
    /// Capacity of the [`SessionEvent`](crate::SessionEvent) broadcast.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            connect_timeout: CONNECT_TIMEOUT,
            resync: ResyncPolicy::default(),
            event_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Load from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&source)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }
}

/// Serde adapter storing a `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
