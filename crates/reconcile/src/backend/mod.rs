//! Backend abstraction for persisted binding state.
//!
//! The [`Backend`] trait defines the storage lifecycle used by the state
//! cache, allowing for different media:
//! - A single local file ([`file::FileBackend`])
//! - A remote Redis-compatible key-value store ([`redis::RedisBackend`])
//! - Counting or failing fakes in tests

pub mod file;
pub mod redis;
pub mod resp;

use crate::binding::AccessBinding;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default state file, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = ".cluster-state";

/// Storage port for previously-applied bindings.
///
/// A backend is stateful across one `create_or_open` → ... → `close`
/// lifecycle and must accept being reopened after `close`.
pub trait Backend {
    /// Short name of the variant, for logs and errors.
    fn name(&self) -> &'static str;

    /// Establish the handle to the store. Idempotent.
    fn create_or_open(&mut self) -> Result<()>;

    /// Record which logical collection the next save writes.
    fn save_type(&mut self, tag: &str) -> Result<()>;

    /// Replace the persisted collection with exactly `bindings`.
    ///
    /// Must not leave a partially written collection behind on failure.
    fn save_bindings(&mut self, bindings: &HashSet<AccessBinding>) -> Result<()>;

    /// Read the persisted collection; empty if nothing was ever saved.
    fn load(&mut self) -> Result<HashSet<AccessBinding>>;

    /// Release resources. Safe to call repeatedly or before opening.
    fn close(&mut self);
}

/// Available backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Local file
    #[default]
    File,
    /// Remote Redis-compatible store
    Redis,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "file" => Ok(Self::File),
            "redis" => Ok(Self::Redis),
            other => Err(Error::config(format!(
                "unknown state backend '{other}' (expected 'default' or 'redis')"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "default"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

/// Fully resolved backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSettings {
    /// Persist to a single local file
    File {
        /// State file location
        path: PathBuf,
    },
    /// Persist to a Redis-compatible server
    Redis {
        /// Server host name or address
        host: String,
        /// Server port
        port: u16,
    },
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self::File {
            path: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

impl BackendSettings {
    /// Variant selected by these settings.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::File { .. } => BackendKind::File,
            Self::Redis { .. } => BackendKind::Redis,
        }
    }

    /// Construct the configured backend.
    pub fn build(&self) -> Box<dyn Backend> {
        match self {
            Self::File { path } => Box::new(file::FileBackend::new(path.clone())),
            Self::Redis { host, port } => Box::new(redis::RedisBackend::new(host.clone(), *port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("default".parse::<BackendKind>().unwrap(), BackendKind::File);
        assert_eq!("FILE".parse::<BackendKind>().unwrap(), BackendKind::File);
        assert_eq!(" Redis ".parse::<BackendKind>().unwrap(), BackendKind::Redis);
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let err = "zookeeper".parse::<BackendKind>().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("zookeeper"));
    }

    #[test]
    fn test_settings_build() {
        let file = BackendSettings::default();
        assert_eq!(file.kind(), BackendKind::File);
        assert_eq!(file.build().name(), "file");

        let redis = BackendSettings::Redis {
            host: "localhost".into(),
            port: 6379,
        };
        assert_eq!(redis.kind(), BackendKind::Redis);
        assert_eq!(redis.build().name(), "redis");
    }
}
