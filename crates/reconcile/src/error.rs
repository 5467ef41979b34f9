//! Error types for reconciliation runs.
//!
//! Errors are categorized so the caller at the run boundary can decide how to
//! report and abort. Every category is fatal for the current run; nothing in
//! this crate retries.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing input files, unknown backend selection, unparsable descriptors
    Configuration,
    /// The desired-state model failed structural or semantic checks
    Validation,
    /// The persisted-state backend is unreachable or a load/save failed
    Storage,
    /// A live-cluster read or mutation failed
    Execution,
}

impl ErrorCategory {
    /// Short label used when printing errors.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::Storage => "storage",
            Self::Execution => "execution",
        }
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Invalid or missing configuration",
            Self::Validation => "Topology failed validation",
            Self::Storage => "State backend failure",
            Self::Execution => "Cluster operation failed",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Configuration => "Check the command line options and the client config file",
            Self::Validation => "Fix every reported finding in the topology descriptor",
            Self::Storage => {
                "Check that the state backend is reachable; previously saved state is unchanged"
            }
            Self::Execution => {
                "Actions before the failure were applied and are not rolled back; re-run to converge"
            }
        }
    }
}

/// Errors that can occur while loading, planning, applying, or persisting.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration problem detected before touching the cluster
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong with the configuration
        message: String,
    },

    /// A topology descriptor could not be read or parsed
    #[error("invalid descriptor {}: {message}", path.display())]
    Descriptor {
        /// Descriptor file or directory
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// All validation findings for a topology, reported together
    #[error("topology validation failed:\n{}", findings.join("\n"))]
    Validation {
        /// Every finding, one per entry
        findings: Vec<String>,
    },

    /// The backend medium cannot be reached or created
    #[error("state backend '{backend}' unavailable: {message}")]
    StorageUnavailable {
        /// Backend variant name
        backend: &'static str,
        /// Underlying cause
        message: String,
    },

    /// A backend operation failed
    #[error("state backend error: {message}")]
    Storage {
        /// Underlying cause
        message: String,
    },

    /// A live-cluster mutation failed while running a plan
    #[error("action '{action}' failed: {message}")]
    Execution {
        /// Description of the failing action
        action: String,
        /// Underlying cause
        message: String,
    },

    /// A live-cluster read or transport call failed
    #[error("cluster error: {message}")]
    Cluster {
        /// Underlying cause
        message: String,
    },

    /// An execution plan was used after it already ran
    #[error("execution plan already ran and cannot be reused")]
    PlanClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// State (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config { .. } | Error::Descriptor { .. } => ErrorCategory::Configuration,
            Error::Validation { .. } => ErrorCategory::Validation,
            Error::StorageUnavailable { .. }
            | Error::Storage { .. }
            | Error::Io(_)
            | Error::Serialization(_) => ErrorCategory::Storage,
            Error::Execution { .. } | Error::Cluster { .. } | Error::PlanClosed => {
                ErrorCategory::Execution
            }
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Shorthand for a cluster error.
    pub fn cluster(message: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
        }
    }

    /// Whether this is a configuration error.
    pub fn is_config(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
