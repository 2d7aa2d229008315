//! Common error types used throughout ptsmap.
//!
//! Every engine failure is returned to the caller. The one deliberate
//! degradation, the bootstrap fallback in lookup, is not an error and never
//! shows up here.

use crate::types::{StreamClass, TableStatus};

/// Common error type for ptsmap.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The class selector is unknown, or no table serves it.
    #[error("Invalid stream class: {0}")]
    InvalidStreamClass(String),

    /// The operation is not legal in the table's current lifecycle state.
    #[error("{class} table is not running (status: {status})")]
    NotRunning {
        class: StreamClass,
        status: TableStatus,
    },

    /// The operation requires an idle table.
    #[error("{class} table is not idle (status: {status})")]
    NotIdle {
        class: StreamClass,
        status: TableStatus,
    },

    /// Backing storage for the record pool could not be reserved.
    #[error("Failed to allocate {capacity} records for the {class} table")]
    AllocationFailure { class: StreamClass, capacity: usize },

    /// No correspondence was close enough to the queried offset.
    #[error("No timestamp matches offset {offset:#010x} on the {class} table")]
    NoMatch { class: StreamClass, offset: u32 },

    /// A configuration parameter was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a new InvalidStreamClass error.
    pub fn invalid_class<S: Into<String>>(selector: S) -> Self {
        Self::InvalidStreamClass(selector.into())
    }

    /// Create a new InvalidConfig error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the caller can reasonably retry later (different offset, or
    /// once the table has started).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoMatch { .. } | Self::NotRunning { .. })
    }

    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidStreamClass(_) => "invalid_stream_class",
            Self::NotRunning { .. } => "not_running",
            Self::NotIdle { .. } => "not_idle",
            Self::AllocationFailure { .. } => "allocation_failure",
            Self::NoMatch { .. } => "no_match",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
