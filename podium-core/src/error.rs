//! # Error Handling
//!
//! Error types for Podium operations.
//!
//! I/O-originated errors carry their source and surface to the caller.
//! In-memory structural invariants are enforced by construction; their
//! violation is a programming error, not a recoverable `Err`.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Podium operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for Podium
#[derive(Error, Debug)]
pub enum Error {
    /// The requested member is not present in the set.
    #[error("key not found")]
    KeyNotFound,

    /// A caller-supplied value is unusable (NaN score, empty member, ...).
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A facade operation was invoked outside the `Started` state.
    #[error("ranker is not started")]
    NotStarted,

    /// Opening the score store directory or a segment file failed.
    #[error("failed to open score store at {path:?}")]
    StorageOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Appending or flushing a score store record failed.
    #[error("failed to write score store")]
    StorageWrite {
        #[source]
        source: std::io::Error,
    },

    /// Replaying the score store surfaced corruption or an I/O error.
    #[error("failed to read score store: {message}")]
    StorageRead {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl Error {
    /// Shorthand for an `InvalidArgument` with a formatted message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    /// Whether the error originates in the storage layer.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::StorageOpen { .. } | Error::StorageWrite { .. } | Error::StorageRead { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::invalid("score is NaN");
        assert_eq!(err.to_string(), "invalid argument: score is NaN");
        assert!(!err.is_storage());

        let err = Error::StorageWrite {
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(err.is_storage());
    }
}
