//! Engine error handling
//!
//! Provides typed errors for reconciliation and submission, with
//! descriptive messages and recovery suggestions.

use thiserror::Error;

/// Errors reported by a host transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The host refused the batch
    #[error("Batch rejected by host: {0}")]
    Rejected(String),

    /// The host is not connected to a document
    #[error("Host unavailable")]
    Unavailable,
}

/// Errors that can occur while synchronizing state
#[derive(Error, Debug)]
pub enum SyncError {
    /// The host had no state to read at startup
    #[error("No shared state available from host")]
    NoState,

    /// A stored value could not be parsed
    #[error("Failed to decode value for key '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A pending value could not be encoded
    #[error("Failed to encode value for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The host rejected an outgoing batch
    #[error("Failed to submit {entries} pending update(s): {source}")]
    Submit {
        entries: usize,
        #[source]
        source: HostError,
    },
}

impl SyncError {
    /// Check if this error is recoverable
    ///
    /// Decode failures only affect a single key; submission failures can be
    /// retried by re-applying the lost deltas.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::Decode { .. } | SyncError::Submit { .. })
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::NoState => {
                Some("Make sure the host document is loaded before starting the engine.")
            }
            SyncError::Decode { .. } => {
                Some("The key was skipped. Rewrite it with a valid encoded value to recover.")
            }
            SyncError::Submit { .. } => {
                Some("Pending updates were discarded. Submit the deltas again and call send_updates.")
            }
            SyncError::Encode { .. } => None,
        }
    }
}

/// Result type for engine operations
pub type SyncResult<T> = Result<T, SyncError>;
