//! Error types for zone reconciliation
//!
//! Structural failures (unreachable backend, malformed batches) abort a pass.
//! Per-change failures (unroutable names, unknown record types) are isolated
//! by the caller and reported next to the change that caused them.

use thiserror::Error;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for zonesync
#[derive(Error, Debug)]
pub enum Error {
    /// The backend could not be reached or rejected the call
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend reports that the requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// No zone owns the given name or address
    #[error("No zone owns '{name}': {reason}")]
    UnroutableChange {
        /// DNS name or address that could not be routed
        name: String,
        /// Why routing failed
        reason: String,
    },

    /// Caller handed over batches that violate the input contract
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A single change carries a value its record type cannot hold
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A record type reached record construction without a backend mapping
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a backend-unavailable error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an unroutable-change error
    pub fn unroutable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnroutableChange {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-input error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Create an invalid-record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create an unknown-record-type error
    pub fn unknown_record_type(msg: impl Into<String>) -> Self {
        Self::UnknownRecordType(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the backend reported absence rather than failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error must abort the whole reconciliation pass.
    ///
    /// Routing and record-mapping failures only affect the change that
    /// produced them.
    pub fn aborts_pass(&self) -> bool {
        !matches!(
            self,
            Self::NotFound(_)
                | Self::UnroutableChange { .. }
                | Self::InvalidRecord(_)
                | Self::UnknownRecordType(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Treat a "not found" outcome as an empty result.
///
/// Every listing call site in the reconciler goes through this so that an
/// absent zone or record set never aborts a pass.
pub(crate) fn empty_if_not_found<T: Default>(result: Result<T>) -> Result<T> {
    match result {
        Err(e) if e.is_not_found() => Ok(T::default()),
        other => other,
    }
}
