//! Error types for the store layer

use thiserror::Error;

/// Store layer errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A field failed validation. The rendered message is part of the API
    /// contract and is asserted verbatim by callers.
    #[error("the value '[{values}]' for '{field}' is invalid: {reason}")]
    InvalidFieldValue {
        field: String,
        values: String,
        reason: String,
    },

    /// Record not found
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Another record of the same collection already owns this name
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// A mutation was attempted through a read-only transaction
    #[error("transaction is read-only")]
    ReadOnlyTx,

    /// Internal bookkeeping is inconsistent. Not expected at runtime;
    /// indicates a programming fault and fails the whole operation.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Record (de)serialization error
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Underlying storage error
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
