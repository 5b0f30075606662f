//! Error types for the trellis ORM core
//!
//! Every fallible operation in the crate returns [`OrmResult`]. Malformed
//! calls surface a descriptive [`OrmError`]; absent data never errors and
//! resolves to empty results instead.

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for ORM operations
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// Entity name not present in the schema registry
    #[error("entity '{0}' is not registered")]
    UnknownEntity(String),

    /// Malformed schema declaration or payload shape
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid arguments to an update call
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// JSON conversion failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
