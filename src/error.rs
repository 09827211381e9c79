//! Error types for surrogate-db
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// surrogate-db error types
#[derive(Error, Debug)]
pub enum Error {
    /// Store opened without `initialize` but nothing exists at the path
    #[error("Store not found at {0}\nOpen with initialize=true to create a new store")]
    StoreNotFound(String),

    /// Named scope is not in the store
    #[error("Scope not found: {0}")]
    ScopeNotFound(String),

    /// Named design is not recorded for the scope
    #[error("Design not found: {design} (scope {scope})")]
    DesignNotFound {
        /// Scope name
        scope: String,
        /// Design name
        design: String,
    },

    /// Meta-model id is not in the store
    #[error("Meta-model not found: {0}")]
    MetaModelNotFound(u32),

    /// Data does not conform to the scope's factor/measure schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Data of one scope offered where another scope is required
    #[error("Scope mismatch: expected scope {expected}, got {actual}")]
    ScopeMismatch {
        /// Required scope
        expected: String,
        /// Scope of the offered data
        actual: String,
    },

    /// Scope definition is malformed
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Invalid argument to an operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Normal equations or kernel matrix could not be factored
    #[error("Singular matrix: {0}\nCheck for constant or duplicated input columns")]
    SingularMatrix(String),

    /// Storage error (catalog/Parquet layout)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
