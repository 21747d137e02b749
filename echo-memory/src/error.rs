//! Error types for echo-memory

use thiserror::Error;

/// Errors that can occur in the memory engine
#[derive(Debug, Error)]
pub enum MemoryError {
    /// A node with this id is already stored
    #[error("Duplicate memory id: {0}")]
    DuplicateId(String),

    /// An edge endpoint does not reference a stored node
    #[error("Dangling edge reference: {0}")]
    DanglingReference(String),

    /// Memory not found
    #[error("Memory not found: {0}")]
    NotFound(String),

    /// Malformed or incomplete operation input
    #[error("Invalid operation: {0}")]
    Validation(String),

    /// Operation issued outside the ready lifecycle state
    #[error("Engine not ready: {0}")]
    Lifecycle(String),

    /// Snapshot is unreadable or carries an unsupported format version
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Builder error
    #[error("Builder error: {0}")]
    Builder(#[from] crate::node::MemoryNodeBuilderError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    /// Create a duplicate-id error
    pub fn duplicate_id(id: impl std::fmt::Display) -> Self {
        Self::DuplicateId(id.to_string())
    }

    /// Create a dangling-reference error
    pub fn dangling(id: impl std::fmt::Display) -> Self {
        Self::DanglingReference(id.to_string())
    }

    /// Create a not-found error
    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(id.to_string())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a lifecycle error
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }
}

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;
