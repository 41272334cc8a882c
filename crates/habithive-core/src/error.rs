//! Core error types for habithive-core.
//!
//! This module defines the error hierarchy using thiserror. Every error the
//! engine surfaces is terminal from its point of view: retry-worthy
//! conditions (transient storage failures) belong to the persistence layer,
//! not this pure core.

use thiserror::Error;

/// Core error type for habithive-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A referenced habit, hive, invite, or log does not exist or is not
    /// visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller lacks the required role for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The operation conflicts with current state.
    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Malformed configuration or input values.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Storage-layer errors surfaced to the caller.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Conflicts between a requested transition and current state.
#[derive(Error, Debug)]
pub enum ConflictError {
    /// The invite's expiry timestamp has passed.
    #[error("invite has expired")]
    InviteExpired,

    /// The invite's use count has reached its limit.
    #[error("invite has no remaining uses")]
    InviteExhausted,

    /// The hive's active roster is at capacity.
    #[error("hive is full (max {max_members} members)")]
    HiveFull { max_members: u32 },

    /// A terminal action was repeated (e.g. archiving an archived habit).
    #[error("{0}")]
    Duplicate(String),
}

/// Validation errors for targets, thresholds, and window configuration.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value for a named field.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// A window size must be a positive number of days.
    #[error("window size must be positive, got {0}")]
    NonPositiveWindow(i64),

    /// A threshold rule requires a threshold value.
    #[error("rule 'threshold' requires a threshold value")]
    MissingThreshold,
}

impl ValidationError {
    /// Shorthand for field-level validation failures.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
