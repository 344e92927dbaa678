//! Error types for privshield

use thiserror::Error;

/// Errors that can occur in the detection engine
///
/// Nothing here is fatal to the host: scan-path failures degrade to
/// pattern-only detection and rollback failures are surfaced as
/// non-fatal notices rather than propagated.
#[derive(Debug, Error)]
pub enum ShieldError {
    /// Classification collaborator failure (process gone, transport broken, etc.)
    #[error("Classification error: {0}")]
    Classification(String),

    /// Bounded operation exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Referenced surface or pending action does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rule table or store configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No plausible surface could be located for a compensating rollback
    #[error("Rollback target lost for surface '{surface}': {reason}")]
    RollbackTargetLost {
        surface: String,
        reason: String,
    },

    /// Pattern rule failed to compile
    #[error("Invalid pattern for rule '{rule}': {reason}")]
    Pattern {
        rule: String,
        reason: String,
    },
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ShieldError>;
