//! Error types for FATHOM operations

use thiserror::Error;

/// Pipeline orchestration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// A stage produced output that could not be decoded into its outcome
    /// type. Fatal to the turn, never to the process.
    #[error("Stage contract violation in '{stage}': {reason}")]
    StageContract { stage: String, reason: String },
}

/// Cache storage errors.
///
/// These always propagate to the caller. Degrading a store failure into
/// "always execute" would mask systemic storage outages, so the cache never
/// swallows them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Cache entry missing for fingerprint {fingerprint}")]
    EntryMissing { fingerprint: String },

    #[error("Cache store lock poisoned")]
    LockPoisoned,

    #[error("Snapshot serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Backing store execution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Query execution failed: {message}")]
    QueryFailed { message: String },

    #[error("Request to backing store failed with status {status}: {message}")]
    RequestFailed { status: i32, message: String },

    #[error("Invalid response from backing store: {reason}")]
    InvalidResponse { reason: String },
}

/// Collaborator (NLU-side) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NluError {
    #[error("No {collaborator} collaborator configured")]
    NotConfigured { collaborator: String },

    #[error("Invalid output from {collaborator}: {reason}")]
    InvalidOutput { collaborator: String, reason: String },
}

/// Top-level error type unifying all FATHOM error domains.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FathomError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Nlu(#[from] NluError),
}

/// Result type alias for FATHOM operations.
pub type FathomResult<T> = Result<T, FathomError>;

impl FathomError {
    /// Returns true if this is a stage contract violation, which ends the
    /// turn with a generic diagnostic instead of surfacing as an error.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            FathomError::Pipeline(PipelineError::StageContract { .. })
        )
    }
}

/// Build a stage contract violation error.
pub fn stage_contract(stage: &str, reason: impl Into<String>) -> FathomError {
    FathomError::Pipeline(PipelineError::StageContract {
        stage: stage.to_string(),
        reason: reason.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violation_detection() {
        let err = stage_contract("build", "missing status field");
        assert!(err.is_contract_violation());

        let err = FathomError::Cache(CacheError::LockPoisoned);
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn test_error_display_includes_context() {
        let err = ExecutorError::RequestFailed {
            status: 503,
            message: "backend overloaded".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("503"));
        assert!(text.contains("backend overloaded"));
    }
}
