use std::fmt;

/// The main error type for factorgate operations.
#[derive(Debug, thiserror::Error)]
pub enum FactorGateError {
    /// Malformed input, rejected before any lookup is attempted.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A factor evaluator could not produce a state.
    ///
    /// The engine treats the affected factor as [`Unknown`] rather than
    /// failing the whole evaluation, so callers usually only see this
    /// error from direct evaluator calls.
    ///
    /// [`Unknown`]: crate::factor::FactorState::Unknown
    #[error("Factor evaluator unavailable: {factor}: {reason}")]
    EvaluatorUnavailable {
        /// Name of the factor whose evaluator failed.
        factor: String,
        /// Why the evaluator could not produce a state.
        reason: String,
    },

    /// The session decision cache could not be written.
    #[error("Decision cache write failed: {0}")]
    Persistence(String),

    /// An underlying store failed during a read.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The user did not present enough factors to authenticate.
    ///
    /// Produced by [`DenialHandler::deny`](crate::denial::DenialHandler::deny)
    /// after the full logout sequence has run. Carries the safe landing
    /// page the caller should redirect to.
    #[error("Not enough factors to authenticate, redirecting to {redirect}")]
    InsufficientFactors {
        /// Where to send the user after denial.
        redirect: String,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience result type for factorgate operations.
pub type Result<T> = std::result::Result<T, FactorGateError>;

impl FactorGateError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn evaluator_unavailable(factor: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::EvaluatorUnavailable {
            factor: factor.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is safe to show to end users.
    ///
    /// Everything except the insufficient-factors denial is an internal
    /// condition that hosts should log rather than render.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::InsufficientFactors { .. })
    }
}
