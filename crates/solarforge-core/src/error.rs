use crate::forge_state::IssueForgeState;

/// Core domain errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid forge state transition from {from} to {to}")]
    InvalidStateTransition {
        from: IssueForgeState,
        to: IssueForgeState,
    },

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid conversion policy: {0}")]
    InvalidPolicy(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}
