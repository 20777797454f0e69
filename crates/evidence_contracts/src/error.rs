#![forbid(unsafe_code)]

use crate::ledger::RecordKind;
use crate::ContractViolation;

/// A field tree did not have the shape the record layout requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{path}` {reason}")]
pub struct DecodeError {
    pub path: String,
    pub reason: &'static str,
}

impl DecodeError {
    pub fn new(path: impl Into<String>, reason: &'static str) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }

    pub fn missing(path: impl Into<String>) -> Self {
        Self::new(path, "is missing")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    Validation(ContractViolation),
    #[error("ledger data is malformed: {0}")]
    Decode(#[from] DecodeError),
    #[error("no {kind} record exists with id {id}")]
    NotFound { kind: RecordKind, id: u64 },
    #[error("the request was cancelled before it completed")]
    UserCancelled,
    #[error("the ledger rejected the transaction: {reason}")]
    Execution { reason: String },
    #[error("the ledger endpoint could not be reached: {detail}")]
    Network { detail: String },
    #[error("a submission for this action is already in progress")]
    SubmissionInFlight,
}

impl From<ContractViolation> for LedgerError {
    fn from(v: ContractViolation) -> Self {
        LedgerError::Validation(v)
    }
}

impl LedgerError {
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Decode(_) => "decode",
            Self::NotFound { .. } => "not_found",
            Self::UserCancelled => "user_cancelled",
            Self::Execution { .. } => "execution",
            Self::Network { .. } => "network",
            Self::SubmissionInFlight => "submission_in_flight",
        }
    }

    /// Whether resubmitting a freshly built payload is a sensible next step.
    /// Nothing in this crate retries on its own.
    pub const fn is_terminal_for_attempt(&self) -> bool {
        matches!(
            self,
            Self::UserCancelled | Self::Execution { .. } | Self::Network { .. }
        )
    }
}
