#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch, as stored by the ledger clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpochSeconds(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("{field} {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{field} must be within [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },
}

impl ContractViolation {
    pub fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidValue { field, reason }
    }

    /// Name of the offending input field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidValue { field, .. } | Self::OutOfRange { field, .. } => field,
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}
