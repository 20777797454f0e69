#![forbid(unsafe_code)]

pub mod common;
pub mod error;
pub mod form;
pub mod ledger;
pub mod payload;
pub mod record;

pub use common::{ContractViolation, EpochSeconds, Validate};
pub use error::{DecodeError, LedgerError};
