#![forbid(unsafe_code)]

pub mod endpoint;
pub mod memory_ledger;

pub use endpoint::{EndpointError, LedgerEndpoint, TransportKind};
pub use memory_ledger::{InMemoryLedger, InMemoryLedgerConfig};
