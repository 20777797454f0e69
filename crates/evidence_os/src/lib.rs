#![forbid(unsafe_code)]

pub mod actions;
pub mod cancellation;
pub mod config;
pub mod ledger_client;
pub mod rpc;
pub mod runtime;
pub mod submission;

pub use actions::LedgerActions;
pub use cancellation::CancellationToken;
pub use config::LedgerConfig;
pub use ledger_client::LedgerClient;
pub use runtime::EvidenceLedgerRuntime;
pub use submission::{ActionGate, Signer, SignerError, SubmissionPipeline};
