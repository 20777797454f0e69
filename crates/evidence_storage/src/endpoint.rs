#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use evidence_contracts::ledger::{AccountAddress, ObjectId};
use evidence_contracts::payload::SignedPayload;
use serde_json::Value;

pub mod methods {
    pub const GET_OBJECT: &str = "sui_getObject";
    pub const GET_DYNAMIC_FIELD_OBJECT: &str = "suix_getDynamicFieldObject";
    pub const EXECUTE_TRANSACTION_BLOCK: &str = "sui_executeTransactionBlock";
    pub const DEV_INSPECT_TRANSACTION_BLOCK: &str = "sui_devInspectTransactionBlock";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Timeout,
    Tls,
    Dns,
    Connection,
    Transport,
}

impl TransportKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Tls => "tls",
            Self::Dns => "dns",
            Self::Connection => "connection",
            Self::Transport => "transport",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to obtain a response body from the ledger node. A response that
/// arrived but describes a failed transaction is not an `EndpointError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("{method}: {kind} failure: {detail}")]
    Transport {
        method: &'static str,
        kind: TransportKind,
        detail: String,
    },
    #[error("{method}: http status {status}")]
    HttpStatus { method: &'static str, status: u16 },
    #[error("{method}: rpc error {code}: {message}")]
    Rpc {
        method: &'static str,
        code: i64,
        message: String,
    },
    #[error("{method}: malformed response: {detail}")]
    MalformedResponse { method: &'static str, detail: String },
}

impl EndpointError {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Transport { method, .. }
            | Self::HttpStatus { method, .. }
            | Self::Rpc { method, .. }
            | Self::MalformedResponse { method, .. } => method,
        }
    }
}

/// Read and write access to a ledger node. Each call returns the `result`
/// member of the node's response, unparsed.
pub trait LedgerEndpoint {
    fn get_object(&self, object_id: ObjectId) -> Result<Value, EndpointError>;

    fn get_dynamic_field_object(&self, parent: ObjectId, key: u64) -> Result<Value, EndpointError>;

    fn execute_transaction(&self, signed: &SignedPayload) -> Result<Value, EndpointError>;

    /// Runs a transaction kind without committing it.
    fn dev_inspect(&self, sender: AccountAddress, tx_kind: &[u8]) -> Result<Value, EndpointError>;
}

impl<T: LedgerEndpoint + ?Sized> LedgerEndpoint for &T {
    fn get_object(&self, object_id: ObjectId) -> Result<Value, EndpointError> {
        (**self).get_object(object_id)
    }

    fn get_dynamic_field_object(&self, parent: ObjectId, key: u64) -> Result<Value, EndpointError> {
        (**self).get_dynamic_field_object(parent, key)
    }

    fn execute_transaction(&self, signed: &SignedPayload) -> Result<Value, EndpointError> {
        (**self).execute_transaction(signed)
    }

    fn dev_inspect(&self, sender: AccountAddress, tx_kind: &[u8]) -> Result<Value, EndpointError> {
        (**self).dev_inspect(sender, tx_kind)
    }
}

impl<T: LedgerEndpoint + ?Sized> LedgerEndpoint for Arc<T> {
    fn get_object(&self, object_id: ObjectId) -> Result<Value, EndpointError> {
        (**self).get_object(object_id)
    }

    fn get_dynamic_field_object(&self, parent: ObjectId, key: u64) -> Result<Value, EndpointError> {
        (**self).get_dynamic_field_object(parent, key)
    }

    fn execute_transaction(&self, signed: &SignedPayload) -> Result<Value, EndpointError> {
        (**self).execute_transaction(signed)
    }

    fn dev_inspect(&self, sender: AccountAddress, tx_kind: &[u8]) -> Result<Value, EndpointError> {
        (**self).dev_inspect(sender, tx_kind)
    }
}
