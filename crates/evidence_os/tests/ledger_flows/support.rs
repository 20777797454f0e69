#![forbid(unsafe_code)]
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use evidence_contracts::form::RecordForm;
use evidence_contracts::ledger::{AccountAddress, ObjectId, RoleAddresses};
use evidence_contracts::payload::{Payload, SignedPayload};
use evidence_engines::record_codec::TextPolicy;
use evidence_os::{CancellationToken, EvidenceLedgerRuntime, LedgerConfig, Signer, SignerError};
use evidence_storage::{InMemoryLedger, InMemoryLedgerConfig};

pub const PACKAGE: ObjectId = ObjectId::new([0x54; 32]);
pub const STATE: ObjectId = ObjectId::new([0xf4; 32]);
pub const ADMIN: AccountAddress = AccountAddress::new([0xad; 32]);
pub const PEON: AccountAddress = AccountAddress::new([0x01; 32]);
pub const SHO: AccountAddress = AccountAddress::new([0x02; 32]);

pub fn memory_ledger() -> InMemoryLedger {
    InMemoryLedger::new(InMemoryLedgerConfig::v1(
        PACKAGE,
        STATE,
        ADMIN,
        RoleAddresses {
            peon: PEON,
            sho: SHO,
        },
    ))
}

pub fn config(text_policy: TextPolicy) -> LedgerConfig {
    LedgerConfig {
        rpc_url: "http://127.0.0.1:9000".to_string(),
        package: PACKAGE,
        state_id: STATE,
        state_initial_shared_version: None,
        gas_budget: 100_000_000,
        connect_timeout_ms: 1_000,
        request_timeout_ms: 1_000,
        text_policy,
    }
}

pub fn runtime() -> EvidenceLedgerRuntime<InMemoryLedger> {
    EvidenceLedgerRuntime::with_endpoint(
        memory_ledger(),
        &config(TextPolicy::Raw),
        &CancellationToken::new(),
    )
    .unwrap()
}

pub fn scenario_a_form() -> RecordForm {
    RecordForm {
        case_no: "12".to_string(),
        fir_no: "7".to_string(),
        ipfs_hash: "Qm123".to_string(),
        content: "note".to_string(),
        public_access: true,
        head_address: format!("0x{}", "a".repeat(64)),
        latitude: "12.9".to_string(),
        longitude: "77.6".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerMode {
    Sign,
    Refuse,
    Abort,
}

/// Wallet stand-in. Optionally trips a cancellation token while "waiting"
/// for the user.
#[derive(Debug)]
pub struct TestSigner {
    pub sender: AccountAddress,
    pub mode: SignerMode,
    pub cancel_while_signing: Option<CancellationToken>,
    calls: AtomicUsize,
}

impl TestSigner {
    pub fn new(sender: AccountAddress, mode: SignerMode) -> Self {
        Self {
            sender,
            mode,
            cancel_while_signing: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn signing(sender: AccountAddress) -> Self {
        Self::new(sender, SignerMode::Sign)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Signer for TestSigner {
    fn sender(&self) -> AccountAddress {
        self.sender
    }

    fn sign(&self, _payload: &Payload, tx_kind: &[u8]) -> Result<SignedPayload, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_while_signing {
            token.cancel();
        }
        match self.mode {
            SignerMode::Sign => Ok(SignedPayload {
                tx_bytes: tx_kind.to_vec(),
                signatures: vec![vec![0x5a; 97]],
                sender: self.sender,
            }),
            SignerMode::Refuse => Err(SignerError::Refused {
                reason: "user rejected the request".to_string(),
            }),
            SignerMode::Abort => Err(SignerError::Aborted),
        }
    }
}
