#![forbid(unsafe_code)]

//! Sign-then-submit for write payloads.

use std::sync::atomic::{AtomicBool, Ordering};

use evidence_contracts::ledger::AccountAddress;
use evidence_contracts::payload::{Payload, SignedPayload, SubmissionReceipt};
use evidence_contracts::{ContractViolation, LedgerError, Validate};
use evidence_engines::ptb::encode_transaction_kind;
use evidence_engines::record_codec::{ExecutionStatus, RecordCodec};
use evidence_storage::endpoint::LedgerEndpoint;

use crate::cancellation::CancellationToken;
use crate::ledger_client::map_execute_error;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("signer refused: {reason}")]
    Refused { reason: String },
    #[error("signing was aborted by the user")]
    Aborted,
}

/// Signing capability, typically a wallet. May block on user interaction.
pub trait Signer {
    fn sender(&self) -> AccountAddress;

    /// Signs the call described by `payload`, whose transaction kind bytes
    /// are `tx_kind`. The returned `tx_bytes` are what the node executes.
    fn sign(&self, payload: &Payload, tx_kind: &[u8]) -> Result<SignedPayload, SignerError>;
}

impl<S: Signer + ?Sized> Signer for &S {
    fn sender(&self) -> AccountAddress {
        (**self).sender()
    }

    fn sign(&self, payload: &Payload, tx_kind: &[u8]) -> Result<SignedPayload, SignerError> {
        (**self).sign(payload, tx_kind)
    }
}

/// Busy flag for one logical action.
#[derive(Debug, Default)]
pub struct ActionGate {
    busy: AtomicBool,
}

impl ActionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn try_acquire(&self) -> Option<GatePermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GatePermit { gate: self })
    }
}

#[derive(Debug)]
pub struct GatePermit<'a> {
    gate: &'a ActionGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct SubmissionPipeline<E> {
    endpoint: E,
    gate: ActionGate,
}

impl<E: LedgerEndpoint> SubmissionPipeline<E> {
    pub fn new(endpoint: E) -> Self {
        Self {
            endpoint,
            gate: ActionGate::new(),
        }
    }

    pub fn gate(&self) -> &ActionGate {
        &self.gate
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Signs and executes `payload` once. Nothing here retries: a refused
    /// signature is `UserCancelled` and a ledger rejection is `Execution`
    /// with the node's reason.
    pub fn submit(
        &self,
        payload: &Payload,
        signer: &dyn Signer,
        cancel: &CancellationToken,
    ) -> Result<SubmissionReceipt, LedgerError> {
        payload.validate()?;
        if !payload.entrypoint.is_write() {
            return Err(ContractViolation::invalid(
                "payload.entrypoint",
                "must be a write entrypoint",
            )
            .into());
        }
        let _permit = self
            .gate
            .try_acquire()
            .ok_or(LedgerError::SubmissionInFlight)?;
        let function = payload.entrypoint.function_name();
        let tx_kind = encode_transaction_kind(payload);

        cancel.checkpoint("sign")?;
        let signed = signer.sign(payload, &tx_kind).map_err(|err| {
            tracing::info!(
                target: "evidence_os::submission",
                function,
                error = %err,
                "signer declined"
            );
            LedgerError::UserCancelled
        })?;
        let signed = cancel.discard_if_cancelled("sign", signed)?;

        let raw = self
            .endpoint
            .execute_transaction(&signed)
            .map_err(|err| {
                tracing::warn!(
                    target: "evidence_os::submission",
                    function,
                    error = %err,
                    "execute request failed"
                );
                map_execute_error(err)
            })?;
        let raw = cancel.discard_if_cancelled("execute", raw)?;
        let outcome = RecordCodec::decode_execution(&raw)?;
        match outcome.status {
            ExecutionStatus::Failure { reason } => {
                tracing::warn!(
                    target: "evidence_os::submission",
                    function,
                    digest = %outcome.digest,
                    %reason,
                    "transaction failed on ledger"
                );
                Err(LedgerError::Execution { reason })
            }
            ExecutionStatus::Success => {
                tracing::info!(
                    target: "evidence_os::submission",
                    function,
                    digest = %outcome.digest,
                    events = outcome.events.len(),
                    "transaction committed"
                );
                Ok(SubmissionReceipt {
                    digest: outcome.digest,
                    created: outcome.created,
                    events: outcome.events,
                })
            }
        }
    }
}
