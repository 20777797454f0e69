#![forbid(unsafe_code)]

//! Read path: system state, keyed record lookup, report inspection.
//!
//! Nothing is cached. Every lookup starts from a fresh state read because
//! the counters and table references move with every committed write.

use evidence_contracts::ledger::{
    AccountAddress, ObjectId, RecordKind, SharedObjectRef, SystemState,
};
use evidence_contracts::payload::{Entrypoint, ABORT_REPORT_NOT_FOUND};
use evidence_contracts::record::{LedgerRecord, LookupOutcome, ReportRecord};
use evidence_contracts::{DecodeError, LedgerError};
use evidence_engines::ptb::encode_transaction_kind;
use evidence_engines::record_codec::{DecodeOptions, InspectionOutcome, RecordCodec};
use evidence_engines::tx_builder::{LedgerTarget, TransactionBuilder};
use evidence_storage::endpoint::{EndpointError, LedgerEndpoint};

use crate::cancellation::CancellationToken;

/// Reads never carry an execution verdict; any endpoint failure is a
/// network failure.
pub fn map_read_error(err: EndpointError) -> LedgerError {
    LedgerError::Network {
        detail: err.to_string(),
    }
}

/// The node rejecting a submitted transaction is an execution failure and
/// keeps the node's message. Transport-level failures stay network errors.
pub fn map_execute_error(err: EndpointError) -> LedgerError {
    match err {
        EndpointError::Rpc { message, .. } => LedgerError::Execution { reason: message },
        other => map_read_error(other),
    }
}

#[derive(Debug)]
pub struct LedgerClient<E> {
    endpoint: E,
    package: ObjectId,
    state_id: ObjectId,
    codec: RecordCodec,
}

impl<E: LedgerEndpoint> LedgerClient<E> {
    pub fn new(endpoint: E, package: ObjectId, state_id: ObjectId, options: DecodeOptions) -> Self {
        Self {
            endpoint,
            package,
            state_id,
            codec: RecordCodec::new(options),
        }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn state_id(&self) -> ObjectId {
        self.state_id
    }

    pub fn get_system_state(&self, cancel: &CancellationToken) -> Result<SystemState, LedgerError> {
        cancel.checkpoint("read system state")?;
        let raw = self
            .endpoint
            .get_object(self.state_id)
            .map_err(map_read_error)?;
        let raw = cancel.discard_if_cancelled("read system state", raw)?;
        let state = RecordCodec::decode_system_state(&raw)?;
        tracing::debug!(
            target: "evidence_os::ledger_client",
            max_evidence = state.evidence.max_record_id,
            max_report = ?state.reports.map(|r| r.max_record_id),
            "system state read"
        );
        Ok(state)
    }

    /// Resolves `id` through the kind's table. An id the table does not
    /// hold is `LookupOutcome::NotFound`, never an error.
    pub fn get_record_by_id(
        &self,
        kind: RecordKind,
        id: u64,
        cancel: &CancellationToken,
    ) -> Result<LookupOutcome, LedgerError> {
        let state = self.get_system_state(cancel)?;
        let table = state.table_ref(kind).ok_or_else(|| {
            DecodeError::missing(format!("data.content.fields.{}", kind.table_field()))
        })?;
        cancel.checkpoint("record lookup")?;
        let raw = self
            .endpoint
            .get_dynamic_field_object(table.table_id, id)
            .map_err(map_read_error)?;
        let raw = cancel.discard_if_cancelled("record lookup", raw)?;
        let outcome = self.codec.decode_lookup(&raw, kind, id)?;
        tracing::debug!(
            target: "evidence_os::ledger_client",
            %kind,
            id,
            found = !outcome.is_not_found(),
            "record lookup"
        );
        Ok(outcome)
    }

    pub fn get_evidence_by_id(
        &self,
        id: u64,
        cancel: &CancellationToken,
    ) -> Result<LookupOutcome, LedgerError> {
        self.get_record_by_id(RecordKind::Evidence, id, cancel)
    }

    pub fn get_report_by_id(
        &self,
        id: u64,
        cancel: &CancellationToken,
    ) -> Result<LookupOutcome, LedgerError> {
        self.get_record_by_id(RecordKind::Report, id, cancel)
    }

    /// Id the next committed record of `kind` would receive, from a fresh
    /// state read. `None` when the counter is saturated.
    pub fn next_record_id(
        &self,
        kind: RecordKind,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, LedgerError> {
        let state = self.get_system_state(cancel)?;
        let max = state.max_record_id(kind).ok_or_else(|| {
            DecodeError::missing(format!("data.content.fields.{}", kind.counter_field()))
        })?;
        Ok(max.checked_add(1))
    }

    pub fn resolve_state_object(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SharedObjectRef, LedgerError> {
        let state = self.get_system_state(cancel)?;
        state.shared_ref(true).ok_or_else(|| {
            LedgerError::Decode(DecodeError::new(
                "data.owner.Shared.initial_shared_version",
                "state object is not shared",
            ))
        })
    }

    /// Reads a report through the contract's `get_report` view, run as an
    /// inspection that is never committed.
    pub fn query_report(
        &self,
        report_id: u64,
        cancel: &CancellationToken,
    ) -> Result<ReportRecord, LedgerError> {
        let shared = self.resolve_state_object(cancel)?;
        let target = LedgerTarget::v1(
            self.package,
            shared.object_id,
            shared.initial_shared_version,
        )?;
        let payload = TransactionBuilder::new(target).build_get_report(report_id)?;
        let tx_kind = encode_transaction_kind(&payload);

        cancel.checkpoint("report inspection")?;
        let raw = self
            .endpoint
            .dev_inspect(AccountAddress::ZERO, &tx_kind)
            .map_err(map_read_error)?;
        let raw = cancel.discard_if_cancelled("report inspection", raw)?;
        match RecordCodec::decode_inspection(&raw)? {
            InspectionOutcome::Failed { reason } if is_report_not_found(&reason) => {
                Err(LedgerError::NotFound {
                    kind: RecordKind::Report,
                    id: report_id,
                })
            }
            InspectionOutcome::Failed { reason } => {
                tracing::debug!(
                    target: "evidence_os::ledger_client",
                    report_id,
                    %reason,
                    "report inspection aborted"
                );
                Err(LedgerError::Execution { reason })
            }
            InspectionOutcome::Returned(values) => {
                Ok(self.codec.decode_report_return_values(&values)?)
            }
        }
    }

    pub fn lookup_record(
        &self,
        kind: RecordKind,
        id: u64,
        cancel: &CancellationToken,
    ) -> Result<LedgerRecord, LedgerError> {
        self.get_record_by_id(kind, id, cancel)?.into_result()
    }
}

/// Matches a `get_report` abort carrying the not-found code, in both the
/// short `MoveAbort(module::fn, code)` and the node's `MoveLocation` rendering.
fn is_report_not_found(reason: &str) -> bool {
    let Some(start) = reason.find("MoveAbort(") else {
        return false;
    };
    let abort = &reason[start..];
    if !abort.contains(Entrypoint::GetReport.function_name()) {
        return false;
    }
    abort.match_indices(", ").any(|(i, sep)| {
        let rest = &abort[i + sep.len()..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        digits > 0
            && rest[digits..].starts_with(')')
            && rest[..digits].parse::<u64>() == Ok(ABORT_REPORT_NOT_FOUND)
    })
}
