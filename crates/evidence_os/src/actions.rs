#![forbid(unsafe_code)]

use evidence_contracts::form::RecordForm;
use evidence_contracts::ledger::{RecordKind, RoleKind};
use evidence_contracts::payload::SubmissionReceipt;
use evidence_contracts::LedgerError;
use evidence_engines::tx_builder::TransactionBuilder;
use evidence_storage::endpoint::LedgerEndpoint;

use crate::cancellation::CancellationToken;
use crate::ledger_client::LedgerClient;
use crate::submission::{Signer, SubmissionPipeline};

/// One pipeline per user-facing write, so each carries its own busy flag.
#[derive(Debug)]
pub struct LedgerActions<E> {
    builder: TransactionBuilder,
    add_evidence: SubmissionPipeline<E>,
    add_report: SubmissionPipeline<E>,
    change_peon: SubmissionPipeline<E>,
    change_sho: SubmissionPipeline<E>,
}

impl<E: LedgerEndpoint + Clone> LedgerActions<E> {
    pub fn new(endpoint: E, builder: TransactionBuilder) -> Self {
        Self {
            builder,
            add_evidence: SubmissionPipeline::new(endpoint.clone()),
            add_report: SubmissionPipeline::new(endpoint.clone()),
            change_peon: SubmissionPipeline::new(endpoint.clone()),
            change_sho: SubmissionPipeline::new(endpoint),
        }
    }
}

impl<E: LedgerEndpoint> LedgerActions<E> {
    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    pub fn record_pipeline(&self, kind: RecordKind) -> &SubmissionPipeline<E> {
        match kind {
            RecordKind::Evidence => &self.add_evidence,
            RecordKind::Report => &self.add_report,
        }
    }

    pub fn role_pipeline(&self, role: RoleKind) -> &SubmissionPipeline<E> {
        match role {
            RoleKind::Peon => &self.change_peon,
            RoleKind::Sho => &self.change_sho,
        }
    }

    /// Validates `form` before anything can suspend; an invalid form never
    /// reaches the signer.
    pub fn add_record(
        &self,
        kind: RecordKind,
        form: &RecordForm,
        signer: &dyn Signer,
        cancel: &CancellationToken,
    ) -> Result<SubmissionReceipt, LedgerError> {
        let payload = self.builder.build_add_record(kind, form)?;
        self.record_pipeline(kind).submit(&payload, signer, cancel)
    }

    pub fn add_evidence(
        &self,
        form: &RecordForm,
        signer: &dyn Signer,
        cancel: &CancellationToken,
    ) -> Result<SubmissionReceipt, LedgerError> {
        self.add_record(RecordKind::Evidence, form, signer, cancel)
    }

    pub fn add_report(
        &self,
        form: &RecordForm,
        signer: &dyn Signer,
        cancel: &CancellationToken,
    ) -> Result<SubmissionReceipt, LedgerError> {
        self.add_record(RecordKind::Report, form, signer, cancel)
    }

    pub fn change_role(
        &self,
        role: RoleKind,
        new_address: &str,
        signer: &dyn Signer,
        cancel: &CancellationToken,
    ) -> Result<SubmissionReceipt, LedgerError> {
        let payload = self.builder.build_change_role(role, new_address)?;
        self.role_pipeline(role).submit(&payload, signer, cancel)
    }

    /// Submits a new record and reports the id it was stored under. The id
    /// comes from the commit event when the ledger emits one; otherwise it
    /// is the prediction from a state read taken just before signing, which
    /// a concurrent writer can invalidate.
    pub fn add_record_and_predict_id(
        &self,
        client: &LedgerClient<E>,
        kind: RecordKind,
        form: &RecordForm,
        signer: &dyn Signer,
        cancel: &CancellationToken,
    ) -> Result<(SubmissionReceipt, Option<u64>), LedgerError> {
        let payload = self.builder.build_add_record(kind, form)?;
        let predicted = client.next_record_id(kind, cancel)?;
        let receipt = self.record_pipeline(kind).submit(&payload, signer, cancel)?;
        let assigned = receipt
            .events
            .iter()
            .find_map(|e| e.record_id)
            .or(predicted);
        Ok((receipt, assigned))
    }
}
