#![forbid(unsafe_code)]

mod support;

use std::sync::{Arc, Barrier};
use std::thread;

use evidence_contracts::ledger::{AccountAddress, ObjectId, RecordKind, RoleKind};
use evidence_contracts::payload::{Payload, SignedPayload};
use evidence_contracts::LedgerError;
use evidence_engines::record_codec::DecodeOptions;
use evidence_os::{CancellationToken, LedgerClient, Signer, SignerError, SubmissionPipeline};
use evidence_storage::endpoint::{methods, EndpointError, LedgerEndpoint, TransportKind};
use evidence_storage::InMemoryLedger;
use serde_json::Value;

use support::*;

/// Passes calls through to an in-memory ledger, rewriting responses or
/// tripping a token once the inner call returns.
struct WrappedEndpoint {
    inner: InMemoryLedger,
    tamper_lookup: Option<fn(&mut Value)>,
    cancel_after_execute: Option<CancellationToken>,
}

impl WrappedEndpoint {
    fn new() -> Self {
        Self {
            inner: memory_ledger(),
            tamper_lookup: None,
            cancel_after_execute: None,
        }
    }
}

impl LedgerEndpoint for WrappedEndpoint {
    fn get_object(&self, object_id: ObjectId) -> Result<Value, EndpointError> {
        self.inner.get_object(object_id)
    }

    fn get_dynamic_field_object(&self, parent: ObjectId, key: u64) -> Result<Value, EndpointError> {
        let mut v = self.inner.get_dynamic_field_object(parent, key)?;
        if let Some(tamper) = self.tamper_lookup {
            tamper(&mut v);
        }
        Ok(v)
    }

    fn execute_transaction(&self, signed: &SignedPayload) -> Result<Value, EndpointError> {
        let v = self.inner.execute_transaction(signed)?;
        if let Some(token) = &self.cancel_after_execute {
            token.cancel();
        }
        Ok(v)
    }

    fn dev_inspect(&self, sender: AccountAddress, tx_kind: &[u8]) -> Result<Value, EndpointError> {
        self.inner.dev_inspect(sender, tx_kind)
    }
}

fn client_over<E: LedgerEndpoint>(endpoint: E) -> LedgerClient<E> {
    LedgerClient::new(endpoint, PACKAGE, STATE, DecodeOptions::raw())
}

#[test]
fn at_fail_01_transport_failure_on_read_is_network_error() {
    let rt = runtime();
    rt.client().endpoint().inject_failure(EndpointError::Transport {
        method: methods::GET_OBJECT,
        kind: TransportKind::Timeout,
        detail: "read timed out".to_string(),
    });
    let err = rt
        .client()
        .get_evidence_by_id(1, &CancellationToken::new())
        .unwrap_err();
    assert_eq!(err.category(), "network");
    assert!(err.to_string().contains("timeout"));
}

#[test]
fn at_fail_02_node_rejection_on_execute_is_execution_error() {
    let rt = runtime();
    rt.client().endpoint().inject_failure(EndpointError::Rpc {
        method: methods::EXECUTE_TRANSACTION_BLOCK,
        code: -32002,
        message: "Transaction has non recoverable errors".to_string(),
    });
    let err = rt
        .actions()
        .add_evidence(
            &scenario_a_form(),
            &TestSigner::signing(PEON),
            &CancellationToken::new(),
        )
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Execution {
            reason: "Transaction has non recoverable errors".to_string()
        }
    );

    rt.client().endpoint().inject_failure(EndpointError::HttpStatus {
        method: methods::EXECUTE_TRANSACTION_BLOCK,
        status: 502,
    });
    let err = rt
        .actions()
        .add_evidence(
            &scenario_a_form(),
            &TestSigner::signing(PEON),
            &CancellationToken::new(),
        )
        .unwrap_err();
    assert_eq!(err.category(), "network");
}

fn break_latitude(v: &mut Value) {
    v["data"]["content"]["fields"]["value"]["fields"]["latitude"] = Value::Bool(true);
}

#[test]
fn at_fail_03_malformed_record_is_decode_error_not_not_found() {
    let mut endpoint = WrappedEndpoint::new();
    endpoint.inner.seed_record(RecordKind::Evidence, {
        let rt = runtime();
        let cancel = CancellationToken::new();
        rt.actions()
            .add_evidence(&scenario_a_form(), &TestSigner::signing(PEON), &cancel)
            .unwrap();
        rt.client()
            .lookup_record(RecordKind::Evidence, 1, &cancel)
            .unwrap()
            .body()
            .clone()
    });
    endpoint.tamper_lookup = Some(break_latitude as fn(&mut Value));
    let client = client_over(endpoint);
    match client.get_evidence_by_id(1, &CancellationToken::new()).unwrap_err() {
        LedgerError::Decode(e) => {
            assert_eq!(e.path, "data.content.fields.value.fields.latitude")
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn at_fail_04_invalid_head_address_never_reaches_signer() {
    let rt = runtime();
    let signer = TestSigner::signing(PEON);
    let mut form = scenario_a_form();
    form.head_address = "0x1234".to_string();
    match rt
        .actions()
        .add_report(&form, &signer, &CancellationToken::new())
        .unwrap_err()
    {
        LedgerError::Validation(v) => assert_eq!(v.field(), "headAddress"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(signer.calls(), 0);
}

#[test]
fn at_fail_05_busy_action_rejects_second_submission_only_for_that_action() {
    let rt = runtime();
    let cancel = CancellationToken::new();
    let permit = rt
        .actions()
        .record_pipeline(RecordKind::Evidence)
        .gate()
        .try_acquire()
        .unwrap();

    let err = rt
        .actions()
        .add_evidence(&scenario_a_form(), &TestSigner::signing(PEON), &cancel)
        .unwrap_err();
    assert_eq!(err, LedgerError::SubmissionInFlight);
    // other actions have their own flag
    rt.actions()
        .add_report(&scenario_a_form(), &TestSigner::signing(PEON), &cancel)
        .unwrap();

    drop(permit);
    rt.actions()
        .add_evidence(&scenario_a_form(), &TestSigner::signing(PEON), &cancel)
        .unwrap();
}

/// Blocks inside `sign` until the test releases it.
struct ParkedSigner {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl Signer for ParkedSigner {
    fn sender(&self) -> AccountAddress {
        PEON
    }

    fn sign(&self, _payload: &Payload, tx_kind: &[u8]) -> Result<SignedPayload, SignerError> {
        self.entered.wait();
        self.release.wait();
        Ok(SignedPayload {
            tx_bytes: tx_kind.to_vec(),
            signatures: vec![vec![1; 97]],
            sender: PEON,
        })
    }
}

#[test]
fn at_fail_06_concurrent_submission_of_same_action_is_in_flight() {
    let rt = runtime();
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let parked = ParkedSigner {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    };

    thread::scope(|s| {
        let first = s.spawn(|| {
            rt.actions()
                .add_evidence(&scenario_a_form(), &parked, &CancellationToken::new())
        });
        entered.wait();
        assert!(rt.actions().record_pipeline(RecordKind::Evidence).gate().is_busy());
        let second = rt.actions().add_evidence(
            &scenario_a_form(),
            &TestSigner::signing(PEON),
            &CancellationToken::new(),
        );
        assert_eq!(second.unwrap_err(), LedgerError::SubmissionInFlight);
        release.wait();
        assert!(first.join().unwrap().is_ok());
    });
    assert_eq!(rt.client().endpoint().record_count(RecordKind::Evidence), 1);
}

#[test]
fn at_fail_07_cancel_before_or_during_signing_sends_nothing() {
    let rt = runtime();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let signer = TestSigner::signing(PEON);
    assert_eq!(
        rt.actions()
            .add_evidence(&scenario_a_form(), &signer, &cancel)
            .unwrap_err(),
        LedgerError::UserCancelled
    );
    assert_eq!(signer.calls(), 0);

    let cancel = CancellationToken::new();
    let mut signer = TestSigner::signing(ADMIN);
    signer.cancel_while_signing = Some(cancel.clone());
    assert_eq!(
        rt.actions()
            .change_role(RoleKind::Sho, &format!("0x{}", "0d".repeat(32)), &signer, &cancel)
            .unwrap_err(),
        LedgerError::UserCancelled
    );
    assert_eq!(signer.calls(), 1);
    assert_eq!(rt.client().endpoint().executed_transactions(), 0);
    assert_eq!(
        rt.client()
            .get_system_state(&CancellationToken::new())
            .unwrap()
            .roles
            .sho,
        SHO
    );
}

#[test]
fn at_fail_08_response_after_cancellation_is_discarded() {
    let cancel = CancellationToken::new();
    let mut endpoint = WrappedEndpoint::new();
    endpoint.cancel_after_execute = Some(cancel.clone());
    let endpoint = Arc::new(endpoint);

    let rt = runtime();
    let payload = rt
        .actions()
        .builder()
        .build_add_evidence(&scenario_a_form())
        .unwrap();
    let pipeline = SubmissionPipeline::new(Arc::clone(&endpoint));
    assert_eq!(
        pipeline
            .submit(&payload, &TestSigner::signing(PEON), &cancel)
            .unwrap_err(),
        LedgerError::UserCancelled
    );
    // the ledger still committed; only the caller stopped listening
    assert_eq!(endpoint.inner.record_count(RecordKind::Evidence), 1);
    assert!(!pipeline.gate().is_busy());

    let err = client_over(Arc::clone(&endpoint))
        .get_system_state(&cancel)
        .unwrap_err();
    assert_eq!(err, LedgerError::UserCancelled);
}

#[test]
fn at_fail_09_read_only_payload_is_refused_by_pipeline() {
    let rt = runtime();
    let payload = rt.actions().builder().build_get_report(1).unwrap();
    let signer = TestSigner::signing(PEON);
    let err = rt
        .actions()
        .record_pipeline(RecordKind::Report)
        .submit(&payload, &signer, &CancellationToken::new())
        .unwrap_err();
    assert_eq!(err.category(), "validation");
    assert_eq!(signer.calls(), 0);
}
