#![forbid(unsafe_code)]

mod support;

use evidence_contracts::ledger::{AccountAddress, RecordKind, RoleKind};
use evidence_contracts::record::{AccessFlag, LookupOutcome, RecordText};
use evidence_contracts::LedgerError;
use evidence_engines::presentation::RecordView;
use evidence_engines::record_codec::TextPolicy;
use evidence_os::{CancellationToken, EvidenceLedgerRuntime};

use support::*;

#[test]
fn at_flow_01_added_evidence_reads_back_under_previous_max_plus_one() {
    let rt = runtime();
    let cancel = CancellationToken::new();
    let before = rt.client().get_system_state(&cancel).unwrap();
    let prev_max = before.max_record_id(RecordKind::Evidence).unwrap();

    let signer = TestSigner::signing(PEON);
    let receipt = rt
        .actions()
        .add_evidence(&scenario_a_form(), &signer, &cancel)
        .unwrap();
    assert!(!receipt.digest.is_empty());
    assert_eq!(receipt.events.len(), 1);
    assert_eq!(receipt.created.len(), 1);
    assert_eq!(receipt.events[0].record_id, Some(prev_max + 1));

    let record = rt
        .client()
        .get_evidence_by_id(prev_max + 1, &cancel)
        .unwrap()
        .found()
        .unwrap();
    let body = record.body();
    assert_eq!(record.id(), prev_max + 1);
    assert_eq!(body.case_no, 12);
    assert_eq!(body.fir_no, 7);
    assert_eq!(body.ipfs_hash.as_bytes(), b"Qm123");
    assert_eq!(body.content.as_bytes(), b"note");
    assert_eq!(body.access, AccessFlag::Public);
    assert_eq!(body.head, AccountAddress::new([0xaa; 32]));
    assert_eq!(body.latitude.micro_degrees(), 12_900_000);
    assert_eq!(body.longitude.micro_degrees(), 77_600_000);

    let view = RecordView::from_record(&record);
    assert_eq!(view.latitude, "12.9");
    assert_eq!(view.access, "Public");
}

#[test]
fn at_flow_02_missing_content_fails_validation_before_any_network_call() {
    let rt = runtime();
    let signer = TestSigner::signing(PEON);
    let mut form = scenario_a_form();
    form.content = String::new();

    let err = rt
        .actions()
        .add_evidence(&form, &signer, &CancellationToken::new())
        .unwrap_err();
    match err {
        LedgerError::Validation(v) => assert_eq!(v.field(), "content"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(signer.calls(), 0);
    assert_eq!(rt.client().endpoint().executed_transactions(), 0);
}

#[test]
fn at_flow_03_absent_id_is_not_found() {
    let rt = runtime();
    let cancel = CancellationToken::new();
    rt.actions()
        .add_evidence(&scenario_a_form(), &TestSigner::signing(PEON), &cancel)
        .unwrap();

    assert_eq!(
        rt.client().get_evidence_by_id(9999, &cancel).unwrap(),
        LookupOutcome::NotFound {
            kind: RecordKind::Evidence,
            id: 9999
        }
    );
    assert_eq!(
        rt.client()
            .lookup_record(RecordKind::Evidence, 9999, &cancel)
            .unwrap_err(),
        LedgerError::NotFound {
            kind: RecordKind::Evidence,
            id: 9999
        }
    );
}

#[test]
fn at_flow_04_refused_signature_is_user_cancelled_and_state_unchanged() {
    let rt = runtime();
    let cancel = CancellationToken::new();
    let before = rt.client().get_system_state(&cancel).unwrap();

    for mode in [SignerMode::Refuse, SignerMode::Abort] {
        let signer = TestSigner::new(PEON, mode);
        let err = rt
            .actions()
            .add_evidence(&scenario_a_form(), &signer, &cancel)
            .unwrap_err();
        assert_eq!(err, LedgerError::UserCancelled);
        assert_eq!(signer.calls(), 1);
    }

    let after = rt.client().get_system_state(&cancel).unwrap();
    assert_eq!(
        after.max_record_id(RecordKind::Evidence),
        before.max_record_id(RecordKind::Evidence)
    );
    assert_eq!(rt.client().endpoint().executed_transactions(), 0);
}

#[test]
fn at_flow_05_report_lookup_and_inspection_agree_on_found_and_missing() {
    let rt = runtime();
    let cancel = CancellationToken::new();
    rt.actions()
        .add_report(&scenario_a_form(), &TestSigner::signing(SHO), &cancel)
        .unwrap();

    let looked_up = rt
        .client()
        .get_report_by_id(1, &cancel)
        .unwrap()
        .found()
        .unwrap();
    let inspected = rt.client().query_report(1, &cancel).unwrap();
    assert_eq!(inspected.report_id, 1);
    assert_eq!(&inspected.body, looked_up.body());

    assert_eq!(
        rt.client().query_report(9999, &cancel).unwrap_err(),
        LedgerError::NotFound {
            kind: RecordKind::Report,
            id: 9999
        }
    );
}

#[test]
fn at_flow_06_role_change_takes_effect_for_the_next_write() {
    let rt = runtime();
    let cancel = CancellationToken::new();
    let new_peon = format!("0x{}", "0C".repeat(32));

    let err = rt
        .actions()
        .change_role(RoleKind::Peon, &new_peon, &TestSigner::signing(PEON), &cancel)
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Execution {
            reason: "MoveAbort(evidence_system::change_peon, 1)".to_string()
        }
    );

    rt.actions()
        .change_role(RoleKind::Peon, &new_peon, &TestSigner::signing(ADMIN), &cancel)
        .unwrap();
    let state = rt.client().get_system_state(&cancel).unwrap();
    assert_eq!(state.roles.peon, AccountAddress::new([0x0c; 32]));

    let err = rt
        .actions()
        .add_evidence(&scenario_a_form(), &TestSigner::signing(PEON), &cancel)
        .unwrap_err();
    assert_eq!(err.category(), "execution");
    rt.actions()
        .add_evidence(
            &scenario_a_form(),
            &TestSigner::signing(AccountAddress::new([0x0c; 32])),
            &cancel,
        )
        .unwrap();
}

#[test]
fn at_flow_07_next_id_prediction_tracks_external_writes() {
    let rt = runtime();
    let cancel = CancellationToken::new();
    let client = rt.client();
    assert_eq!(client.next_record_id(RecordKind::Evidence, &cancel).unwrap(), Some(1));

    let (_, id) = rt
        .actions()
        .add_record_and_predict_id(
            client,
            RecordKind::Evidence,
            &scenario_a_form(),
            &TestSigner::signing(PEON),
            &cancel,
        )
        .unwrap();
    assert_eq!(id, Some(1));

    // another writer lands in between; a fresh read sees it
    let first = client
        .lookup_record(RecordKind::Evidence, 1, &cancel)
        .unwrap();
    assert_eq!(
        client
            .endpoint()
            .seed_record(RecordKind::Evidence, first.body().clone()),
        Some(2)
    );
    assert_eq!(client.next_record_id(RecordKind::Evidence, &cancel).unwrap(), Some(3));

    client.endpoint().set_max_record_id(RecordKind::Report, u64::MAX);
    assert_eq!(client.next_record_id(RecordKind::Report, &cancel).unwrap(), None);
}

#[test]
fn at_flow_08_utf8_policy_decodes_text_on_read() {
    let rt = EvidenceLedgerRuntime::with_endpoint(
        memory_ledger(),
        &config(TextPolicy::Utf8),
        &CancellationToken::new(),
    )
    .unwrap();
    let cancel = CancellationToken::new();
    rt.actions()
        .add_evidence(&scenario_a_form(), &TestSigner::signing(SHO), &cancel)
        .unwrap();
    let record = rt
        .client()
        .lookup_record(RecordKind::Evidence, 1, &cancel)
        .unwrap();
    assert_eq!(record.body().content, RecordText::Utf8("note".to_string()));
}
