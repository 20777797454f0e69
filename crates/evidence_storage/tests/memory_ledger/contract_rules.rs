#![forbid(unsafe_code)]

use evidence_contracts::form::RecordForm;
use evidence_contracts::ledger::{AccountAddress, ObjectId, RecordKind, RoleAddresses, RoleKind};
use evidence_contracts::payload::{Payload, SignedPayload};
use evidence_engines::ptb::encode_transaction_kind;
use evidence_engines::record_codec::{ExecutionStatus, InspectionOutcome, RecordCodec};
use evidence_engines::tx_builder::{LedgerTarget, TransactionBuilder};
use evidence_storage::endpoint::LedgerEndpoint;
use evidence_storage::{InMemoryLedger, InMemoryLedgerConfig};

const PACKAGE: ObjectId = ObjectId::new([0x54; 32]);
const STATE: ObjectId = ObjectId::new([0xf4; 32]);
const ADMIN: AccountAddress = AccountAddress::new([0xad; 32]);
const PEON: AccountAddress = AccountAddress::new([0x01; 32]);
const SHO: AccountAddress = AccountAddress::new([0x02; 32]);
const STRANGER: AccountAddress = AccountAddress::new([0x99; 32]);

fn ledger() -> InMemoryLedger {
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

fn builder() -> TransactionBuilder {
    TransactionBuilder::new(LedgerTarget::v1(PACKAGE, STATE, 1).unwrap())
}

fn form() -> RecordForm {
    RecordForm {
        case_no: "12".to_string(),
        fir_no: "7".to_string(),
        ipfs_hash: "Qm123".to_string(),
        content: "seized laptop".to_string(),
        public_access: true,
        head_address: format!("0x{}", "ab".repeat(32)),
        latitude: "12.9".to_string(),
        longitude: "77.6".to_string(),
    }
}

fn signed(payload: &Payload, sender: AccountAddress) -> SignedPayload {
    SignedPayload {
        tx_bytes: encode_transaction_kind(payload),
        signatures: vec![vec![0u8; 97]],
        sender,
    }
}

fn execute(l: &InMemoryLedger, payload: &Payload, sender: AccountAddress) -> ExecutionStatus {
    let raw = l.execute_transaction(&signed(payload, sender)).unwrap();
    RecordCodec::decode_execution(&raw).unwrap().status
}

#[test]
fn at_ledger_01_peon_adds_evidence_under_next_id() {
    let l = ledger();
    let payload = builder().build_add_evidence(&form()).unwrap();
    assert_eq!(execute(&l, &payload, PEON), ExecutionStatus::Success);

    let state = RecordCodec::decode_system_state(&l.get_object(STATE).unwrap()).unwrap();
    assert_eq!(state.max_record_id(RecordKind::Evidence), Some(1));
    let table = state.table_ref(RecordKind::Evidence).unwrap().table_id;
    let raw = l.get_dynamic_field_object(table, 1).unwrap();
    let record = RecordCodec::default()
        .decode_lookup(&raw, RecordKind::Evidence, 1)
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(record.body().case_no, 12);
    assert_eq!(record.body().latitude.micro_degrees(), 12_900_000);
    assert_eq!(record.body().created_at.0, 1_700_000_000);
}

#[test]
fn at_ledger_02_stranger_write_aborts_and_leaves_state() {
    let l = ledger();
    let payload = builder().build_add_report(&form()).unwrap();
    match execute(&l, &payload, STRANGER) {
        ExecutionStatus::Failure { reason } => {
            assert_eq!(reason, "MoveAbort(evidence_system::add_report, 1)")
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(l.record_count(RecordKind::Report), 0);
    assert_eq!(l.executed_transactions(), 1);
}

#[test]
fn at_ledger_03_only_admin_changes_roles() {
    let l = ledger();
    let new_peon = format!("0x{}", "0c".repeat(32));
    let payload = builder().build_change_role(RoleKind::Peon, &new_peon).unwrap();
    assert!(matches!(
        execute(&l, &payload, SHO),
        ExecutionStatus::Failure { .. }
    ));
    assert_eq!(execute(&l, &payload, ADMIN), ExecutionStatus::Success);
    assert_eq!(l.system_state().roles.peon, AccountAddress::new([0x0c; 32]));
    assert_eq!(l.system_state().roles.sho, SHO);
}

#[test]
fn at_ledger_04_saturated_counter_aborts() {
    let l = ledger();
    l.set_max_record_id(RecordKind::Evidence, u64::MAX);
    let payload = builder().build_add_evidence(&form()).unwrap();
    match execute(&l, &payload, ADMIN) {
        ExecutionStatus::Failure { reason } => assert!(reason.ends_with(", 2)")),
        other => panic!("expected abort, got {other:?}"),
    }
}

#[test]
fn at_ledger_05_get_report_inspection_returns_bcs_values() {
    let l = ledger();
    let add = builder().build_add_report(&form()).unwrap();
    assert_eq!(execute(&l, &add, SHO), ExecutionStatus::Success);

    let query = builder().build_get_report(1).unwrap();
    let raw = l.dev_inspect(STRANGER, &encode_transaction_kind(&query)).unwrap();
    let InspectionOutcome::Returned(values) = RecordCodec::decode_inspection(&raw).unwrap() else {
        panic!("inspection failed");
    };
    let report = RecordCodec::default()
        .decode_report_return_values(&values)
        .unwrap();
    assert_eq!(report.report_id, 1);
    assert_eq!(report.body.content.as_bytes(), b"seized laptop");

    let missing = builder().build_get_report(9999).unwrap();
    let raw = l.dev_inspect(STRANGER, &encode_transaction_kind(&missing)).unwrap();
    assert!(matches!(
        RecordCodec::decode_inspection(&raw).unwrap(),
        InspectionOutcome::Failed { .. }
    ));
}

#[test]
fn at_ledger_06_lookup_miss_and_unsigned_submission() {
    let l = ledger();
    let table = l.system_state().table_ref(RecordKind::Evidence).unwrap().table_id;
    let raw = l.get_dynamic_field_object(table, 9999).unwrap();
    assert!(RecordCodec::default()
        .decode_lookup(&raw, RecordKind::Evidence, 9999)
        .unwrap()
        .is_not_found());

    let payload = builder().build_add_evidence(&form()).unwrap();
    let mut unsigned = signed(&payload, PEON);
    unsigned.signatures.clear();
    assert!(l.execute_transaction(&unsigned).is_err());
    assert_eq!(l.executed_transactions(), 0);
}
