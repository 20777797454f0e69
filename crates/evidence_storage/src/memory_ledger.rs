#![forbid(unsafe_code)]

//! In-process stand-in for the deployed evidence contract and the node
//! serving it. Responses are rendered through the same field-tree encoders
//! the codec decodes, so clients exercise their real decode paths.
//!
//! `execute_transaction` expects `tx_bytes` to be the bare transaction kind;
//! there is no gas or sender envelope to unwrap.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use evidence_contracts::ledger::{
    AccountAddress, ObjectId, RecordKind, RecordLedgerRef, RoleAddresses, RoleKind, SystemState,
    TableRef, ADDRESS_LENGTH,
};
use evidence_contracts::payload::{
    CallArg, Entrypoint, Payload, PureArg, SignedPayload, ABORT_REPORT_NOT_FOUND,
    EVIDENCE_MODULE,
};
use evidence_contracts::record::{
    AccessFlag, Coordinate, LedgerRecord, RecordBody, RecordText, ReportRecord,
};
use evidence_contracts::EpochSeconds;
use evidence_engines::ptb::decode_transaction_kind;
use evidence_engines::record_codec::RecordCodec;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::endpoint::{methods, EndpointError, LedgerEndpoint};

pub const ABORT_NOT_AUTHORIZED: u64 = 1;
pub const ABORT_ID_SPACE_EXHAUSTED: u64 = 2;

const RPC_INVALID_PARAMS: i64 = -32602;
const RPC_MISSING_SIGNATURE: i64 = -32002;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryLedgerConfig {
    pub package: ObjectId,
    pub state_id: ObjectId,
    pub initial_shared_version: u64,
    pub admin: AccountAddress,
    pub roles: RoleAddresses,
    pub clock: EpochSeconds,
}

impl InMemoryLedgerConfig {
    pub fn v1(
        package: ObjectId,
        state_id: ObjectId,
        admin: AccountAddress,
        roles: RoleAddresses,
    ) -> Self {
        Self {
            package,
            state_id,
            initial_shared_version: 1,
            admin,
            roles,
            clock: EpochSeconds(1_700_000_000),
        }
    }
}

#[derive(Debug, Clone)]
struct World {
    state: SystemState,
    records: BTreeMap<(RecordKind, u64), RecordBody>,
    admin: AccountAddress,
    clock: EpochSeconds,
    sequence: u64,
}

enum CallEffect {
    Committed {
        created: Vec<ObjectId>,
        events: Vec<Value>,
    },
    Returned(Vec<(Vec<u8>, String)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abort {
    Move { function: &'static str, code: u64 },
    ArgumentMismatch { index: usize },
}

impl Abort {
    fn render(&self) -> String {
        match self {
            Self::Move { function, code } => {
                format!("MoveAbort({EVIDENCE_MODULE}::{function}, {code})")
            }
            Self::ArgumentMismatch { index } => {
                format!("CommandArgumentError {{ arg_idx: {index}, kind: TypeMismatch }}")
            }
        }
    }
}

fn derive_id(parts: &[&[u8]]) -> ObjectId {
    let mut h = Sha256::new();
    for p in parts {
        h.update(p);
    }
    let out: [u8; ADDRESS_LENGTH] = h.finalize().into();
    ObjectId::new(out)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug)]
pub struct InMemoryLedger {
    package: ObjectId,
    world: Mutex<World>,
    injected: Mutex<VecDeque<EndpointError>>,
}

impl InMemoryLedger {
    pub fn new(config: InMemoryLedgerConfig) -> Self {
        let table = |kind: RecordKind| TableRef {
            table_id: derive_id(&[config.state_id.as_bytes(), kind.table_field().as_bytes()]),
            size: Some(0),
        };
        let state = SystemState {
            state_id: config.state_id,
            initial_shared_version: Some(config.initial_shared_version),
            evidence: RecordLedgerRef {
                max_record_id: 0,
                table: Some(table(RecordKind::Evidence)),
            },
            reports: Some(RecordLedgerRef {
                max_record_id: 0,
                table: Some(table(RecordKind::Report)),
            }),
            roles: config.roles,
        };
        Self {
            package: config.package,
            world: Mutex::new(World {
                state,
                records: BTreeMap::new(),
                admin: config.admin,
                clock: config.clock,
                sequence: 0,
            }),
            injected: Mutex::new(VecDeque::new()),
        }
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_injected(&self) -> Option<EndpointError> {
        self.injected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Queues an error to be returned by the next endpoint call, whatever
    /// its method.
    pub fn inject_failure(&self, err: EndpointError) {
        self.injected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(err);
    }

    pub fn set_clock(&self, clock: EpochSeconds) {
        self.world().clock = clock;
    }

    pub fn set_max_record_id(&self, kind: RecordKind, max_record_id: u64) {
        let mut w = self.world();
        if let Some(l) = ledger_mut(&mut w.state, kind) {
            l.max_record_id = max_record_id;
        }
    }

    /// Stores `body` under the next id without going through a transaction.
    pub fn seed_record(&self, kind: RecordKind, body: RecordBody) -> Option<u64> {
        let mut w = self.world();
        let id = w.state.next_record_id(kind)?;
        insert_record(&mut w, kind, id, body);
        Some(id)
    }

    pub fn system_state(&self) -> SystemState {
        self.world().state.clone()
    }

    pub fn record(&self, kind: RecordKind, id: u64) -> Option<LedgerRecord> {
        self.world()
            .records
            .get(&(kind, id))
            .cloned()
            .map(|body| LedgerRecord::new(kind, id, body))
    }

    pub fn record_count(&self, kind: RecordKind) -> usize {
        self.world().records.keys().filter(|(k, _)| *k == kind).count()
    }

    /// Transactions executed so far, committed or aborted.
    pub fn executed_transactions(&self) -> u64 {
        self.world().sequence
    }

    fn record_type(&self, kind: RecordKind) -> String {
        let name = match kind {
            RecordKind::Evidence => "Evidence",
            RecordKind::Report => "Report",
        };
        format!("{}::{EVIDENCE_MODULE}::{name}", self.package)
    }

    fn decode_call(&self, method: &'static str, tx_kind: &[u8]) -> Result<Payload, EndpointError> {
        let payload = decode_transaction_kind(tx_kind).map_err(|e| EndpointError::Rpc {
            method,
            code: RPC_INVALID_PARAMS,
            message: format!("invalid transaction bytes: {e}"),
        })?;
        if payload.target.package != self.package || payload.target.module != EVIDENCE_MODULE {
            return Err(EndpointError::Rpc {
                method,
                code: RPC_INVALID_PARAMS,
                message: format!("function {} does not exist", payload.target),
            });
        }
        Ok(payload)
    }
}

fn ledger_mut(state: &mut SystemState, kind: RecordKind) -> Option<&mut RecordLedgerRef> {
    match kind {
        RecordKind::Evidence => Some(&mut state.evidence),
        RecordKind::Report => state.reports.as_mut(),
    }
}

fn insert_record(w: &mut World, kind: RecordKind, id: u64, body: RecordBody) {
    w.records.insert((kind, id), body);
    let size = w.records.keys().filter(|(k, _)| *k == kind).count() as u64;
    if let Some(l) = ledger_mut(&mut w.state, kind) {
        l.max_record_id = id;
        if let Some(t) = l.table.as_mut() {
            t.size = Some(size);
        }
    }
}

fn field_object_id(state: &SystemState, kind: RecordKind, id: u64) -> Option<ObjectId> {
    let table = state.table_ref(kind)?;
    Some(derive_id(&[table.table_id.as_bytes(), &id.to_le_bytes()]))
}

struct Args<'a>(&'a [CallArg]);

impl Args<'_> {
    fn pure(&self, index: usize) -> Result<&PureArg, Abort> {
        match self.0.get(index) {
            Some(CallArg::Pure(v)) => Ok(v),
            _ => Err(Abort::ArgumentMismatch { index }),
        }
    }

    fn u64(&self, index: usize) -> Result<u64, Abort> {
        match self.pure(index)? {
            PureArg::U64(v) => Ok(*v),
            _ => Err(Abort::ArgumentMismatch { index }),
        }
    }

    fn bool(&self, index: usize) -> Result<bool, Abort> {
        match self.pure(index)? {
            PureArg::Bool(v) => Ok(*v),
            _ => Err(Abort::ArgumentMismatch { index }),
        }
    }

    fn bytes(&self, index: usize) -> Result<Vec<u8>, Abort> {
        match self.pure(index)? {
            PureArg::Bytes(b) => Ok(b.clone()),
            _ => Err(Abort::ArgumentMismatch { index }),
        }
    }

    fn address(&self, index: usize) -> Result<AccountAddress, Abort> {
        match self.pure(index)? {
            PureArg::Address(a) => Ok(*a),
            _ => Err(Abort::ArgumentMismatch { index }),
        }
    }

    fn state_id(&self) -> Option<ObjectId> {
        match self.0.first() {
            Some(CallArg::SharedObject(obj)) => Some(obj.object_id),
            _ => None,
        }
    }
}

/// Runs one decoded call against `w`. An argument of the wrong type aborts
/// the call like any other failure.
fn run_call(
    w: &mut World,
    package: ObjectId,
    sender: AccountAddress,
    payload: &Payload,
) -> Result<CallEffect, Abort> {
    let function = payload.entrypoint.function_name();
    let abort = |code| Abort::Move { function, code };
    if Args(&payload.arguments).state_id() != Some(w.state.state_id) {
        return Err(abort(ABORT_NOT_AUTHORIZED));
    }
    let args = Args(&payload.arguments);
    match payload.entrypoint {
        Entrypoint::AddEvidence | Entrypoint::AddReport => {
            let kind = if payload.entrypoint == Entrypoint::AddEvidence {
                RecordKind::Evidence
            } else {
                RecordKind::Report
            };
            let roles = w.state.roles;
            if sender != roles.peon && sender != roles.sho && sender != w.admin {
                return Err(abort(ABORT_NOT_AUTHORIZED));
            }
            let id = w
                .state
                .next_record_id(kind)
                .ok_or_else(|| abort(ABORT_ID_SPACE_EXHAUSTED))?;
            let body = RecordBody {
                case_no: args.u64(1)?,
                fir_no: args.u64(2)?,
                ipfs_hash: RecordText::Raw(args.bytes(3)?),
                content: RecordText::Raw(args.bytes(4)?),
                access: AccessFlag::from_bool(args.bool(5)?),
                head: args.address(6)?,
                latitude: Coordinate::from_wire(args.u64(7)?),
                longitude: Coordinate::from_wire(args.u64(8)?),
                created_at: w.clock,
            };
            insert_record(w, kind, id, body);
            let event_name = match kind {
                RecordKind::Evidence => "EvidenceAdded",
                RecordKind::Report => "ReportAdded",
            };
            let field_id = field_object_id(&w.state, kind, id);
            Ok(CallEffect::Committed {
                created: field_id.into_iter().collect(),
                events: vec![json!({
                    "type": format!("{package}::{EVIDENCE_MODULE}::{event_name}"),
                    "sender": sender.to_hex_literal(),
                    "parsedJson": {
                        "id": field_id.map(|f| f.to_hex_literal()),
                        kind.id_field(): id.to_string(),
                    },
                })],
            })
        }
        Entrypoint::ChangePeon | Entrypoint::ChangeSho => {
            if sender != w.admin {
                return Err(abort(ABORT_NOT_AUTHORIZED));
            }
            let role = if payload.entrypoint == Entrypoint::ChangePeon {
                RoleKind::Peon
            } else {
                RoleKind::Sho
            };
            let new_address = args.address(1)?;
            match role {
                RoleKind::Peon => w.state.roles.peon = new_address,
                RoleKind::Sho => w.state.roles.sho = new_address,
            }
            Ok(CallEffect::Committed {
                created: Vec::new(),
                events: vec![json!({
                    "type": format!("{package}::{EVIDENCE_MODULE}::RoleChanged"),
                    "sender": sender.to_hex_literal(),
                    "parsedJson": {
                        "role": role.as_str(),
                        "address": new_address.to_hex_literal(),
                    },
                })],
            })
        }
        Entrypoint::GetReport => {
            let id = args.u64(1)?;
            let body = w
                .records
                .get(&(RecordKind::Report, id))
                .cloned()
                .ok_or_else(|| abort(ABORT_REPORT_NOT_FOUND))?;
            Ok(CallEffect::Returned(RecordCodec::encode_report_return_values(
                &ReportRecord {
                    report_id: id,
                    body,
                },
            )))
        }
    }
}

fn status_json(result: &Result<CallEffect, Abort>) -> Value {
    match result {
        Ok(_) => json!({ "status": "success" }),
        Err(a) => json!({ "status": "failure", "error": a.render() }),
    }
}

impl LedgerEndpoint for InMemoryLedger {
    fn get_object(&self, object_id: ObjectId) -> Result<Value, EndpointError> {
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        let w = self.world();
        if object_id != w.state.state_id {
            return Ok(RecordCodec::encode_missing_object(object_id));
        }
        let state_type = format!("{}::{EVIDENCE_MODULE}::SystemState", self.package);
        Ok(RecordCodec::encode_system_state(&w.state, &state_type))
    }

    fn get_dynamic_field_object(&self, parent: ObjectId, key: u64) -> Result<Value, EndpointError> {
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        let w = self.world();
        let kind = RecordKind::all()
            .iter()
            .copied()
            .find(|k| w.state.table_ref(*k).map(|t| t.table_id) == Some(parent));
        let Some(kind) = kind else {
            return Ok(RecordCodec::encode_lookup_miss(parent));
        };
        match (w.records.get(&(kind, key)), field_object_id(&w.state, kind, key)) {
            (Some(body), Some(field_id)) => {
                let record = LedgerRecord::new(kind, key, body.clone());
                Ok(RecordCodec::encode_dynamic_field(
                    &record,
                    field_id,
                    &self.record_type(kind),
                ))
            }
            _ => Ok(RecordCodec::encode_lookup_miss(parent)),
        }
    }

    fn execute_transaction(&self, signed: &SignedPayload) -> Result<Value, EndpointError> {
        let method = methods::EXECUTE_TRANSACTION_BLOCK;
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        if signed.signatures.iter().all(|s| s.is_empty()) {
            return Err(EndpointError::Rpc {
                method,
                code: RPC_MISSING_SIGNATURE,
                message: "transaction carries no signature".to_string(),
            });
        }
        let payload = self.decode_call(method, &signed.tx_bytes)?;

        let mut w = self.world();
        w.sequence += 1;
        let mut digest_input = Sha256::new();
        digest_input.update(w.sequence.to_le_bytes());
        digest_input.update(signed.sender.as_bytes());
        digest_input.update(&signed.tx_bytes);
        let digest = hex(&digest_input.finalize());

        // aborted calls leave the world untouched
        let mut scratch = w.clone();
        let result = run_call(&mut scratch, self.package, signed.sender, &payload);
        let status = status_json(&result);
        let (created, events) = match result {
            Ok(CallEffect::Committed { created, events }) => {
                *w = scratch;
                (created, events)
            }
            Ok(CallEffect::Returned(_)) | Err(_) => (Vec::new(), Vec::new()),
        };
        tracing::debug!(
            target: "evidence_storage",
            function = payload.entrypoint.function_name(),
            sender = %signed.sender,
            digest = %digest,
            "executed transaction"
        );
        Ok(json!({
            "digest": digest,
            "effects": {
                "status": status,
                "created": created
                    .iter()
                    .map(|id| {
                        json!({
                            "owner": { "ObjectOwner": w.state.state_id.to_hex_literal() },
                            "reference": { "objectId": id.to_hex_literal() },
                        })
                    })
                    .collect::<Vec<_>>(),
            },
            "events": events,
        }))
    }

    fn dev_inspect(&self, sender: AccountAddress, tx_kind: &[u8]) -> Result<Value, EndpointError> {
        if let Some(err) = self.take_injected() {
            return Err(err);
        }
        let payload = self.decode_call(methods::DEV_INSPECT_TRANSACTION_BLOCK, tx_kind)?;
        let mut scratch = self.world().clone();
        let result = run_call(&mut scratch, self.package, sender, &payload);
        let status = status_json(&result);
        Ok(match result {
            Err(a) => json!({
                "effects": { "status": status },
                "error": a.render(),
            }),
            Ok(CallEffect::Returned(values)) => json!({
                "effects": { "status": status },
                "results": [ {
                    "returnValues": values
                        .into_iter()
                        .map(|(bytes, ty)| json!([bytes, ty]))
                        .collect::<Vec<_>>(),
                } ],
            }),
            Ok(CallEffect::Committed { .. }) => json!({
                "effects": { "status": status },
                "results": [ { "returnValues": [] } ],
            }),
        })
    }
}
