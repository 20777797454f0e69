#![forbid(unsafe_code)]

//! Schema-driven decoding of ledger field trees into typed records.
//!
//! Every accessor carries the dotted path it was reached by, so the first
//! absent or mistyped wrapper surfaces as `DecodeError { path, .. }` instead
//! of leaking a null downstream.

use evidence_contracts::ledger::{
    AccountAddress, ObjectId, RecordKind, RecordLedgerRef, RoleAddresses, SystemState, TableRef,
};
use evidence_contracts::payload::{LedgerEvent, ParamType, PureArg};
use evidence_contracts::record::{
    AccessFlag, Coordinate, LedgerRecord, LookupOutcome, RecordBody, RecordText, ReportRecord,
};
use evidence_contracts::{DecodeError, EpochSeconds};
use serde_json::{json, Map, Value};

use crate::bcs::{decode_pure, encode_pure};

pub mod field_names {
    pub const CASE_NO: &str = "case_no";
    pub const FIR_NO: &str = "fir_no";
    pub const IPFS: &str = "ipfs";
    pub const CONTENT: &str = "content";
    pub const ACCESS: &str = "access";
    pub const HEAD: &str = "head";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const DATE: &str = "date";
    pub const PEON: &str = "peon";
    pub const SHO: &str = "sho";
}

/// Object lookups that mean "nothing stored under this key".
const MISS_CODES: &[&str] = &["dynamicFieldNotFound", "notExists", "deleted"];

/// Return value layout of `get_report`.
const REPORT_RETURN_LAYOUT: &[(&str, ParamType, &str)] = &[
    ("report_id", ParamType::U64, "u64"),
    (field_names::CASE_NO, ParamType::U64, "u64"),
    (field_names::FIR_NO, ParamType::U64, "u64"),
    (field_names::IPFS, ParamType::Bytes, "vector<u8>"),
    (field_names::CONTENT, ParamType::Bytes, "vector<u8>"),
    (field_names::HEAD, ParamType::Address, "address"),
    (field_names::DATE, ParamType::U64, "u64"),
    (field_names::ACCESS, ParamType::Bool, "bool"),
    (field_names::LATITUDE, ParamType::U64, "u64"),
    (field_names::LONGITUDE, ParamType::U64, "u64"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextPolicy {
    /// Keep byte fields exactly as stored.
    #[default]
    Raw,
    /// Decode byte fields as UTF-8; invalid sequences are a decode error.
    Utf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    pub text: TextPolicy,
}

impl DecodeOptions {
    pub const fn raw() -> Self {
        Self {
            text: TextPolicy::Raw,
        }
    }

    pub const fn utf8() -> Self {
        Self {
            text: TextPolicy::Utf8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub digest: String,
    pub status: ExecutionStatus,
    pub created: Vec<ObjectId>,
    pub events: Vec<LedgerEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectionOutcome {
    Returned(Vec<(Vec<u8>, String)>),
    Failed { reason: String },
}

struct Node<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Node<'a> {
    fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    fn shown_path(&self) -> String {
        if self.path.is_empty() {
            "<root>".to_string()
        } else {
            self.path.clone()
        }
    }

    fn join(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        }
    }

    fn fail(&self, reason: &'static str) -> DecodeError {
        DecodeError::new(self.shown_path(), reason)
    }

    fn object(&self) -> Result<&'a Map<String, Value>, DecodeError> {
        self.value.as_object().ok_or_else(|| self.fail("is not an object"))
    }

    fn opt_field(&self, name: &str) -> Result<Option<Node<'a>>, DecodeError> {
        Ok(self
            .object()?
            .get(name)
            .filter(|v| !v.is_null())
            .map(|value| Node {
                value,
                path: self.join(name),
            }))
    }

    fn field(&self, name: &str) -> Result<Node<'a>, DecodeError> {
        self.opt_field(name)?
            .ok_or_else(|| DecodeError::missing(self.join(name)))
    }

    fn items(&self) -> Result<Vec<Node<'a>>, DecodeError> {
        let arr = self.value.as_array().ok_or_else(|| self.fail("is not an array"))?;
        Ok(arr
            .iter()
            .enumerate()
            .map(|(i, value)| Node {
                value,
                path: format!("{}[{}]", self.shown_path(), i),
            })
            .collect())
    }

    fn as_u64(&self) -> Result<u64, DecodeError> {
        match self.value {
            Value::String(s) => {
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(self.fail("is not an unsigned integer"));
                }
                s.parse::<u64>().map_err(|_| self.fail("exceeds the u64 range"))
            }
            Value::Number(n) => n.as_u64().ok_or_else(|| self.fail("is not an unsigned integer")),
            _ => Err(self.fail("is not an unsigned integer")),
        }
    }

    fn as_bool(&self) -> Result<bool, DecodeError> {
        self.value.as_bool().ok_or_else(|| self.fail("is not a boolean"))
    }

    fn as_str(&self) -> Result<&'a str, DecodeError> {
        self.value.as_str().ok_or_else(|| self.fail("is not a string"))
    }

    fn as_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        self.items()?
            .iter()
            .map(|item| {
                item.value
                    .as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| item.fail("is not a byte"))
            })
            .collect()
    }

    fn as_address(&self) -> Result<AccountAddress, DecodeError> {
        AccountAddress::parse("address", self.as_str()?)
            .map_err(|_| self.fail("is not a 0x-prefixed 32-byte address"))
    }

    fn as_object_id(&self) -> Result<ObjectId, DecodeError> {
        ObjectId::parse("object_id", self.as_str()?)
            .map_err(|_| self.fail("is not a 0x-prefixed 32-byte object id"))
    }
}

fn text_from_bytes(
    bytes: Vec<u8>,
    policy: TextPolicy,
    path: impl FnOnce() -> String,
) -> Result<RecordText, DecodeError> {
    match policy {
        TextPolicy::Raw => Ok(RecordText::Raw(bytes)),
        TextPolicy::Utf8 => String::from_utf8(bytes)
            .map(RecordText::Utf8)
            .map_err(|_| DecodeError::new(path(), "is not valid utf-8")),
    }
}

fn bytes_json(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| json!(b)).collect())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordCodec {
    options: DecodeOptions,
}

impl RecordCodec {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    /// Decodes a dynamic-field object response for `kind`.
    pub fn decode_record(
        &self,
        raw: &Value,
        kind: RecordKind,
    ) -> Result<LedgerRecord, DecodeError> {
        let root = Node::root(raw);
        let content = root.field("data")?.field("content")?;
        if content.field("dataType")?.as_str()? != "moveObject" {
            return Err(DecodeError::new(
                content.join("dataType"),
                "is not a move object",
            ));
        }
        let fields = content.field("fields")?.field("value")?.field("fields")?;
        let id = fields.field(kind.id_field())?.as_u64()?;
        Ok(LedgerRecord::new(kind, id, self.decode_body(&fields)?))
    }

    /// Decodes the response of a keyed lookup for `id`. A miss reported by
    /// the endpoint is `NotFound`; anything else that fails to decode is an
    /// error, so a malformed record is never mistaken for a missing one.
    pub fn decode_lookup(
        &self,
        raw: &Value,
        kind: RecordKind,
        id: u64,
    ) -> Result<LookupOutcome, DecodeError> {
        let root = Node::root(raw);
        if root.opt_field("data")?.is_none() {
            let error = root.field("error")?;
            let code = error.field("code")?.as_str()?;
            if MISS_CODES.contains(&code) {
                return Ok(LookupOutcome::NotFound { kind, id });
            }
            return Err(DecodeError::new(
                error.join("code"),
                "is not a recognized lookup miss",
            ));
        }

        let key = root
            .field("data")?
            .field("content")?
            .field("fields")?
            .field("name")?;
        if key.as_u64()? != id {
            return Err(DecodeError::new(key.path, "does not match the lookup key"));
        }
        let record = self.decode_record(raw, kind)?;
        if record.id() != id {
            return Err(DecodeError::new(
                format!("data.content.fields.value.fields.{}", kind.id_field()),
                "does not match the lookup key",
            ));
        }
        Ok(LookupOutcome::Found(record))
    }

    fn decode_body(&self, fields: &Node<'_>) -> Result<RecordBody, DecodeError> {
        let ipfs = fields.field(field_names::IPFS)?;
        let content = fields.field(field_names::CONTENT)?;
        Ok(RecordBody {
            case_no: fields.field(field_names::CASE_NO)?.as_u64()?,
            fir_no: fields.field(field_names::FIR_NO)?.as_u64()?,
            ipfs_hash: text_from_bytes(ipfs.as_bytes()?, self.options.text, || ipfs.path.clone())?,
            content: text_from_bytes(content.as_bytes()?, self.options.text, || {
                content.path.clone()
            })?,
            access: AccessFlag::from_bool(fields.field(field_names::ACCESS)?.as_bool()?),
            head: fields.field(field_names::HEAD)?.as_address()?,
            latitude: Coordinate::from_wire(fields.field(field_names::LATITUDE)?.as_u64()?),
            longitude: Coordinate::from_wire(fields.field(field_names::LONGITUDE)?.as_u64()?),
            created_at: EpochSeconds(fields.field(field_names::DATE)?.as_u64()?),
        })
    }

    /// Decodes the singleton state object. Counters and roles are required;
    /// table references and the report ledger may be absent.
    pub fn decode_system_state(raw: &Value) -> Result<SystemState, DecodeError> {
        let root = Node::root(raw);
        let data = root.opt_field("data")?.ok_or_else(|| {
            DecodeError::new("data", "system state object is unavailable")
        })?;
        let state_id = data.field("objectId")?.as_object_id()?;
        let initial_shared_version = match data.opt_field("owner")? {
            Some(owner) => match owner.value {
                Value::Object(_) => match owner.opt_field("Shared")? {
                    Some(shared) => Some(shared.field("initial_shared_version")?.as_u64()?),
                    None => None,
                },
                _ => None,
            },
            None => None,
        };
        let fields = data.field("content")?.field("fields")?;

        let evidence = RecordLedgerRef {
            max_record_id: fields.field(RecordKind::Evidence.counter_field())?.as_u64()?,
            table: decode_table(&fields, RecordKind::Evidence)?,
        };
        let reports = match fields.opt_field(RecordKind::Report.counter_field())? {
            Some(counter) => Some(RecordLedgerRef {
                max_record_id: counter.as_u64()?,
                table: decode_table(&fields, RecordKind::Report)?,
            }),
            None => None,
        };
        let roles = RoleAddresses {
            peon: fields.field(field_names::PEON)?.as_address()?,
            sho: fields.field(field_names::SHO)?.as_address()?,
        };
        Ok(SystemState {
            state_id,
            initial_shared_version,
            evidence,
            reports,
            roles,
        })
    }

    pub fn decode_execution(raw: &Value) -> Result<ExecutionOutcome, DecodeError> {
        let root = Node::root(raw);
        let digest = root.field("digest")?.as_str()?.to_string();
        let effects = root.field("effects")?;
        let status_node = effects.field("status")?;
        let status = match status_node.field("status")?.as_str()? {
            "success" => ExecutionStatus::Success,
            "failure" => ExecutionStatus::Failure {
                reason: match status_node.opt_field("error")? {
                    Some(e) => e.as_str()?.to_string(),
                    None => "execution failed without a reported reason".to_string(),
                },
            },
            _ => {
                return Err(DecodeError::new(
                    status_node.join("status"),
                    "is neither success nor failure",
                ))
            }
        };
        // Past the status, a committed transaction never fails on metadata.
        let created: Vec<ObjectId> = effects
            .opt_field("created")
            .ok()
            .flatten()
            .and_then(|list| list.items().ok())
            .map(|items| items.iter().filter_map(created_object).collect())
            .unwrap_or_default();
        let events: Vec<LedgerEvent> = root
            .opt_field("events")
            .ok()
            .flatten()
            .and_then(|list| list.items().ok())
            .map(|items| items.iter().filter_map(ledger_event).collect())
            .unwrap_or_default();
        Ok(ExecutionOutcome {
            digest,
            status,
            created,
            events,
        })
    }

    pub fn decode_inspection(raw: &Value) -> Result<InspectionOutcome, DecodeError> {
        let root = Node::root(raw);
        if let Some(err) = root.opt_field("error")? {
            return Ok(InspectionOutcome::Failed {
                reason: err.as_str()?.to_string(),
            });
        }
        let results = root.field("results")?.items()?;
        let first = results
            .first()
            .ok_or_else(|| DecodeError::missing("results[0]"))?;
        let mut values = Vec::new();
        for item in first.field("returnValues")?.items()? {
            let pair = item.items()?;
            if pair.len() != 2 {
                return Err(item.fail("is not a [bytes, type] pair"));
            }
            values.push((pair[0].as_bytes()?, pair[1].as_str()?.to_string()));
        }
        Ok(InspectionOutcome::Returned(values))
    }

    /// Decodes the BCS return values of `get_report`.
    pub fn decode_report_return_values(
        &self,
        values: &[(Vec<u8>, String)],
    ) -> Result<ReportRecord, DecodeError> {
        if values.len() != REPORT_RETURN_LAYOUT.len() {
            return Err(DecodeError::new(
                "returnValues",
                "does not have the get_report arity",
            ));
        }
        let mut decoded = Vec::with_capacity(values.len());
        for (i, ((bytes, type_tag), (_, param, expected_tag))) in
            values.iter().zip(REPORT_RETURN_LAYOUT).enumerate()
        {
            let path = format!("returnValues[{i}]");
            if type_tag.as_str() != *expected_tag {
                return Err(DecodeError::new(path, "has an unexpected move type"));
            }
            let arg = decode_pure(bytes, *param)
                .map_err(|_| DecodeError::new(path, "is not valid bcs for its type"))?;
            decoded.push(arg);
        }
        let decoded = <[PureArg; 10]>::try_from(decoded).map_err(|_| {
            DecodeError::new("returnValues", "does not have the get_report arity")
        })?;
        let [
            PureArg::U64(report_id),
            PureArg::U64(case_no),
            PureArg::U64(fir_no),
            PureArg::Bytes(ipfs),
            PureArg::Bytes(content),
            PureArg::Address(head),
            PureArg::U64(created_at),
            PureArg::Bool(access),
            PureArg::U64(latitude),
            PureArg::U64(longitude),
        ] = decoded
        else {
            return Err(DecodeError::new(
                "returnValues",
                "does not match the get_report layout",
            ));
        };
        Ok(ReportRecord {
            report_id,
            body: RecordBody {
                case_no,
                fir_no,
                ipfs_hash: text_from_bytes(ipfs, self.options.text, || {
                    "returnValues[3]".to_string()
                })?,
                content: text_from_bytes(content, self.options.text, || {
                    "returnValues[4]".to_string()
                })?,
                head,
                created_at: EpochSeconds(created_at),
                access: AccessFlag::from_bool(access),
                latitude: Coordinate::from_wire(latitude),
                longitude: Coordinate::from_wire(longitude),
            },
        })
    }

    /// Field set of a stored record, as rendered by the ledger.
    pub fn encode_field_tree(record: &LedgerRecord) -> Value {
        let body = record.body();
        let mut fields = Map::new();
        fields.insert(
            record.kind().id_field().to_string(),
            json!(record.id().to_string()),
        );
        fields.insert(field_names::CASE_NO.into(), json!(body.case_no.to_string()));
        fields.insert(field_names::FIR_NO.into(), json!(body.fir_no.to_string()));
        fields.insert(field_names::IPFS.into(), bytes_json(body.ipfs_hash.as_bytes()));
        fields.insert(field_names::CONTENT.into(), bytes_json(body.content.as_bytes()));
        fields.insert(field_names::ACCESS.into(), json!(body.access.is_public()));
        fields.insert(field_names::HEAD.into(), json!(body.head.to_hex_literal()));
        fields.insert(
            field_names::LATITUDE.into(),
            json!(body.latitude.to_wire().to_string()),
        );
        fields.insert(
            field_names::LONGITUDE.into(),
            json!(body.longitude.to_wire().to_string()),
        );
        fields.insert(field_names::DATE.into(), json!(body.created_at.0.to_string()));
        Value::Object(fields)
    }

    /// Full dynamic-field object response wrapping `record`.
    pub fn encode_dynamic_field(
        record: &LedgerRecord,
        field_object_id: ObjectId,
        record_type: &str,
    ) -> Value {
        json!({
            "data": {
                "objectId": field_object_id.to_hex_literal(),
                "type": format!("0x2::dynamic_field::Field<u64, {record_type}>"),
                "content": {
                    "dataType": "moveObject",
                    "type": format!("0x2::dynamic_field::Field<u64, {record_type}>"),
                    "hasPublicTransfer": false,
                    "fields": {
                        "id": { "id": field_object_id.to_hex_literal() },
                        "name": record.id().to_string(),
                        "value": {
                            "type": record_type,
                            "fields": Self::encode_field_tree(record),
                        }
                    }
                }
            }
        })
    }

    pub fn encode_lookup_miss(parent: ObjectId) -> Value {
        json!({
            "error": {
                "code": "dynamicFieldNotFound",
                "parent_object_id": parent.to_hex_literal(),
            }
        })
    }

    pub fn encode_missing_object(object_id: ObjectId) -> Value {
        json!({
            "error": {
                "code": "notExists",
                "object_id": object_id.to_hex_literal(),
            }
        })
    }

    pub fn encode_system_state(state: &SystemState, state_type: &str) -> Value {
        let mut fields = Map::new();
        encode_ledger_ref(&mut fields, RecordKind::Evidence, Some(&state.evidence));
        encode_ledger_ref(&mut fields, RecordKind::Report, state.reports.as_ref());
        fields.insert(
            field_names::PEON.into(),
            json!(state.roles.peon.to_hex_literal()),
        );
        fields.insert(
            field_names::SHO.into(),
            json!(state.roles.sho.to_hex_literal()),
        );
        fields.insert(
            "id".into(),
            json!({ "id": state.state_id.to_hex_literal() }),
        );
        let owner = match state.initial_shared_version {
            Some(v) => json!({ "Shared": { "initial_shared_version": v } }),
            None => json!("Immutable"),
        };
        json!({
            "data": {
                "objectId": state.state_id.to_hex_literal(),
                "type": state_type,
                "owner": owner,
                "content": {
                    "dataType": "moveObject",
                    "type": state_type,
                    "hasPublicTransfer": false,
                    "fields": Value::Object(fields),
                }
            }
        })
    }

    pub fn encode_report_return_values(record: &ReportRecord) -> Vec<(Vec<u8>, String)> {
        let b = &record.body;
        let values = [
            PureArg::U64(record.report_id),
            PureArg::U64(b.case_no),
            PureArg::U64(b.fir_no),
            PureArg::Bytes(b.ipfs_hash.as_bytes().to_vec()),
            PureArg::Bytes(b.content.as_bytes().to_vec()),
            PureArg::Address(b.head),
            PureArg::U64(b.created_at.0),
            PureArg::Bool(b.access.is_public()),
            PureArg::U64(b.latitude.to_wire()),
            PureArg::U64(b.longitude.to_wire()),
        ];
        values
            .iter()
            .map(|v| (encode_pure(v), v.move_type().to_string()))
            .collect()
    }
}

fn created_object(item: &Node<'_>) -> Option<ObjectId> {
    item.field("reference")
        .ok()?
        .field("objectId")
        .ok()?
        .as_object_id()
        .ok()
}

/// Only the kind-specific id keys name a record; other event fields are opaque.
fn ledger_event(item: &Node<'_>) -> Option<LedgerEvent> {
    let event_type = item.field("type").ok()?.as_str().ok()?.to_string();
    let record_id = item
        .opt_field("parsedJson")
        .ok()
        .flatten()
        .and_then(|parsed| {
            [RecordKind::Evidence, RecordKind::Report]
                .into_iter()
                .find_map(|kind| parsed.opt_field(kind.id_field()).ok().flatten())
        })
        .and_then(|id| id.as_u64().ok());
    Some(LedgerEvent {
        event_type,
        record_id,
    })
}

fn decode_table(fields: &Node<'_>, kind: RecordKind) -> Result<Option<TableRef>, DecodeError> {
    let Some(table) = fields.opt_field(kind.table_field())? else {
        return Ok(None);
    };
    let inner = table.field("fields")?;
    let table_id = inner.field("id")?.field("id")?.as_object_id()?;
    let size = match inner.opt_field("size")? {
        Some(s) => Some(s.as_u64()?),
        None => None,
    };
    Ok(Some(TableRef { table_id, size }))
}

fn encode_ledger_ref(
    fields: &mut Map<String, Value>,
    kind: RecordKind,
    ledger: Option<&RecordLedgerRef>,
) {
    let Some(ledger) = ledger else {
        return;
    };
    fields.insert(
        kind.counter_field().into(),
        json!(ledger.max_record_id.to_string()),
    );
    if let Some(table) = ledger.table {
        let mut inner = Map::new();
        inner.insert("id".into(), json!({ "id": table.table_id.to_hex_literal() }));
        if let Some(size) = table.size {
            inner.insert("size".into(), json!(size.to_string()));
        }
        fields.insert(
            kind.table_field().into(),
            json!({ "type": "0x2::table::Table", "fields": Value::Object(inner) }),
        );
    }
}
