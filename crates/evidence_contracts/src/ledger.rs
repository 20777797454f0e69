#![forbid(unsafe_code)]

use std::fmt;

use crate::ContractViolation;

pub const ADDRESS_LENGTH: usize = 32;
const HEX_LITERAL_LEN: usize = 2 + ADDRESS_LENGTH * 2;

fn parse_hex_literal(raw: &str) -> Option<[u8; ADDRESS_LENGTH]> {
    let hex = raw.strip_prefix("0x")?;
    if raw.len() != HEX_LITERAL_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut out = [0u8; ADDRESS_LENGTH];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        out[i] = (hex_nibble(chunk[0]) << 4) | hex_nibble(chunk[1]);
    }
    Some(out)
}

fn hex_nibble(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

fn write_hex_literal(f: &mut fmt::Formatter<'_>, bytes: &[u8; ADDRESS_LENGTH]) -> fmt::Result {
    f.write_str("0x")?;
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    Ok(())
}

/// Account identifier: `0x` followed by exactly 64 hex digits.
///
/// Parsing accepts either hex case; rendering is always lowercase, so every
/// address has exactly one textual form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountAddress([u8; ADDRESS_LENGTH]);

impl AccountAddress {
    pub const ZERO: Self = Self([0u8; ADDRESS_LENGTH]);

    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn parse(field: &'static str, raw: &str) -> Result<Self, ContractViolation> {
        parse_hex_literal(raw.trim()).map(Self).ok_or(ContractViolation::InvalidValue {
            field,
            reason: "must be 0x followed by 64 hex digits",
        })
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn to_hex_literal(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex_literal(f, &self.0)
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({self})")
    }
}

/// On-chain object identifier. Same wire shape as an address, kept as a
/// separate type so the two cannot be swapped by accident.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; ADDRESS_LENGTH]);

impl ObjectId {
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn parse(field: &'static str, raw: &str) -> Result<Self, ContractViolation> {
        parse_hex_literal(raw.trim()).map(Self).ok_or(ContractViolation::InvalidValue {
            field,
            reason: "must be 0x followed by 64 hex digits",
        })
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn to_hex_literal(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex_literal(f, &self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Evidence,
    Report,
}

impl RecordKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evidence => "evidence",
            Self::Report => "report",
        }
    }

    /// Field of the system state holding this kind's record table.
    pub const fn table_field(self) -> &'static str {
        match self {
            Self::Evidence => "evidences",
            Self::Report => "reports",
        }
    }

    /// Field of the system state holding this kind's id counter.
    pub const fn counter_field(self) -> &'static str {
        match self {
            Self::Evidence => "max_evidence",
            Self::Report => "max_report",
        }
    }

    /// Field of the stored record carrying its own id.
    pub const fn id_field(self) -> &'static str {
        match self {
            Self::Evidence => "evidence_id",
            Self::Report => "report_id",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[Self::Evidence, Self::Report]
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleKind {
    Peon,
    Sho,
}

impl RoleKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Peon => "peon",
            Self::Sho => "sho",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAddresses {
    pub peon: AccountAddress,
    pub sho: AccountAddress,
}

impl RoleAddresses {
    pub fn get(&self, role: RoleKind) -> AccountAddress {
        match role {
            RoleKind::Peon => self.peon,
            RoleKind::Sho => self.sho,
        }
    }
}

/// Reference to a shared object as a transaction input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedObjectRef {
    pub object_id: ObjectId,
    pub initial_shared_version: u64,
    pub mutable: bool,
}

/// Indirection from the system state to the keyed index of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRef {
    pub table_id: ObjectId,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLedgerRef {
    pub max_record_id: u64,
    pub table: Option<TableRef>,
}

/// Snapshot of the singleton state object. Never cached: every action
/// re-reads it because external writers advance the counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemState {
    pub state_id: ObjectId,
    pub initial_shared_version: Option<u64>,
    pub evidence: RecordLedgerRef,
    pub reports: Option<RecordLedgerRef>,
    pub roles: RoleAddresses,
}

impl SystemState {
    pub fn ledger(&self, kind: RecordKind) -> Option<&RecordLedgerRef> {
        match kind {
            RecordKind::Evidence => Some(&self.evidence),
            RecordKind::Report => self.reports.as_ref(),
        }
    }

    pub fn max_record_id(&self, kind: RecordKind) -> Option<u64> {
        self.ledger(kind).map(|l| l.max_record_id)
    }

    /// Id the ledger will assign to the next record of `kind`, if the
    /// counter has not saturated.
    pub fn next_record_id(&self, kind: RecordKind) -> Option<u64> {
        self.max_record_id(kind)?.checked_add(1)
    }

    pub fn table_ref(&self, kind: RecordKind) -> Option<TableRef> {
        self.ledger(kind).and_then(|l| l.table)
    }

    pub fn shared_ref(&self, mutable: bool) -> Option<SharedObjectRef> {
        self.initial_shared_version.map(|v| SharedObjectRef {
            object_id: self.state_id,
            initial_shared_version: v,
            mutable,
        })
    }
}
