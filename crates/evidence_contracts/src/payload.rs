#![forbid(unsafe_code)]

use std::fmt;

use crate::ledger::{AccountAddress, ObjectId, RecordKind, RoleKind, SharedObjectRef};
use crate::{ContractViolation, Validate};

pub const EVIDENCE_MODULE: &str = "evidence_system";
pub const DEFAULT_GAS_BUDGET: u64 = 100_000_000;

/// Abort code `get_report` raises for an id with no stored report.
pub const ABORT_REPORT_NOT_FOUND: u64 = 3;

/// Parameter shapes of the contract entrypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    SystemState { mutable: bool },
    U64,
    Bool,
    Bytes,
    Address,
}

const RECORD_PARAMS: &[ParamType] = &[
    ParamType::SystemState { mutable: true },
    ParamType::U64,
    ParamType::U64,
    ParamType::Bytes,
    ParamType::Bytes,
    ParamType::Bool,
    ParamType::Address,
    ParamType::U64,
    ParamType::U64,
];

const ROLE_PARAMS: &[ParamType] = &[ParamType::SystemState { mutable: true }, ParamType::Address];

const QUERY_PARAMS: &[ParamType] = &[ParamType::SystemState { mutable: false }, ParamType::U64];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entrypoint {
    AddEvidence,
    AddReport,
    ChangePeon,
    ChangeSho,
    GetReport,
}

impl Entrypoint {
    pub const fn function_name(self) -> &'static str {
        match self {
            Self::AddEvidence => "add_evidence",
            Self::AddReport => "add_report",
            Self::ChangePeon => "change_peon",
            Self::ChangeSho => "change_sho",
            Self::GetReport => "get_report",
        }
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        match name {
            "add_evidence" => Some(Self::AddEvidence),
            "add_report" => Some(Self::AddReport),
            "change_peon" => Some(Self::ChangePeon),
            "change_sho" => Some(Self::ChangeSho),
            "get_report" => Some(Self::GetReport),
            _ => None,
        }
    }

    pub const fn add_record(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Evidence => Self::AddEvidence,
            RecordKind::Report => Self::AddReport,
        }
    }

    pub const fn change_role(role: RoleKind) -> Self {
        match role {
            RoleKind::Peon => Self::ChangePeon,
            RoleKind::Sho => Self::ChangeSho,
        }
    }

    pub const fn is_write(self) -> bool {
        !matches!(self, Self::GetReport)
    }

    /// Canonical parameter list, state object first.
    pub const fn params(self) -> &'static [ParamType] {
        match self {
            Self::AddEvidence | Self::AddReport => RECORD_PARAMS,
            Self::ChangePeon | Self::ChangeSho => ROLE_PARAMS,
            Self::GetReport => QUERY_PARAMS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTarget {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
}

impl fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PureArg {
    U64(u64),
    Bool(bool),
    Bytes(Vec<u8>),
    Address(AccountAddress),
}

impl PureArg {
    pub const fn move_type(&self) -> &'static str {
        match self {
            Self::U64(_) => "u64",
            Self::Bool(_) => "bool",
            Self::Bytes(_) => "vector<u8>",
            Self::Address(_) => "address",
        }
    }

    fn matches(&self, param: ParamType) -> bool {
        matches!(
            (self, param),
            (Self::U64(_), ParamType::U64)
                | (Self::Bool(_), ParamType::Bool)
                | (Self::Bytes(_), ParamType::Bytes)
                | (Self::Address(_), ParamType::Address)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    Pure(PureArg),
    SharedObject(SharedObjectRef),
}

/// A fully encoded, unsigned call ready for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub entrypoint: Entrypoint,
    pub target: MoveTarget,
    pub arguments: Vec<CallArg>,
    /// Present on every write; absent on read-only inspection.
    pub gas_budget: Option<u64>,
}

impl Validate for Payload {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.target.function != self.entrypoint.function_name() {
            return Err(ContractViolation::invalid(
                "payload.target.function",
                "must match entrypoint",
            ));
        }
        if self.target.module.is_empty() || !self.target.module.is_ascii() {
            return Err(ContractViolation::invalid(
                "payload.target.module",
                "must be a non-empty ascii identifier",
            ));
        }
        let params = self.entrypoint.params();
        if self.arguments.len() != params.len() {
            return Err(ContractViolation::invalid(
                "payload.arguments",
                "must match entrypoint arity",
            ));
        }
        for (arg, param) in self.arguments.iter().zip(params) {
            let ok = match (arg, param) {
                (CallArg::SharedObject(obj), ParamType::SystemState { mutable }) => {
                    obj.mutable == *mutable
                }
                (CallArg::Pure(p), _) => p.matches(*param),
                _ => false,
            };
            if !ok {
                return Err(ContractViolation::invalid(
                    "payload.arguments",
                    "argument type does not match entrypoint signature",
                ));
            }
        }
        match (self.entrypoint.is_write(), self.gas_budget) {
            (true, None) | (true, Some(0)) => Err(ContractViolation::invalid(
                "payload.gas_budget",
                "must be > 0 for write calls",
            )),
            (false, Some(_)) => Err(ContractViolation::invalid(
                "payload.gas_budget",
                "must be absent for read-only calls",
            )),
            _ => Ok(()),
        }
    }
}

/// Output of the signer capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub tx_bytes: Vec<u8>,
    pub signatures: Vec<Vec<u8>>,
    pub sender: AccountAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEvent {
    pub event_type: String,
    pub record_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub digest: String,
    pub created: Vec<ObjectId>,
    pub events: Vec<LedgerEvent>,
}
