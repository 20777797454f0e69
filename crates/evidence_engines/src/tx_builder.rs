#![forbid(unsafe_code)]

use std::str::FromStr;

use evidence_contracts::form::{field_names, RecordForm};
use evidence_contracts::ledger::{
    AccountAddress, ObjectId, RecordKind, RoleKind, SharedObjectRef,
};
use evidence_contracts::payload::{
    CallArg, Entrypoint, MoveTarget, Payload, PureArg, DEFAULT_GAS_BUDGET, EVIDENCE_MODULE,
};
use evidence_contracts::record::{Coordinate, COORDINATE_FRACTION_DIGITS, MICRO_DEGREES_PER_DEGREE};
use evidence_contracts::{ContractViolation, Validate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub const LATITUDE_LIMIT_DEGREES: i64 = 90;
pub const LONGITUDE_LIMIT_DEGREES: i64 = 180;

/// Deployed contract coordinates every payload is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTarget {
    pub package: ObjectId,
    pub module: String,
    pub state_id: ObjectId,
    pub state_initial_shared_version: u64,
    pub gas_budget: u64,
}

impl LedgerTarget {
    pub fn v1(
        package: ObjectId,
        state_id: ObjectId,
        state_initial_shared_version: u64,
    ) -> Result<Self, ContractViolation> {
        let t = Self {
            package,
            module: EVIDENCE_MODULE.to_string(),
            state_id,
            state_initial_shared_version,
            gas_budget: DEFAULT_GAS_BUDGET,
        };
        t.validate()?;
        Ok(t)
    }

    fn state_arg(&self, mutable: bool) -> CallArg {
        CallArg::SharedObject(SharedObjectRef {
            object_id: self.state_id,
            initial_shared_version: self.state_initial_shared_version,
            mutable,
        })
    }

    fn target(&self, entrypoint: Entrypoint) -> MoveTarget {
        MoveTarget {
            package: self.package,
            module: self.module.clone(),
            function: entrypoint.function_name().to_string(),
        }
    }
}

impl Validate for LedgerTarget {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.gas_budget == 0 {
            return Err(ContractViolation::invalid(
                "ledger_target.gas_budget",
                "must be > 0",
            ));
        }
        if self.module.is_empty()
            || !self
                .module
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(ContractViolation::invalid(
                "ledger_target.module",
                "must be a move identifier",
            ));
        }
        Ok(())
    }
}

/// Form input after validation, in contract units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecordInput {
    pub case_no: u64,
    pub fir_no: u64,
    pub ipfs_hash: Vec<u8>,
    pub content: Vec<u8>,
    pub public_access: bool,
    pub head: AccountAddress,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
}

/// Checks every field in a fixed order and returns the first failure.
pub fn validate_record_form(form: &RecordForm) -> Result<ValidatedRecordInput, ContractViolation> {
    let case_no = parse_unsigned(field_names::CASE_NO, &form.case_no)?;
    let fir_no = parse_unsigned(field_names::FIR_NO, &form.fir_no)?;
    require_non_empty(field_names::IPFS_HASH, &form.ipfs_hash)?;
    require_non_empty(field_names::CONTENT, &form.content)?;
    let head = AccountAddress::parse(field_names::HEAD_ADDRESS, &form.head_address)?;
    let latitude = parse_coordinate(field_names::LATITUDE, &form.latitude, LATITUDE_LIMIT_DEGREES)?;
    let longitude =
        parse_coordinate(field_names::LONGITUDE, &form.longitude, LONGITUDE_LIMIT_DEGREES)?;
    Ok(ValidatedRecordInput {
        case_no,
        fir_no,
        ipfs_hash: form.ipfs_hash.as_bytes().to_vec(),
        content: form.content.as_bytes().to_vec(),
        public_access: form.public_access,
        head,
        latitude,
        longitude,
    })
}

fn parse_unsigned(field: &'static str, raw: &str) -> Result<u64, ContractViolation> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(ContractViolation::invalid(field, "must not be empty"));
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ContractViolation::invalid(
            field,
            "must be a non-negative integer",
        ));
    }
    s.parse::<u64>()
        .map_err(|_| ContractViolation::invalid(field, "exceeds the u64 range"))
}

fn require_non_empty(field: &'static str, raw: &str) -> Result<(), ContractViolation> {
    if raw.trim().is_empty() {
        return Err(ContractViolation::invalid(field, "must not be empty"));
    }
    Ok(())
}

fn parse_coordinate(
    field: &'static str,
    raw: &str,
    limit_degrees: i64,
) -> Result<Coordinate, ContractViolation> {
    let s = raw.trim();
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let mut parts = unsigned.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let frac = parts.next();
    let digits_ok = !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && frac.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()));
    if !digits_ok {
        return Err(ContractViolation::invalid(field, "must be a decimal number"));
    }
    // Precision and magnitude are judged on the text; Decimal rounds past 28 digits.
    let frac = frac.map_or("", |f| f.trim_end_matches('0'));
    if frac.len() > COORDINATE_FRACTION_DIGITS as usize {
        return Err(ContractViolation::invalid(
            field,
            "must have at most 6 fractional digits",
        ));
    }
    let whole = whole.trim_start_matches('0');
    if whole.len() > 3 {
        return Err(ContractViolation::OutOfRange {
            field,
            min: -limit_degrees,
            max: limit_degrees,
        });
    }
    let sign = if s.starts_with('-') { "-" } else { "" };
    let whole = if whole.is_empty() { "0" } else { whole };
    let canonical = if frac.is_empty() {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{frac}")
    };
    let value = Decimal::from_str(&canonical)
        .map_err(|_| ContractViolation::invalid(field, "must be a decimal number"))?;
    if value.abs() > Decimal::from(limit_degrees) {
        return Err(ContractViolation::OutOfRange {
            field,
            min: -limit_degrees,
            max: limit_degrees,
        });
    }
    (value * Decimal::from(MICRO_DEGREES_PER_DEGREE))
        .to_i64()
        .map(Coordinate::from_micro_degrees)
        .ok_or(ContractViolation::invalid(field, "must be a decimal number"))
}

/// Pure payload construction; never touches the network or a signer.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    target: LedgerTarget,
}

impl TransactionBuilder {
    pub fn new(target: LedgerTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &LedgerTarget {
        &self.target
    }

    pub fn build_add_evidence(&self, form: &RecordForm) -> Result<Payload, ContractViolation> {
        self.build_add_record(RecordKind::Evidence, form)
    }

    pub fn build_add_report(&self, form: &RecordForm) -> Result<Payload, ContractViolation> {
        self.build_add_record(RecordKind::Report, form)
    }

    pub fn build_add_record(
        &self,
        kind: RecordKind,
        form: &RecordForm,
    ) -> Result<Payload, ContractViolation> {
        let input = validate_record_form(form)?;
        let entrypoint = Entrypoint::add_record(kind);
        self.finish(
            entrypoint,
            vec![
                self.target.state_arg(true),
                CallArg::Pure(PureArg::U64(input.case_no)),
                CallArg::Pure(PureArg::U64(input.fir_no)),
                CallArg::Pure(PureArg::Bytes(input.ipfs_hash)),
                CallArg::Pure(PureArg::Bytes(input.content)),
                CallArg::Pure(PureArg::Bool(input.public_access)),
                CallArg::Pure(PureArg::Address(input.head)),
                CallArg::Pure(PureArg::U64(input.latitude.to_wire())),
                CallArg::Pure(PureArg::U64(input.longitude.to_wire())),
            ],
            Some(self.target.gas_budget),
        )
    }

    pub fn build_change_role(
        &self,
        role: RoleKind,
        new_address: &str,
    ) -> Result<Payload, ContractViolation> {
        let address = AccountAddress::parse(field_names::NEW_ADDRESS, new_address)?;
        self.finish(
            Entrypoint::change_role(role),
            vec![
                self.target.state_arg(true),
                CallArg::Pure(PureArg::Address(address)),
            ],
            Some(self.target.gas_budget),
        )
    }

    /// Read-only `get_report` call for inspection; carries no gas budget.
    pub fn build_get_report(&self, report_id: u64) -> Result<Payload, ContractViolation> {
        self.finish(
            Entrypoint::GetReport,
            vec![
                self.target.state_arg(false),
                CallArg::Pure(PureArg::U64(report_id)),
            ],
            None,
        )
    }

    fn finish(
        &self,
        entrypoint: Entrypoint,
        arguments: Vec<CallArg>,
        gas_budget: Option<u64>,
    ) -> Result<Payload, ContractViolation> {
        let p = Payload {
            entrypoint,
            target: self.target.target(entrypoint),
            arguments,
            gas_budget,
        };
        p.validate()?;
        Ok(p)
    }
}
