#![forbid(unsafe_code)]

use crate::ledger::{AccountAddress, RecordKind};
use crate::{EpochSeconds, LedgerError};

pub const MICRO_DEGREES_PER_DEGREE: i64 = 1_000_000;
pub const COORDINATE_FRACTION_DIGITS: u32 = 6;

/// Byte-sequence field as read from the ledger.
///
/// `Raw` keeps the stored bytes untouched; `Utf8` is produced only when the
/// caller asked for decode-on-read. Both expose the original bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordText {
    Raw(Vec<u8>),
    Utf8(String),
}

impl RecordText {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Raw(b) => b,
            Self::Utf8(s) => s.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Raw(b) => b,
            Self::Utf8(s) => s.into_bytes(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Raw(b) => std::str::from_utf8(b).ok(),
            Self::Utf8(s) => Some(s),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessFlag {
    Public,
    Restricted,
}

impl AccessFlag {
    pub const fn from_bool(public: bool) -> Self {
        if public {
            Self::Public
        } else {
            Self::Restricted
        }
    }

    pub const fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// Signed fixed-point degrees with six fractional digits.
///
/// The contract slot is a `u64`; the value travels as the two's-complement
/// bit pattern of the micro-degree count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate(i64);

impl Coordinate {
    pub const fn from_micro_degrees(micro: i64) -> Self {
        Self(micro)
    }

    pub const fn micro_degrees(self) -> i64 {
        self.0
    }

    pub const fn to_wire(self) -> u64 {
        self.0 as u64
    }

    pub const fn from_wire(bits: u64) -> Self {
        Self(bits as i64)
    }

    /// Shortest decimal rendering, e.g. `12.9`, `-0.000001`, `77`.
    pub fn to_decimal_string(self) -> String {
        let abs = self.0.unsigned_abs();
        let scale = MICRO_DEGREES_PER_DEGREE as u64;
        let whole = abs / scale;
        let frac = abs % scale;
        let sign = if self.0 < 0 { "-" } else { "" };
        if frac == 0 {
            return format!("{sign}{whole}");
        }
        let digits = format!("{frac:06}");
        format!("{sign}{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// Field set shared by evidence and report entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBody {
    pub case_no: u64,
    pub fir_no: u64,
    pub ipfs_hash: RecordText,
    pub content: RecordText,
    pub access: AccessFlag,
    pub head: AccountAddress,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    pub created_at: EpochSeconds,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceRecord {
    pub evidence_id: u64,
    pub body: RecordBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub report_id: u64,
    pub body: RecordBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerRecord {
    Evidence(EvidenceRecord),
    Report(ReportRecord),
}

impl LedgerRecord {
    pub fn new(kind: RecordKind, id: u64, body: RecordBody) -> Self {
        match kind {
            RecordKind::Evidence => Self::Evidence(EvidenceRecord {
                evidence_id: id,
                body,
            }),
            RecordKind::Report => Self::Report(ReportRecord {
                report_id: id,
                body,
            }),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Evidence(_) => RecordKind::Evidence,
            Self::Report(_) => RecordKind::Report,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Self::Evidence(r) => r.evidence_id,
            Self::Report(r) => r.report_id,
        }
    }

    pub fn body(&self) -> &RecordBody {
        match self {
            Self::Evidence(r) => &r.body,
            Self::Report(r) => &r.body,
        }
    }
}

/// Result of a keyed lookup. A miss is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(LedgerRecord),
    NotFound { kind: RecordKind, id: u64 },
}

impl LookupOutcome {
    pub fn found(self) -> Option<LedgerRecord> {
        match self {
            Self::Found(r) => Some(r),
            Self::NotFound { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn into_result(self) -> Result<LedgerRecord, LedgerError> {
        match self {
            Self::Found(r) => Ok(r),
            Self::NotFound { kind, id } => Err(LedgerError::NotFound { kind, id }),
        }
    }
}
