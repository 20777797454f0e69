#![forbid(unsafe_code)]

//! Display projection of decoded records.

use chrono::{DateTime, Utc};
use evidence_contracts::ledger::RecordKind;
use evidence_contracts::record::{LedgerRecord, RecordText};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordView {
    pub kind: RecordKind,
    pub id: String,
    pub case_no: String,
    pub fir_no: String,
    pub ipfs_hash: String,
    pub content: String,
    pub access: &'static str,
    pub head: String,
    pub latitude: String,
    pub longitude: String,
    pub created_at: String,
}

/// Text fields that are not valid UTF-8 are shown as `0x`-prefixed hex.
pub fn display_text(text: &RecordText) -> String {
    match text.as_text() {
        Some(s) => s.to_string(),
        None => {
            let mut out = String::with_capacity(2 + text.len() * 2);
            out.push_str("0x");
            for b in text.as_bytes() {
                out.push_str(&format!("{b:02x}"));
            }
            out
        }
    }
}

/// Seconds past the epoch beyond chrono's range fall back to the raw count.
pub fn display_timestamp(seconds: u64) -> String {
    i64::try_from(seconds)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| format!("{seconds}s since epoch"))
}

impl RecordView {
    pub fn from_record(record: &LedgerRecord) -> Self {
        let body = record.body();
        Self {
            kind: record.kind(),
            id: record.id().to_string(),
            case_no: body.case_no.to_string(),
            fir_no: body.fir_no.to_string(),
            ipfs_hash: display_text(&body.ipfs_hash),
            content: display_text(&body.content),
            access: if body.access.is_public() {
                "Public"
            } else {
                "Restricted"
            },
            head: body.head.to_hex_literal(),
            latitude: body.latitude.to_decimal_string(),
            longitude: body.longitude.to_decimal_string(),
            created_at: display_timestamp(body.created_at.0),
        }
    }
}
