#![forbid(unsafe_code)]

/// Input field names, in the order the builder validates them.
pub mod field_names {
    pub const CASE_NO: &str = "caseNo";
    pub const FIR_NO: &str = "firNo";
    pub const IPFS_HASH: &str = "ipfsHash";
    pub const CONTENT: &str = "content";
    pub const HEAD_ADDRESS: &str = "headAddress";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const NEW_ADDRESS: &str = "newAddress";
}

/// Raw form input for a new evidence or report entry. Every field is kept
/// exactly as typed; interpretation happens in the transaction builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordForm {
    pub case_no: String,
    pub fir_no: String,
    pub ipfs_hash: String,
    pub content: String,
    pub public_access: bool,
    pub head_address: String,
    pub latitude: String,
    pub longitude: String,
}

impl Default for RecordForm {
    fn default() -> Self {
        Self {
            case_no: String::new(),
            fir_no: String::new(),
            ipfs_hash: String::new(),
            content: String::new(),
            public_access: true,
            head_address: String::new(),
            latitude: String::new(),
            longitude: String::new(),
        }
    }
}
