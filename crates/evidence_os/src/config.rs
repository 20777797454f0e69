#![forbid(unsafe_code)]

use std::env;

use evidence_contracts::ledger::ObjectId;
use evidence_contracts::payload::DEFAULT_GAS_BUDGET;
use evidence_contracts::{ContractViolation, Validate};
use evidence_engines::record_codec::{DecodeOptions, TextPolicy};

pub const TESTNET_RPC_URL: &str = "https://fullnode.testnet.sui.io:443";
pub const TESTNET_PACKAGE_ID: &str =
    "0x54419cdac955854ee74e49e1dd23ace8ffd736e1440c3dfed0e99166665123d8";
pub const TESTNET_SYSTEM_STATE_ID: &str =
    "0xf44820d3eb6dfe52e563b70861083fadee7f6d9bd3be630ab40297ff953a9a35";

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub package: ObjectId,
    pub state_id: ObjectId,
    /// Known shared version of the state object. When absent it is read
    /// from the object's owner at connect time.
    pub state_initial_shared_version: Option<u64>,
    pub gas_budget: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub text_policy: TextPolicy,
}

impl LedgerConfig {
    pub fn testnet_v1() -> Result<Self, ContractViolation> {
        let c = Self {
            rpc_url: TESTNET_RPC_URL.to_string(),
            package: ObjectId::parse("ledger_config.package", TESTNET_PACKAGE_ID)?,
            state_id: ObjectId::parse("ledger_config.state_id", TESTNET_SYSTEM_STATE_ID)?,
            state_initial_shared_version: None,
            gas_budget: DEFAULT_GAS_BUDGET,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            text_policy: TextPolicy::Raw,
        };
        c.validate()?;
        Ok(c)
    }

    /// Testnet defaults overlaid with `EVIDENCE_LEDGER_*` variables.
    /// Identifiers and the URL must be well-formed when set; numeric
    /// tunables outside their range fall back to defaults.
    pub fn from_env() -> Result<Self, ContractViolation> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ContractViolation> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut c = Self::testnet_v1()?;
        if let Some(url) = var("EVIDENCE_LEDGER_RPC_URL") {
            c.rpc_url = url;
        }
        if let Some(raw) = var("EVIDENCE_LEDGER_PACKAGE_ID") {
            c.package = ObjectId::parse("EVIDENCE_LEDGER_PACKAGE_ID", &raw)?;
        }
        if let Some(raw) = var("EVIDENCE_LEDGER_SYSTEM_STATE_ID") {
            c.state_id = ObjectId::parse("EVIDENCE_LEDGER_SYSTEM_STATE_ID", &raw)?;
        }
        c.state_initial_shared_version = var("EVIDENCE_LEDGER_STATE_INITIAL_VERSION")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0);
        c.gas_budget = var("EVIDENCE_LEDGER_GAS_BUDGET")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| (1_000..=50_000_000_000).contains(v))
            .unwrap_or(DEFAULT_GAS_BUDGET);
        c.connect_timeout_ms = var("EVIDENCE_LEDGER_CONNECT_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| (100..=60_000).contains(v))
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS);
        c.request_timeout_ms = var("EVIDENCE_LEDGER_REQUEST_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| (100..=120_000).contains(v))
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        c.text_policy = match var("EVIDENCE_LEDGER_TEXT_POLICY").as_deref() {
            Some("utf8") => TextPolicy::Utf8,
            _ => TextPolicy::Raw,
        };
        c.validate()?;
        Ok(c)
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            text: self.text_policy,
        }
    }
}

impl Validate for LedgerConfig {
    fn validate(&self) -> Result<(), ContractViolation> {
        let url = url::Url::parse(&self.rpc_url).map_err(|_| {
            ContractViolation::invalid("ledger_config.rpc_url", "must be an absolute url")
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ContractViolation::invalid(
                "ledger_config.rpc_url",
                "must be an http(s) url with a host",
            ));
        }
        if self.gas_budget == 0 {
            return Err(ContractViolation::invalid(
                "ledger_config.gas_budget",
                "must be > 0",
            ));
        }
        Ok(())
    }
}
