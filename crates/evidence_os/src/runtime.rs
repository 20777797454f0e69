#![forbid(unsafe_code)]

use std::sync::Arc;

use evidence_contracts::LedgerError;
use evidence_engines::tx_builder::{LedgerTarget, TransactionBuilder};
use evidence_storage::endpoint::LedgerEndpoint;

use crate::actions::LedgerActions;
use crate::cancellation::CancellationToken;
use crate::config::LedgerConfig;
use crate::ledger_client::LedgerClient;
use crate::rpc::JsonRpcEndpoint;

/// Read client and write actions bound to one deployed contract.
#[derive(Debug)]
pub struct EvidenceLedgerRuntime<E> {
    client: LedgerClient<Arc<E>>,
    actions: LedgerActions<Arc<E>>,
}

impl EvidenceLedgerRuntime<JsonRpcEndpoint> {
    pub fn connect(config: &LedgerConfig, cancel: &CancellationToken) -> Result<Self, LedgerError> {
        Self::with_endpoint(JsonRpcEndpoint::new(config), config, cancel)
    }
}

impl<E: LedgerEndpoint> EvidenceLedgerRuntime<E> {
    /// Binds `endpoint` to the configured contract. The state object's
    /// shared version is read from the ledger unless the config pins it.
    pub fn with_endpoint(
        endpoint: E,
        config: &LedgerConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, LedgerError> {
        let endpoint = Arc::new(endpoint);
        let client = LedgerClient::new(
            Arc::clone(&endpoint),
            config.package,
            config.state_id,
            config.decode_options(),
        );
        let initial_shared_version = match config.state_initial_shared_version {
            Some(v) => v,
            None => client.resolve_state_object(cancel)?.initial_shared_version,
        };
        let mut target = LedgerTarget::v1(config.package, config.state_id, initial_shared_version)?;
        target.gas_budget = config.gas_budget;
        tracing::info!(
            target: "evidence_os::runtime",
            rpc_url = %config.rpc_url,
            package = %config.package,
            state_id = %config.state_id,
            initial_shared_version,
            "ledger runtime ready"
        );
        Ok(Self {
            client,
            actions: LedgerActions::new(endpoint, TransactionBuilder::new(target)),
        })
    }

    pub fn client(&self) -> &LedgerClient<Arc<E>> {
        &self.client
    }

    pub fn actions(&self) -> &LedgerActions<Arc<E>> {
        &self.actions
    }
}
