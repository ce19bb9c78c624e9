// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state, built once at startup from the loaded
//! configuration and cloned into each request handler.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::relay::accounts::FactoryBackend;
use crate::relay::submitter::RelayEndpoint;
use crate::relay::{
    AccountDirectory, BatchSubmitter, BundlerQueue, ExistenceIndex, FeeStrategy, RelaySubmitter,
    SettlementClient,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub client: Arc<SettlementClient>,
    pub accounts: Arc<AccountDirectory<FactoryBackend>>,
    pub queue: Arc<BundlerQueue>,
    /// Present only when an EntryPoint and a server key are configured.
    pub batch_submitter: Option<Arc<BatchSubmitter>>,
    pub submitter: Arc<RelaySubmitter>,
    pub index: Arc<ExistenceIndex>,
}

impl AppState {
    /// Wire every component from the configuration. Fails only on an
    /// unparsable RPC URL; network reachability is checked lazily.
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let client = Arc::new(SettlementClient::connect(
            &config.rpc_url,
            config.settlement_timeout,
        )?);
        let fees = FeeStrategy::new(Arc::clone(&client));

        let accounts = Arc::new(AccountDirectory::new(FactoryBackend::new(
            Arc::clone(&client),
            config.factory_address,
            config.server_signer.clone(),
        )));

        let queue = Arc::new(BundlerQueue::new(config.paymaster_address));

        let batch_submitter = match (config.entrypoint_address, config.server_signer.clone()) {
            (Some(entrypoint), Some(signer)) => Some(Arc::new(BatchSubmitter::new(
                entrypoint,
                Arc::clone(&client),
                fees.clone(),
                signer,
            ))),
            _ => None,
        };

        let relay = match (config.relay_address, config.server_signer.clone()) {
            (Some(address), Some(server_signer)) => Some(RelayEndpoint {
                address,
                server_signer,
            }),
            _ => None,
        };
        let submitter = Arc::new(RelaySubmitter::new(Arc::clone(&client), fees, relay));

        let index = Arc::new(ExistenceIndex::new(
            config.index_url.clone(),
            config.registry_address,
            Arc::clone(&client),
            config.settlement_timeout,
        )?);

        Ok(Self {
            config: Arc::new(config),
            client,
            accounts,
            queue,
            batch_submitter,
            submitter,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use alloy::primitives::Address;
    use alloy::signers::local::PrivateKeySigner;

    use super::*;

    fn config() -> RelayConfig {
        RelayConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            relay_address: None,
            entrypoint_address: None,
            factory_address: None,
            paymaster_address: None,
            registry_address: None,
            index_url: None,
            server_signer: None,
            settlement_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn bare_config_builds_without_batch_or_sponsor() {
        let state = AppState::new(config()).unwrap();
        assert!(state.batch_submitter.is_none());
        assert!(!state.submitter.sponsored_configured());
    }

    #[test]
    fn full_config_enables_batch_and_sponsor() {
        let signer = PrivateKeySigner::from_str(
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa11",
        )
        .unwrap();

        let mut cfg = config();
        cfg.relay_address = Some(Address::ZERO);
        cfg.entrypoint_address = Some(Address::ZERO);
        cfg.server_signer = Some(signer);

        let state = AppState::new(cfg).unwrap();
        assert!(state.batch_submitter.is_some());
        assert!(state.submitter.sponsored_configured());
    }

    #[test]
    fn bad_rpc_url_is_rejected_at_build() {
        let mut cfg = config();
        cfg.rpc_url = "not a url".to_string();
        assert!(AppState::new(cfg).is_err());
    }
}
