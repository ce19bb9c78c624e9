// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and the typed configuration
//! loaded from them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RPC_URL` | Settlement-layer JSON-RPC endpoint | `https://sepolia.base.org` |
//! | `RELAY_ADDRESS` | MessageRelay contract (enables the sponsored path) | Optional |
//! | `ENTRYPOINT_ADDRESS` | EntryPoint contract for batch submission | Optional |
//! | `FACTORY_ADDRESS` | SimpleAccountFactory for counterfactual accounts | Optional |
//! | `PAYMASTER_ADDRESS` | Default fee sponsor for queued operations | Optional |
//! | `REGISTRY_ADDRESS` | AgentIndex registry contract | Optional |
//! | `INDEX_URL` | External agent-index (subgraph) endpoint | Optional |
//! | `RELAY_PRIVATE_KEY` | Server signing key (funds sponsored submissions) | Required for sponsored path |
//! | `SETTLEMENT_TIMEOUT_SECS` | Receipt-wait bound per transaction | `90` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

/// Settlement-layer RPC endpoint.
pub const RPC_URL_ENV: &str = "RPC_URL";
/// MessageRelay contract address. When set, messages go through the
/// sponsored path; when absent, callers pay their own fees.
pub const RELAY_ADDRESS_ENV: &str = "RELAY_ADDRESS";
/// EntryPoint contract address for `handleOps` batch submission.
pub const ENTRYPOINT_ADDRESS_ENV: &str = "ENTRYPOINT_ADDRESS";
/// SimpleAccountFactory contract address.
pub const FACTORY_ADDRESS_ENV: &str = "FACTORY_ADDRESS";
/// Default paymaster stamped onto queued operations without a sponsor.
pub const PAYMASTER_ADDRESS_ENV: &str = "PAYMASTER_ADDRESS";
/// On-chain agent registry, used as the index fallback scan target.
pub const REGISTRY_ADDRESS_ENV: &str = "REGISTRY_ADDRESS";
/// External agent-index (subgraph) GraphQL endpoint.
pub const INDEX_URL_ENV: &str = "INDEX_URL";
/// Hex private key for the server's funded identity.
pub const RELAY_PRIVATE_KEY_ENV: &str = "RELAY_PRIVATE_KEY";
/// Upper bound, in seconds, on any single receipt wait.
pub const SETTLEMENT_TIMEOUT_ENV: &str = "SETTLEMENT_TIMEOUT_SECS";

const DEFAULT_RPC_URL: &str = "https://sepolia.base.org";
const DEFAULT_SETTLEMENT_TIMEOUT_SECS: u64 = 90;

/// Typed runtime configuration, loaded once at startup and shared through
/// [`crate::state::AppState`].
#[derive(Clone)]
pub struct RelayConfig {
    pub rpc_url: String,
    pub relay_address: Option<Address>,
    pub entrypoint_address: Option<Address>,
    pub factory_address: Option<Address>,
    pub paymaster_address: Option<Address>,
    pub registry_address: Option<Address>,
    pub index_url: Option<String>,
    pub server_signer: Option<PrivateKeySigner>,
    pub settlement_timeout: Duration,
}

/// Configuration loading failure. Surfaced at startup only.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid address in {var}: {reason}")]
    InvalidAddress { var: &'static str, reason: String },

    #[error("invalid private key in {0}")]
    InvalidServerKey(&'static str),
}

impl RelayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let rpc_url = env::var(RPC_URL_ENV).unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());

        let server_signer = match env::var(RELAY_PRIVATE_KEY_ENV) {
            Ok(key) => Some(
                PrivateKeySigner::from_str(key.trim())
                    .map_err(|_| ConfigError::InvalidServerKey(RELAY_PRIVATE_KEY_ENV))?,
            ),
            Err(_) => None,
        };

        let settlement_timeout = env::var(SETTLEMENT_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_SETTLEMENT_TIMEOUT_SECS));

        Ok(Self {
            rpc_url,
            relay_address: optional_address(RELAY_ADDRESS_ENV)?,
            entrypoint_address: optional_address(ENTRYPOINT_ADDRESS_ENV)?,
            factory_address: optional_address(FACTORY_ADDRESS_ENV)?,
            paymaster_address: optional_address(PAYMASTER_ADDRESS_ENV)?,
            registry_address: optional_address(REGISTRY_ADDRESS_ENV)?,
            index_url: env::var(INDEX_URL_ENV).ok().filter(|u| !u.is_empty()),
            server_signer,
            settlement_timeout,
        })
    }

    /// Whether the sponsored submission path is available.
    pub fn sponsored_enabled(&self) -> bool {
        self.relay_address.is_some() && self.server_signer.is_some()
    }
}

fn optional_address(var: &'static str) -> Result<Option<Address>, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => {
            let addr = Address::from_str(raw.trim()).map_err(|e| ConfigError::InvalidAddress {
                var,
                reason: e.to_string(),
            })?;
            Ok(Some(addr))
        }
        _ => Ok(None),
    }
}
