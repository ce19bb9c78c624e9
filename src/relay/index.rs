// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Agent existence checks.
//!
//! Primary strategy: paginated query against the external agent index
//! (subgraph), matching the address case-insensitively and only counting
//! records whose active flag is set. On any query failure the check falls
//! back to a bounded linear scan of the on-chain registry, comparing both
//! the wallet and admin address fields.
//!
//! Both strategies stop at a fixed record ceiling, so a registry larger
//! than the ceiling can produce a false negative. That is a documented
//! approximation, not a bug; the cost of an unbounded scan is not worth it
//! for a registration gate.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use serde::Deserialize;

use crate::error::RelayError;

use super::client::SettlementClient;
use super::contracts::IAgentIndex;

/// Records fetched per index page.
const INDEX_PAGE_SIZE: usize = 100;
/// Ceiling on total index records scanned per lookup.
const INDEX_SCAN_CEILING: usize = 10_000;
/// Records fetched per on-chain registry page.
const REGISTRY_PAGE_SIZE: usize = 10;
/// Ceiling on registry records scanned in the fallback.
const REGISTRY_SCAN_CEILING: usize = 1_000;

const AGENTS_QUERY: &str = r#"
query ($first: Int!, $skip: Int!) {
  agents(first: $first, skip: $skip, orderBy: name, orderDirection: asc) {
    id
    address
    adminAddress
    isActive
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<AgentsData>,
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AgentsData {
    agents: Vec<IndexRecord>,
}

/// One record from the external index.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub address: String,
    #[serde(rename = "adminAddress")]
    pub admin_address: Option<String>,
    #[serde(rename = "isActive")]
    pub active: bool,
}

impl IndexRecord {
    /// Case-insensitive address match, gated on the active flag. Inactive
    /// records never match, even when the address does.
    fn matches(&self, target: &str, include_admin: bool) -> bool {
        if !self.active {
            return false;
        }
        if self.address.eq_ignore_ascii_case(target) {
            return true;
        }
        include_admin
            && self
                .admin_address
                .as_deref()
                .is_some_and(|admin| admin.eq_ignore_ascii_case(target))
    }
}

pub struct ExistenceIndex {
    http: reqwest::Client,
    index_url: Option<String>,
    registry: Option<Address>,
    client: Arc<SettlementClient>,
}

impl ExistenceIndex {
    pub fn new(
        index_url: Option<String>,
        registry: Option<Address>,
        client: Arc<SettlementClient>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        // Every lookup sits on the message hot path; a stalled index server
        // must surface as a query error so the registry fallback can run.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Rpc(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            index_url,
            registry,
            client,
        })
    }

    /// Whether `address` is registered as an active agent.
    ///
    /// Best-effort: with neither an index nor a registry configured the
    /// gate is disabled and every address passes.
    pub async fn exists(&self, address: Address) -> bool {
        if self.index_url.is_none() && self.registry.is_none() {
            return true;
        }

        // Registry-only deployments go straight to the on-chain scan; the
        // index path is not an error for them.
        let Some(url) = self.index_url.as_deref() else {
            return self.scan_registry(address).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "registry scan failed");
                false
            });
        };

        match self.query_index(url, address).await {
            Ok(found) => found,
            Err(e) => {
                // Logged, never surfaced: the fallback takes over.
                tracing::warn!(error = %e, "agent index unavailable, falling back to on-chain scan");
                self.scan_registry(address).await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "registry fallback scan failed");
                    false
                })
            }
        }
    }

    async fn query_index(&self, url: &str, address: Address) -> Result<bool, RelayError> {
        let target = address.to_string();

        let mut skip = 0usize;
        while skip < INDEX_SCAN_CEILING {
            let body = serde_json::json!({
                "query": AGENTS_QUERY,
                "variables": { "first": INDEX_PAGE_SIZE, "skip": skip },
            });

            let response: GraphQlResponse = self
                .http
                .post(url)
                .json(&body)
                .send()
                .await
                .map_err(|e| RelayError::IndexUnavailable(e.to_string()))?
                .error_for_status()
                .map_err(|e| RelayError::IndexUnavailable(e.to_string()))?
                .json()
                .await
                .map_err(|e| RelayError::IndexUnavailable(e.to_string()))?;

            if let Some(errors) = response.errors {
                return Err(RelayError::IndexUnavailable(errors.to_string()));
            }
            let page = response
                .data
                .ok_or_else(|| RelayError::IndexUnavailable("empty response".into()))?
                .agents;

            if page.iter().any(|record| record.matches(&target, false)) {
                return Ok(true);
            }
            if page.len() < INDEX_PAGE_SIZE {
                return Ok(false);
            }
            skip += INDEX_PAGE_SIZE;
        }

        tracing::debug!(%address, "index scan ceiling reached without a match");
        Ok(false)
    }

    /// Linear on-chain scan, bounded to the first [`REGISTRY_SCAN_CEILING`]
    /// records.
    async fn scan_registry(&self, address: Address) -> Result<bool, RelayError> {
        let Some(registry) = self.registry else {
            return Ok(false);
        };
        let contract = IAgentIndex::new(registry, self.client.provider().clone());

        let mut offset = 0usize;
        while offset < REGISTRY_SCAN_CEILING {
            let page = contract
                .searchPaginated(
                    String::new(),
                    alloy::primitives::U256::from(offset),
                    alloy::primitives::U256::from(REGISTRY_PAGE_SIZE),
                )
                .call()
                .await
                .map_err(|e| RelayError::Rpc(format!("registry scan failed: {e}")))?;

            for agent in &page.agents {
                if agent.active && (agent.wallet == address || agent.admin == address) {
                    return Ok(true);
                }
            }

            if !page.hasMore || page.agents.len() < REGISTRY_PAGE_SIZE {
                return Ok(false);
            }
            offset += REGISTRY_PAGE_SIZE;
        }

        Ok(false)
    }
}
