// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Settlement-layer client.
//!
//! Thin wrapper over an alloy HTTP provider: base-fee reads, code-existence
//! checks, balance queries, and receipt waits with an enforced timeout. All
//! contract handles in the relay are built on providers obtained here.

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, U256},
    providers::{
        DynProvider, PendingTransactionBuilder, PendingTransactionError, Provider,
        ProviderBuilder, WatchTxError,
    },
    rpc::client::RpcClient,
    rpc::types::TransactionReceipt,
    signers::local::PrivateKeySigner,
    transports::http::Http,
};
use std::time::Duration;

use crate::error::RelayError;

/// Base fee assumed when the latest block carries none. 25 gwei.
const DEFAULT_BASE_FEE: u128 = 25_000_000_000;

pub struct SettlementClient {
    rpc_url: url::Url,
    http: reqwest::Client,
    provider: DynProvider,
    timeout: Duration,
}

impl SettlementClient {
    /// Create a client for the given RPC endpoint. Connection is lazy; this
    /// only fails on a malformed URL or an unbuildable HTTP client.
    ///
    /// Every RPC request rides the same HTTP client, so `timeout` bounds
    /// each outbound call, not just receipt waits.
    pub fn connect(rpc_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| RelayError::Rpc(format!("invalid RPC URL: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Rpc(format!("failed to build HTTP client: {e}")))?;

        let provider = ProviderBuilder::new()
            .connect_client(RpcClient::new(
                Http::with_client(http.clone(), url.clone()),
                false,
            ))
            .erased();

        Ok(Self {
            rpc_url: url,
            http,
            provider,
            timeout,
        })
    }

    /// Read-only provider.
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Provider carrying a signing wallet, for submission paths. Built per
    /// signer so the direct path can use the caller's own identity; shares
    /// the timeout-bearing HTTP client.
    pub fn wallet_provider(&self, signer: PrivateKeySigner) -> DynProvider {
        ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_client(RpcClient::new(
                Http::with_client(self.http.clone(), self.rpc_url.clone()),
                false,
            ))
            .erased()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current base fee from the latest block header.
    pub async fn base_fee(&self) -> Result<u128, RelayError> {
        let block = self
            .provider
            .get_block_by_number(alloy::eips::BlockNumberOrTag::Latest)
            .await
            .map_err(|e| RelayError::Rpc(format!("failed to get latest block: {e}")))?
            .ok_or_else(|| RelayError::Rpc("no latest block".to_string()))?;

        Ok(block
            .header
            .base_fee_per_gas
            .map(|f| f as u128)
            .unwrap_or(DEFAULT_BASE_FEE))
    }

    /// Whether code is deployed at `address`.
    pub async fn code_exists(&self, address: Address) -> Result<bool, RelayError> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| RelayError::Rpc(format!("code check failed: {e}")))?;
        Ok(!code.is_empty())
    }

    /// Native balance of `address`.
    pub async fn native_balance(&self, address: Address) -> Result<U256, RelayError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| RelayError::Rpc(format!("balance query failed: {e}")))
    }

    /// Wait for a submitted transaction's receipt, bounded by the configured
    /// timeout. A timed-out wait never blocks the process; it surfaces as
    /// [`RelayError::SettlementTimeout`].
    pub async fn confirm(
        &self,
        pending: PendingTransactionBuilder<Ethereum>,
    ) -> Result<TransactionReceipt, RelayError> {
        pending
            .with_timeout(Some(self.timeout))
            .get_receipt()
            .await
            .map_err(|e| match e {
                PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                    RelayError::SettlementTimeout
                }
                other => RelayError::Rpc(format!("receipt wait failed: {other}")),
            })
    }
}

/// Classify a submission-time RPC failure into the relay taxonomy.
///
/// The settlement layer reports fee and funding problems as message text,
/// not structured codes, so this matches on the phrasings the upstream node
/// implementations actually emit.
pub fn classify_send_error(message: &str, sponsor_pays: bool) -> RelayError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
        RelayError::InsufficientFunds {
            sponsor: sponsor_pays,
        }
    } else if lower.contains("max fee per gas less than block base fee")
        || lower.contains("fee cap")
        || lower.contains("underpriced")
    {
        RelayError::FeeTooLow
    } else {
        RelayError::Rpc(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_rejects_malformed_url() {
        assert!(SettlementClient::connect("not a url", Duration::from_secs(1)).is_err());
        assert!(SettlementClient::connect("https://sepolia.base.org", Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn classifies_insufficient_funds_per_payer() {
        let sender = classify_send_error("insufficient funds for gas * price + value", false);
        assert!(matches!(
            sender,
            RelayError::InsufficientFunds { sponsor: false }
        ));

        let sponsor = classify_send_error("Insufficient funds", true);
        assert!(matches!(
            sponsor,
            RelayError::InsufficientFunds { sponsor: true }
        ));
    }

    #[test]
    fn classifies_fee_rejections() {
        for msg in [
            "max fee per gas less than block base fee",
            "transaction underpriced",
            "fee cap less than block base fee",
        ] {
            assert!(matches!(classify_send_error(msg, false), RelayError::FeeTooLow));
        }
    }

    #[test]
    fn unknown_errors_stay_rpc() {
        assert!(matches!(
            classify_send_error("nonce too low", false),
            RelayError::Rpc(_)
        ));
    }

    #[tokio::test]
    async fn stalled_rpc_endpoint_cannot_hang_a_read() {
        // A server that accepts and never answers. The read must error out
        // within the configured bound instead of blocking the caller.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    held.push(socket);
                }
            }
        });

        let client = SettlementClient::connect(&url, Duration::from_millis(250)).unwrap();
        let read = tokio::time::timeout(Duration::from_secs(5), client.base_fee()).await;
        assert!(matches!(read, Ok(Err(RelayError::Rpc(_)))));
    }
}
