// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Message submission strategies.
//!
//! Two interchangeable paths settle a signed message. The sponsored path
//! submits from the server's funded identity through the relay contract,
//! embedding the caller's address, payload, nonce, and signature as call
//! arguments; the contract verifies the signature before acting, so the
//! caller never needs funds and never sees the server key. The direct path
//! is the fallback when no relay is configured: the caller's own identity
//! signs and pays for a plain transaction carrying the payload.
//!
//! Both paths return the same [`SubmitOutcome`] so response formatting is
//! strategy-agnostic.

use std::sync::Arc;

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, U256},
    providers::Provider,
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
};

use crate::error::RelayError;
use crate::secrets::Identity;

use super::client::{classify_send_error, SettlementClient};
use super::contracts::IMessageRelay;
use super::fees::{with_escalation, FeeQuote, FeeStrategy};
use super::operation::SignedOperation;

/// Which strategy settled the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPath {
    Sponsored,
    Direct,
}

impl SubmitPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitPath::Sponsored => "sponsored",
            SubmitPath::Direct => "direct",
        }
    }
}

/// Uniform settlement result for both paths.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    /// Total fee consumed, in wei.
    pub fee_wei: u128,
    pub path: SubmitPath,
}

/// Sponsored-path configuration: the relay contract and the server identity
/// that funds submissions.
#[derive(Clone)]
pub struct RelayEndpoint {
    pub address: Address,
    pub server_signer: PrivateKeySigner,
}

pub struct RelaySubmitter {
    client: Arc<SettlementClient>,
    fees: FeeStrategy,
    relay: Option<RelayEndpoint>,
}

impl RelaySubmitter {
    pub fn new(
        client: Arc<SettlementClient>,
        fees: FeeStrategy,
        relay: Option<RelayEndpoint>,
    ) -> Self {
        Self {
            client,
            fees,
            relay,
        }
    }

    pub fn sponsored_configured(&self) -> bool {
        self.relay.is_some()
    }

    /// Settle a message from `identity` via whichever path is configured.
    /// `account` is the sender recorded on the wire; on the direct path it
    /// is the identity's own address.
    pub async fn submit_message(
        &self,
        identity: &Identity,
        account: Address,
        recipient: Address,
        payload: Bytes,
    ) -> Result<SubmitOutcome, RelayError> {
        match &self.relay {
            Some(endpoint) => {
                self.submit_sponsored(identity, account, recipient, payload, endpoint)
                    .await
            }
            None => self.submit_direct(identity, recipient, payload).await,
        }
    }

    async fn submit_sponsored(
        &self,
        identity: &Identity,
        account: Address,
        recipient: Address,
        payload: Bytes,
        endpoint: &RelayEndpoint,
    ) -> Result<SubmitOutcome, RelayError> {
        // Relay nonces are tracked on the relay contract, independent of the
        // account's own transaction nonce. Read fresh, right before signing.
        let relay = IMessageRelay::new(endpoint.address, self.client.provider().clone());
        let nonce: U256 = relay
            .nonces(account)
            .call()
            .await
            .map_err(|e| RelayError::Rpc(format!("relay nonce query failed: {e}")))?;

        let nonce = u64::try_from(nonce)
            .map_err(|_| RelayError::Rpc(format!("relay nonce out of range: {nonce}")))?;
        let op = SignedOperation::build_and_sign(identity, account, recipient, payload, nonce, None)?;

        // Mirror the contract's verification locally before spending the
        // sponsor's funds on a doomed submission.
        op.verify(identity.address())?;

        let viable = self.fees.viable_fee().await;
        let escalated = self.fees.escalated_fee();
        with_escalation(viable, escalated, |quote| {
            self.relay_once(endpoint, &op, quote)
        })
        .await
    }

    async fn relay_once(
        &self,
        endpoint: &RelayEndpoint,
        op: &SignedOperation,
        quote: FeeQuote,
    ) -> Result<SubmitOutcome, RelayError> {
        let provider = self.client.wallet_provider(endpoint.server_signer.clone());
        let relay = IMessageRelay::new(endpoint.address, provider);

        let pending = relay
            .relayMessage(
                op.sender,
                op.target,
                op.payload.clone(),
                U256::from(op.nonce),
                op.signature.clone(),
            )
            .max_fee_per_gas(quote.max_fee_per_gas)
            .max_priority_fee_per_gas(quote.max_priority_fee_per_gas)
            .send()
            .await
            .map_err(|e| {
                let message = e.to_string();
                if message.to_lowercase().contains("revert") {
                    RelayError::SignatureInvalid
                } else {
                    classify_send_error(&message, true)
                }
            })?;

        let receipt = self.client.confirm(pending).await?;
        if !receipt.status() {
            // The relay's only revert path is rejecting the signature.
            return Err(RelayError::SignatureInvalid);
        }

        Ok(outcome(&receipt, SubmitPath::Sponsored))
    }

    async fn submit_direct(
        &self,
        identity: &Identity,
        recipient: Address,
        payload: Bytes,
    ) -> Result<SubmitOutcome, RelayError> {
        let viable = self.fees.viable_fee().await;
        let escalated = self.fees.escalated_fee();
        with_escalation(viable, escalated, |quote| {
            self.direct_once(identity, recipient, &payload, quote)
        })
        .await
    }

    async fn direct_once(
        &self,
        identity: &Identity,
        recipient: Address,
        payload: &Bytes,
        quote: FeeQuote,
    ) -> Result<SubmitOutcome, RelayError> {
        let provider = self.client.wallet_provider(identity.signer().clone());

        let tx = TransactionRequest::default()
            .with_to(recipient)
            .with_value(U256::ZERO)
            .with_input(payload.clone())
            .with_max_fee_per_gas(quote.max_fee_per_gas)
            .with_max_priority_fee_per_gas(quote.max_priority_fee_per_gas);

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| classify_send_error(&e.to_string(), false))?;

        let receipt = self.client.confirm(pending).await?;
        if !receipt.status() {
            return Err(RelayError::Rpc(format!(
                "direct transaction reverted (tx {})",
                receipt.transaction_hash
            )));
        }

        Ok(outcome(&receipt, SubmitPath::Direct))
    }
}

fn outcome(receipt: &TransactionReceipt, path: SubmitPath) -> SubmitOutcome {
    let gas_used = receipt.gas_used;
    SubmitOutcome {
        tx_hash: format!("{:?}", receipt.transaction_hash),
        block_number: receipt.block_number.unwrap_or(0),
        gas_used,
        fee_wei: (receipt.gas_used as u128).saturating_mul(receipt.effective_gas_price),
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> Arc<SettlementClient> {
        Arc::new(SettlementClient::connect("http://127.0.0.1:1", Duration::from_secs(1)).unwrap())
    }

    #[test]
    fn path_labels_are_stable() {
        assert_eq!(SubmitPath::Sponsored.as_str(), "sponsored");
        assert_eq!(SubmitPath::Direct.as_str(), "direct");
    }

    #[test]
    fn submitter_without_relay_uses_direct_path() {
        let client = client();
        let fees = FeeStrategy::new(Arc::clone(&client));
        let submitter = RelaySubmitter::new(client, fees, None);
        assert!(!submitter.sponsored_configured());
    }

    #[test]
    fn submitter_with_relay_uses_sponsored_path() {
        let client = client();
        let fees = FeeStrategy::new(Arc::clone(&client));
        let endpoint = RelayEndpoint {
            address: Address::repeat_byte(0x42),
            server_signer: PrivateKeySigner::from_slice(&[0x11; 32]).unwrap(),
        };
        let submitter = RelaySubmitter::new(client, fees, Some(endpoint));
        assert!(submitter.sponsored_configured());
    }
}
