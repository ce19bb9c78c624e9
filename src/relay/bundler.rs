// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pending-operation queue and batch settlement.
//!
//! Many request handlers append; one caller at a time drains. `submit_all`
//! swaps the whole pending set out under the lock and releases it before
//! touching the network, so a slow settlement never blocks new enqueues and
//! operations enqueued mid-settlement are never pulled into the in-flight
//! batch.
//!
//! On a failed batch the drained operations are returned to the caller for
//! resubmission. They are deliberately not merged back into the pending set:
//! ops enqueued by other callers in the interim must not be silently
//! reordered behind a failed batch.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use tokio::sync::Mutex;

use crate::error::RelayError;

use super::client::{classify_send_error, SettlementClient};
use super::contracts::IEntryPoint;
use super::fees::{with_escalation, FeeQuote, FeeStrategy};
use super::operation::SignedOperation;

/// Fixed computation ceiling per batch, generous so complex batches are not
/// starved.
pub const BATCH_GAS_LIMIT: u64 = 5_000_000;

/// Fee-ceiling multiplier over the viable quote for batch submission.
pub const BATCH_FEE_FACTOR: u128 = 3;

/// Shared pending set of signed operations awaiting batch settlement.
pub struct BundlerQueue {
    pending: Mutex<Vec<SignedOperation>>,
    default_sponsor: Option<Address>,
}

impl BundlerQueue {
    pub fn new(default_sponsor: Option<Address>) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            default_sponsor,
        }
    }

    /// Append operations to the pending set. Operations without a sponsor
    /// get the configured default paymaster. Returns (newly queued, total
    /// now pending).
    pub async fn enqueue(&self, mut ops: Vec<SignedOperation>) -> (usize, usize) {
        if let Some(sponsor) = self.default_sponsor {
            for op in &mut ops {
                op.sponsor.get_or_insert(sponsor);
            }
        }

        let mut pending = self.pending.lock().await;
        let queued = ops.len();
        pending.extend(ops);
        (queued, pending.len())
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Atomically swap out the entire pending set, leaving it empty.
    /// Fails fast with `EmptyQueue` before any network activity.
    pub async fn drain_pending(&self) -> Result<Vec<SignedOperation>, RelayError> {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return Err(RelayError::EmptyQueue);
        }
        Ok(std::mem::take(&mut *pending))
    }
}

/// Result of a settled batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub tx_hash: String,
    pub block_number: u64,
    pub ops_submitted: usize,
    pub gas_used: u64,
}

/// A failed batch: the error plus the drained operations, handed back to
/// the caller instead of being requeued.
#[derive(Debug)]
pub struct BatchFailure {
    pub error: RelayError,
    pub dropped_ops: Vec<SignedOperation>,
}

/// Submits drained batches to the EntryPoint from the server's funded
/// identity.
pub struct BatchSubmitter {
    entrypoint: Address,
    client: Arc<SettlementClient>,
    fees: FeeStrategy,
    server_signer: PrivateKeySigner,
}

impl BatchSubmitter {
    pub fn new(
        entrypoint: Address,
        client: Arc<SettlementClient>,
        fees: FeeStrategy,
        server_signer: PrivateKeySigner,
    ) -> Self {
        Self {
            entrypoint,
            client,
            fees,
            server_signer,
        }
    }

    /// Drain the queue and settle everything in one `handleOps` call, with
    /// one escalated retry on a fee rejection.
    pub async fn submit_all(&self, queue: &BundlerQueue) -> Result<BatchResult, BatchFailure> {
        let ops = queue.drain_pending().await.map_err(|error| BatchFailure {
            error,
            dropped_ops: Vec::new(),
        })?;

        tracing::info!(ops = ops.len(), "submitting batch to entry point");

        let viable = self.fees.viable_fee().await.scaled(BATCH_FEE_FACTOR);
        let escalated = self.fees.escalated_fee().scaled(BATCH_FEE_FACTOR);

        match with_escalation(viable, escalated, |quote| self.submit_batch(&ops, quote)).await {
            Ok(result) => Ok(result),
            Err(error) => {
                tracing::error!(error = %error, dropped = ops.len(), "batch submission failed");
                Err(BatchFailure {
                    error,
                    dropped_ops: ops,
                })
            }
        }
    }

    async fn submit_batch(
        &self,
        ops: &[SignedOperation],
        quote: FeeQuote,
    ) -> Result<BatchResult, RelayError> {
        let provider = self.client.wallet_provider(self.server_signer.clone());
        let entrypoint = IEntryPoint::new(self.entrypoint, provider);

        let packed: Vec<IEntryPoint::PackedOperation> = ops.iter().map(pack_operation).collect();
        let ops_submitted = packed.len();

        let pending = entrypoint
            .handleOps(packed)
            .gas(BATCH_GAS_LIMIT)
            .max_fee_per_gas(quote.max_fee_per_gas)
            .max_priority_fee_per_gas(quote.max_priority_fee_per_gas)
            .send()
            .await
            .map_err(|e| classify_send_error(&e.to_string(), true))?;

        let receipt = self.client.confirm(pending).await?;
        let tx_hash = format!("{:?}", receipt.transaction_hash);

        if !receipt.status() {
            // Included on-chain but reverted; no automatic retry.
            return Err(RelayError::BatchReverted { tx_hash });
        }

        Ok(BatchResult {
            tx_hash,
            block_number: receipt.block_number.unwrap_or(0),
            ops_submitted,
            gas_used: receipt.gas_used,
        })
    }
}

/// Encode an operation into the EntryPoint's wire layout. Field order is
/// wire-critical.
fn pack_operation(op: &SignedOperation) -> IEntryPoint::PackedOperation {
    IEntryPoint::PackedOperation {
        sender: op.sender,
        target: op.target,
        callData: op.payload.clone(),
        nonce: U256::from(op.nonce),
        signature: op.signature.clone(),
        paymaster: op.sponsor.unwrap_or(Address::ZERO),
    }
}
