// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for the REST API. All types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation. Successful responses carry `success: true`; failures are
//! rendered by [`crate::error::RelayError`] as `{success, error, code}`.
//!
//! [`WireOperation`] is the JSON form of a signed operation. Its field
//! order mirrors the settlement wire tuple `(sender, target, nonce,
//! signature, sponsor)` with the payload carried as hex call data.

use std::str::FromStr;

use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::RelayError;
use crate::relay::bundler::BatchResult;
use crate::relay::{SignedOperation, SubmitOutcome};

// =============================================================================
// Messaging
// =============================================================================

/// Request to send a message on-chain.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Recipient address.
    pub to: String,
    /// Message text, settled as the transaction payload.
    pub text: String,
    /// Caller secret: private key, mnemonic, or passphrase.
    pub auth: String,
}

/// Settlement details for a confirmed transaction.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionInfo {
    pub hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    /// Total fee consumed, in wei, as a decimal string.
    pub fee_wei: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SendMessageResponse {
    pub success: bool,
    pub from: String,
    pub to: String,
    pub text: String,
    /// Which strategy settled the message: `sponsored` or `direct`.
    pub path: String,
    pub transaction: TransactionInfo,
}

impl SendMessageResponse {
    pub fn from_outcome(outcome: SubmitOutcome, from: Address, to: Address, text: String) -> Self {
        Self {
            success: true,
            from: from.to_string(),
            to: to.to_string(),
            text,
            path: outcome.path.as_str().to_string(),
            transaction: TransactionInfo {
                hash: outcome.tx_hash,
                block_number: outcome.block_number,
                gas_used: outcome.gas_used,
                fee_wei: outcome.fee_wei.to_string(),
            },
        }
    }
}

// =============================================================================
// Bundler
// =============================================================================

/// JSON form of one signed operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WireOperation {
    /// Smart-account sender address.
    pub sender: String,
    /// Recipient / call target.
    pub target: String,
    /// Hex-encoded call data, `0x`-prefixed.
    pub payload: String,
    pub nonce: u64,
    /// Hex-encoded 65-byte signature, `0x`-prefixed.
    pub signature: String,
    /// Fee sponsor address, or omitted when unsponsored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
}

impl From<&SignedOperation> for WireOperation {
    fn from(op: &SignedOperation) -> Self {
        Self {
            sender: op.sender.to_string(),
            target: op.target.to_string(),
            payload: op.payload.to_string(),
            nonce: op.nonce,
            signature: op.signature.to_string(),
            sponsor: op.sponsor.map(|a| a.to_string()),
        }
    }
}

impl TryFrom<WireOperation> for SignedOperation {
    type Error = RelayError;

    fn try_from(wire: WireOperation) -> Result<Self, RelayError> {
        let sponsor = match &wire.sponsor {
            Some(raw) if !raw.is_empty() => Some(parse_address(raw, "sponsor")?),
            _ => None,
        };
        Ok(Self {
            sender: parse_address(&wire.sender, "sender")?,
            target: parse_address(&wire.target, "target")?,
            payload: parse_bytes(&wire.payload, "payload")?,
            nonce: wire.nonce,
            signature: parse_bytes(&wire.signature, "signature")?,
            sponsor,
        })
    }
}

fn parse_address(raw: &str, field: &str) -> Result<Address, RelayError> {
    Address::from_str(raw.trim())
        .map_err(|e| RelayError::BadRequest(format!("invalid {field} address: {e}")))
}

fn parse_bytes(raw: &str, field: &str) -> Result<Bytes, RelayError> {
    Bytes::from_str(raw.trim())
        .map_err(|e| RelayError::BadRequest(format!("invalid {field} hex: {e}")))
}

/// Request to queue pre-built signed operations.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EnqueueOpsRequest {
    pub ops: Vec<WireOperation>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnqueueOpsResponse {
    pub success: bool,
    pub ops_queued: usize,
    pub total_pending: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmitBatchResponse {
    pub success: bool,
    pub tx_hash: String,
    pub block_number: u64,
    pub ops_submitted: usize,
    pub gas_used: u64,
}

impl From<BatchResult> for SubmitBatchResponse {
    fn from(result: BatchResult) -> Self {
        Self {
            success: true,
            tx_hash: result.tx_hash,
            block_number: result.block_number,
            ops_submitted: result.ops_submitted,
            gas_used: result.gas_used,
        }
    }
}

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusResponse {
    pub success: bool,
    pub status: String,
    pub pending_ops: usize,
    /// Whether the sponsored submission path is configured.
    pub sponsored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_address: Option<String>,
}
