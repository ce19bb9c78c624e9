// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fee quoting and the single-retry escalation policy.
//!
//! Two quotes exist: a "viable" quote (current base fee plus a 5% buffer)
//! and an "escalated" quote (fixed constants well above typical base fee),
//! used exactly once as a fallback after a fee-related rejection. Quote
//! retrieval itself never hard-fails: if the network read errors, both
//! quotes fall back to conservative constants.

use std::future::Future;
use std::sync::Arc;

use crate::error::RelayError;

use super::client::SettlementClient;

/// Fallback quote when the fee-data query fails. 0.001 gwei.
pub const FALLBACK_MAX_FEE: u128 = 1_000_000;
/// Fallback priority fee. 0.0001 gwei.
pub const FALLBACK_PRIORITY_FEE: u128 = 100_000;
/// Escalated quote used after a fee rejection. 0.002 gwei.
pub const ESCALATED_MAX_FEE: u128 = 2_000_000;
/// Escalated priority fee. 0.0002 gwei.
pub const ESCALATED_PRIORITY_FEE: u128 = 200_000;
/// Minimal priority fee attached to viable quotes. 0.0001 gwei.
const VIABLE_PRIORITY_FEE: u128 = 100_000;

/// A fee ceiling pair for one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl FeeQuote {
    /// Multiply both components, for callers that pad the ceiling (the
    /// bundler submits batches at 3x the viable quote).
    pub fn scaled(self, factor: u128) -> FeeQuote {
        FeeQuote {
            max_fee_per_gas: self.max_fee_per_gas.saturating_mul(factor),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.saturating_mul(factor),
        }
    }
}

#[derive(Clone)]
pub struct FeeStrategy {
    client: Arc<SettlementClient>,
}

impl FeeStrategy {
    pub fn new(client: Arc<SettlementClient>) -> Self {
        Self { client }
    }

    /// Minimum viable quote: network base fee plus 5%, minimal tip.
    pub async fn viable_fee(&self) -> FeeQuote {
        match self.client.base_fee().await {
            Ok(base) => {
                let max_fee = base.saturating_mul(105) / 100;
                tracing::debug!(base_fee = base, max_fee, "quoted viable fee");
                FeeQuote {
                    max_fee_per_gas: max_fee,
                    max_priority_fee_per_gas: VIABLE_PRIORITY_FEE,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "fee data query failed, using fallback quote");
                FeeQuote {
                    max_fee_per_gas: FALLBACK_MAX_FEE,
                    max_priority_fee_per_gas: FALLBACK_PRIORITY_FEE,
                }
            }
        }
    }

    /// Fixed escalated quote for the one retry after a fee rejection.
    pub fn escalated_fee(&self) -> FeeQuote {
        FeeQuote {
            max_fee_per_gas: ESCALATED_MAX_FEE,
            max_priority_fee_per_gas: ESCALATED_PRIORITY_FEE,
        }
    }
}

/// Run `attempt` with the viable quote; on a fee rejection, retry exactly
/// once with the escalated quote. A second fee rejection propagates as
/// [`RelayError::FeeTooLow`]. All other errors propagate immediately.
///
/// Both the relay submitter and the bundler go through this one policy.
pub async fn with_escalation<T, F, Fut>(
    viable: FeeQuote,
    escalated: FeeQuote,
    mut attempt: F,
) -> Result<T, RelayError>
where
    F: FnMut(FeeQuote) -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    match attempt(viable).await {
        Err(RelayError::FeeTooLow) => {
            tracing::warn!(
                escalated_max_fee = escalated.max_fee_per_gas,
                "fee rejected, retrying once with escalated quote"
            );
            attempt(escalated).await
        }
        other => other,
    }
}
