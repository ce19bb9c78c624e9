// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy for the relay pipeline.
//!
//! Every failure that can reach a caller has a stable numeric code and a
//! human-readable message. `IndexUnavailable` never reaches callers: it only
//! triggers the on-chain fallback inside the existence index and is logged
//! there.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    #[error("sender {0} is not registered in the agent index; register before sending messages")]
    NotRegistered(String),

    #[error("account creation failed: {0}")]
    AccountCreationFailed(String),

    #[error("relay contract rejected the operation signature")]
    SignatureInvalid,

    #[error("{} has insufficient funds to cover settlement fees",
            if *sponsor { "the server's sponsor identity" } else { "the sender identity" })]
    InsufficientFunds { sponsor: bool },

    #[error("settlement layer rejected the quoted fee, including one escalated retry")]
    FeeTooLow,

    #[error("batch was included on-chain but reverted (tx {tx_hash})")]
    BatchReverted { tx_hash: String },

    #[error("no confirmation from the settlement layer within the configured bound")]
    SettlementTimeout,

    #[error("no operations queued for submission")]
    EmptyQueue,

    /// Internal-only: primary index query failed, fallback engaged.
    #[error("agent index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("settlement RPC error: {0}")]
    Rpc(String),

    #[error("{0}")]
    BadRequest(String),
}

impl RelayError {
    /// Stable numeric code, independent of HTTP status.
    pub fn code(&self) -> u16 {
        match self {
            RelayError::InvalidSecret(_) => 1001,
            RelayError::NotRegistered(_) => 1002,
            RelayError::AccountCreationFailed(_) => 1003,
            RelayError::SignatureInvalid => 1004,
            RelayError::InsufficientFunds { .. } => 1005,
            RelayError::FeeTooLow => 1006,
            RelayError::BatchReverted { .. } => 1007,
            RelayError::SettlementTimeout => 1008,
            RelayError::EmptyQueue => 1009,
            RelayError::IndexUnavailable(_) => 1010,
            RelayError::Rpc(_) => 1500,
            RelayError::BadRequest(_) => 1400,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidSecret(_)
            | RelayError::NotRegistered(_)
            | RelayError::EmptyQueue
            | RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            RelayError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            RelayError::SettlementTimeout => StatusCode::GATEWAY_TIMEOUT,
            RelayError::AccountCreationFailed(_)
            | RelayError::FeeTooLow
            | RelayError::BatchReverted { .. }
            | RelayError::Rpc(_) => StatusCode::BAD_GATEWAY,
            RelayError::IndexUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    code: u16,
    /// Machine-readable hint for errors the caller can act on.
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        // Unregistered senders get an actionable marker, not just prose:
        // clients key on it to walk the caller through registration.
        let status = match &self {
            RelayError::NotRegistered(_) => Some("registration_required"),
            _ => None,
        };
        let body = Json(ErrorBody {
            success: false,
            error: self.to_string(),
            code: self.code(),
            status,
        });
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use axum::body::to_bytes;

    #[test]
    fn codes_are_stable() {
        assert_eq!(RelayError::InvalidSecret("x".into()).code(), 1001);
        assert_eq!(RelayError::SignatureInvalid.code(), 1004);
        assert_eq!(RelayError::FeeTooLow.code(), 1006);
        assert_eq!(RelayError::EmptyQueue.code(), 1009);
    }

    #[test]
    fn insufficient_funds_distinguishes_sponsor_from_sender() {
        let sender = RelayError::InsufficientFunds { sponsor: false }.to_string();
        let sponsor = RelayError::InsufficientFunds { sponsor: true }.to_string();
        assert!(sender.contains("sender identity"));
        assert!(sponsor.contains("sponsor identity"));
        assert_ne!(sender, sponsor);
    }

    #[tokio::test]
    async fn into_response_returns_success_false_with_code() {
        let response = RelayError::EmptyQueue.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], 1009);
        assert!(body["error"].as_str().unwrap().contains("no operations"));
    }

    #[tokio::test]
    async fn not_registered_carries_a_registration_required_hint() {
        let sender = Address::repeat_byte(0x99).to_string();
        let response = RelayError::NotRegistered(sender.clone()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["status"], "registration_required");
        assert_eq!(body["code"], 1002);
        assert!(body["error"].as_str().unwrap().contains(&sender));

        // Other errors stay hint-free.
        let response = RelayError::EmptyQueue.into_response();
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert!(body.get("status").is_none());
    }

    #[test]
    fn settlement_timeout_maps_to_gateway_timeout() {
        assert_eq!(
            RelayError::SettlementTimeout.status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
