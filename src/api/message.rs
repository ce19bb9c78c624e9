// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Message submission endpoint.
//!
//! Resolves the caller's secret to a signing identity, gates on the agent
//! index, ensures a smart account on the sponsored path, and settles the
//! message text as transaction call data.

use std::str::FromStr;

use alloy::primitives::{Address, Bytes};
use axum::{extract::State, Json};
use tracing::info;

use crate::{
    error::RelayError,
    models::{SendMessageRequest, SendMessageResponse},
    secrets,
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/message",
    request_body = SendMessageRequest,
    tag = "Messaging",
    responses(
        (status = 200, description = "Message settled on-chain", body = SendMessageResponse),
        (status = 400, description = "Invalid secret, recipient, or unregistered sender"),
        (status = 402, description = "Insufficient funds on the paying identity"),
        (status = 504, description = "Settlement did not confirm in time")
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, RelayError> {
    if request.text.is_empty() {
        return Err(RelayError::BadRequest("message text is empty".to_string()));
    }
    let recipient = Address::from_str(request.to.trim())
        .map_err(|e| RelayError::BadRequest(format!("invalid recipient address: {e}")))?;

    let identity = secrets::resolve(&request.auth)?;

    if !state.index.exists(identity.address()).await {
        return Err(RelayError::NotRegistered(identity.address().to_string()));
    }

    // On the sponsored path the on-wire sender is the caller's smart
    // account; on the direct path the identity pays from its own address.
    let account = if state.submitter.sponsored_configured() {
        state.accounts.ensure_account(identity.address()).await?
    } else {
        identity.address()
    };

    let payload = Bytes::from(request.text.clone().into_bytes());
    let outcome = state
        .submitter
        .submit_message(&identity, account, recipient, payload)
        .await?;

    info!(
        from = %account,
        to = %recipient,
        path = outcome.path.as_str(),
        tx = %outcome.tx_hash,
        "message settled"
    );

    Ok(Json(SendMessageResponse::from_outcome(
        outcome,
        account,
        recipient,
        request.text,
    )))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::RelayConfig;

    use super::*;

    fn offline_state() -> AppState {
        AppState::new(RelayConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            relay_address: None,
            entrypoint_address: None,
            factory_address: None,
            paymaster_address: None,
            registry_address: None,
            index_url: None,
            server_signer: None,
            settlement_timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    fn request(to: &str, text: &str, auth: &str) -> SendMessageRequest {
        SendMessageRequest {
            to: to.into(),
            text: text.into(),
            auth: auth.into(),
        }
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_any_network_call() {
        let err = send_message(
            State(offline_state()),
            Json(request(
                "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0",
                "",
                "some passphrase",
            )),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn bad_recipient_is_rejected() {
        let err = send_message(
            State(offline_state()),
            Json(request("not-an-address", "hello", "some passphrase")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn empty_secret_is_rejected() {
        let err = send_message(
            State(offline_state()),
            Json(request(
                "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0",
                "hello",
                "",
            )),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::InvalidSecret(_)));
    }
}
