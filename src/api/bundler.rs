// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bundler endpoints: queue pre-signed operations, flush the queue as one
//! EntryPoint batch, and report service status.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::RelayError,
    models::{
        EnqueueOpsRequest, EnqueueOpsResponse, StatusResponse, SubmitBatchResponse, WireOperation,
    },
    relay::SignedOperation,
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/ops",
    request_body = EnqueueOpsRequest,
    tag = "Bundler",
    responses(
        (status = 200, description = "Operations queued", body = EnqueueOpsResponse),
        (status = 400, description = "Malformed operation")
    )
)]
pub async fn enqueue_ops(
    State(state): State<AppState>,
    Json(request): Json<EnqueueOpsRequest>,
) -> Result<Json<EnqueueOpsResponse>, RelayError> {
    if request.ops.is_empty() {
        return Err(RelayError::BadRequest(
            "ops must contain at least one operation".to_string(),
        ));
    }

    // Parse everything before touching the queue so a bad entry cannot
    // leave a partial batch behind.
    let ops = request
        .ops
        .into_iter()
        .map(SignedOperation::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let (ops_queued, total_pending) = state.queue.enqueue(ops).await;
    info!(ops_queued, total_pending, "operations queued");

    Ok(Json(EnqueueOpsResponse {
        success: true,
        ops_queued,
        total_pending,
    }))
}

/// Failure body for a batch that drained the queue but did not settle. The
/// drained operations ride along so the caller can re-sign or resubmit.
#[derive(Debug, Serialize)]
struct BatchFailureBody {
    success: bool,
    error: String,
    code: u16,
    failed_ops: Vec<WireOperation>,
}

#[utoipa::path(
    post,
    path = "/v1/ops/submit",
    tag = "Bundler",
    responses(
        (status = 200, description = "Batch settled", body = SubmitBatchResponse),
        (status = 400, description = "Queue empty or batch path not configured"),
        (status = 402, description = "Sponsor identity cannot fund the batch"),
        (status = 502, description = "Batch reverted on-chain")
    )
)]
pub async fn submit_all(State(state): State<AppState>) -> Response {
    let Some(submitter) = &state.batch_submitter else {
        return RelayError::BadRequest(
            "batch submission is not configured; set an EntryPoint address and server key"
                .to_string(),
        )
        .into_response();
    };

    match submitter.submit_all(&state.queue).await {
        Ok(result) => {
            info!(
                tx = %result.tx_hash,
                ops = result.ops_submitted,
                gas = result.gas_used,
                "batch settled"
            );
            Json(SubmitBatchResponse::from(result)).into_response()
        }
        Err(failure) => {
            warn!(
                error = %failure.error,
                dropped = failure.dropped_ops.len(),
                "batch failed; returning operations to caller"
            );
            let body = BatchFailureBody {
                success: false,
                error: failure.error.to_string(),
                code: failure.error.code(),
                failed_ops: failure.dropped_ops.iter().map(WireOperation::from).collect(),
            };
            (failure.error.status(), Json(body)).into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/status",
    tag = "Bundler",
    responses((status = 200, description = "Service status", body = StatusResponse))
)]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let config = &state.config;
    Json(StatusResponse {
        success: true,
        status: "ok".to_string(),
        pending_ops: state.queue.pending_len().await,
        sponsored: config.sponsored_enabled(),
        relay_address: config.relay_address.map(|a| a.to_string()),
        entrypoint_address: config.entrypoint_address.map(|a| a.to_string()),
        paymaster_address: config.paymaster_address.map(|a| a.to_string()),
        registry_address: config.registry_address.map(|a| a.to_string()),
    })
}
