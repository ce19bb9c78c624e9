// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        EnqueueOpsRequest, EnqueueOpsResponse, SendMessageRequest, SendMessageResponse,
        StatusResponse, SubmitBatchResponse, TransactionInfo, WireOperation,
    },
    state::AppState,
};

pub mod bundler;
pub mod health;
pub mod message;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/message", post(message::send_message))
        .route("/ops", post(bundler::enqueue_ops))
        .route("/ops/submit", post(bundler::submit_all))
        .route("/status", get(bundler::status));

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        message::send_message,
        bundler::enqueue_ops,
        bundler::submit_all,
        bundler::status,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            SendMessageRequest,
            SendMessageResponse,
            TransactionInfo,
            WireOperation,
            EnqueueOpsRequest,
            EnqueueOpsResponse,
            SubmitBatchResponse,
            StatusResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    tags(
        (name = "Messaging", description = "Gasless message submission"),
        (name = "Bundler", description = "Operation queueing and batch settlement"),
        (name = "Health", description = "Service probes")
    )
)]
struct ApiDoc;

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

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(offline_state());
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }
}
