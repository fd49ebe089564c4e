// Copyright 2026 Litterbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for litterbox.
//!
//! `POST /audit` runs one audit and relays the engine's report verbatim.
//! Every failure funnels through [`failure_response`], which assigns the
//! correlation id, logs the error and renders the uniform envelope.

use crate::error::{AuditError, FailureEnvelope};
use crate::pipeline::{validate_url, Auditor};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Body of `POST /audit`.
#[derive(Debug, Default, Deserialize)]
pub struct AuditRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// Build the axum Router with all REST endpoints.
pub fn router(auditor: Arc<Auditor>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/audit", post(handle_audit))
        .route("/health", get(health))
        .layer(cors)
        .with_state(auditor)
}

/// Serve the REST API on `addr` until ctrl-c.
pub async fn start(addr: SocketAddr, auditor: Arc<Auditor>) -> anyhow::Result<()> {
    let app = router(Arc::clone(&auditor));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("litterbox listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            auditor.close();
        })
        .await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

async fn handle_audit(
    State(auditor): State<Arc<Auditor>>,
    body: Result<Json<AuditRequest>, JsonRejection>,
) -> Response {
    // Bodies that are absent or not a JSON object carry no URL either.
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let url = match validate_url(request.url.as_deref()) {
        Ok(u) => u.to_string(),
        Err(e) => return failure_response(&e),
    };

    // Spawned so a dropped client connection cannot cancel the pipeline
    // halfway and leak its DOM environment.
    let task_auditor = Arc::clone(&auditor);
    let outcome = tokio::task::spawn(async move { task_auditor.audit(&url).await })
        .await
        .unwrap_or_else(|e| Err(AuditError::Internal(format!("audit task failed: {e}"))));

    match outcome {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => failure_response(&e),
    }
}

async fn health(State(auditor): State<Arc<Auditor>>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "renderer_available": auditor.renderer_available(),
        "active_contexts": auditor.active_contexts(),
        "in_flight": auditor.in_flight(),
        "max_concurrent_audits": auditor.max_concurrent(),
    }))
}

// ── Helpers ─────────────────────────────────────────────────────

/// Map an audit error onto its HTTP response.
pub fn failure_response(err: &AuditError) -> Response {
    if err.is_client_error() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response();
    }

    let envelope = FailureEnvelope::new(err);
    error!(id = %envelope.id, kind = err.kind(), "audit failed: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(envelope)).into_response()
}
