//! Dashboard call endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use shared_types::{CallRequest, EnvironmentReport, RemediationSurface};

use crate::actors::call_orchestrator::{actor as orchestrator, CallError, RingAllOutcome};
use crate::actors::family as families;
use crate::api::{actor_error, ApiState};

/// Request to ring every reachable child of a family
#[derive(Debug, Deserialize)]
pub struct RingAllRequest {
    pub family_id: String,
}

/// Current dashboard snapshot
pub async fn get_dashboard(State(state): State<ApiState>) -> impl IntoResponse {
    match orchestrator::get_snapshot(&state.app_state.orchestrator()).await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "dashboard": snapshot
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}

/// Run the capability gate against the reported environment
pub async fn check_capability(State(state): State<ApiState>) -> impl IntoResponse {
    match orchestrator::check_capability(&state.app_state.orchestrator()).await {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "result": result,
                "remediation": RemediationSurface::for_result(result)
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}

/// Replace the environment the view layer runs in
pub async fn report_environment(
    State(state): State<ApiState>,
    Json(report): Json<EnvironmentReport>,
) -> impl IntoResponse {
    tracing::debug!(
        host = %report.host,
        secure_context = report.secure_context,
        "Environment reported"
    );
    let environment = state.app_state.environment();
    environment.update(report).await;
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "environment": environment.current().await
        })),
    )
}

/// Place one call
pub async fn start_call(
    State(state): State<ApiState>,
    Json(request): Json<CallRequest>,
) -> impl IntoResponse {
    match orchestrator::start_call(&state.app_state.orchestrator(), request).await {
        Ok(Ok(call)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "peer_id": call.peer_id,
                "mode": call.mode
            })),
        )
            .into_response(),
        Ok(Err(CallError::Capability(e))) => (
            StatusCode::PRECONDITION_FAILED,
            Json(json!({
                "success": false,
                "error": e.to_string(),
                "remediation": RemediationSurface::for_result(e.result())
            })),
        )
            .into_response(),
        Ok(Err(CallError::Initiation(e))) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "success": false,
                "error": e.user_message
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}

/// Hang up the active call
pub async fn end_call(State(state): State<ApiState>) -> impl IntoResponse {
    match orchestrator::end_call(&state.app_state.orchestrator()).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => actor_error(e),
    }
}

/// Start a ring-all session for a family
pub async fn start_ring_all(
    State(state): State<ApiState>,
    Json(req): Json<RingAllRequest>,
) -> impl IntoResponse {
    let family = match families::get_family(&state.app_state.families(), req.family_id).await {
        Ok(Ok(family)) => family,
        Ok(Err(e)) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "success": false,
                    "error": e.to_string()
                })),
            )
                .into_response()
        }
        Err(e) => return actor_error(e),
    };

    match orchestrator::start_ring_all(&state.app_state.orchestrator(), family).await {
        Ok(RingAllOutcome::Started {
            session_id,
            attempts_planned,
        }) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "session_id": session_id,
                "attempts_planned": attempts_planned
            })),
        )
            .into_response(),
        Ok(RingAllOutcome::Rejected { reason }) => (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "error": reason.to_string()
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}

/// Cancel the active ring-all session; succeeds when idle too
pub async fn cancel_ring_all(State(state): State<ApiState>) -> impl IntoResponse {
    match orchestrator::cancel_ring_all(&state.app_state.orchestrator()).await {
        Ok(cancelled) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "cancelled": cancelled
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}

pub async fn accept_incoming(State(state): State<ApiState>) -> impl IntoResponse {
    match orchestrator::accept_incoming(&state.app_state.orchestrator()).await {
        Ok(Ok(call)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "peer_id": call.peer_id,
                "mode": call.mode
            })),
        )
            .into_response(),
        Ok(Err(e)) => (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "error": e.to_string()
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}

pub async fn reject_incoming(State(state): State<ApiState>) -> impl IntoResponse {
    match orchestrator::reject_incoming(&state.app_state.orchestrator()).await {
        Ok(dismissed) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "dismissed": dismissed
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}
