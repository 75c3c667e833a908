//! HTTP API routes for the guardian dashboard
//!
//! Thin JSON surface over the orchestrator and family actors. Handlers
//! never hold call state; they forward to an actor and translate its reply.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::json;

pub mod calls;
pub mod family;

use crate::app_state::AppState;

#[derive(Clone)]
pub struct ApiState {
    pub app_state: AppState,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        // Dashboard routes
        .route("/dashboard", get(calls::get_dashboard))
        .route("/dashboard/capability", get(calls::check_capability))
        .route("/dashboard/environment", put(calls::report_environment))
        .route("/dashboard/calls", post(calls::start_call))
        .route("/dashboard/calls/active", delete(calls::end_call))
        .route(
            "/dashboard/ring-all",
            post(calls::start_ring_all).delete(calls::cancel_ring_all),
        )
        .route("/dashboard/incoming/accept", post(calls::accept_incoming))
        .route("/dashboard/incoming/reject", post(calls::reject_incoming))
        // Family routes
        .route(
            "/families",
            get(family::list_families).post(family::create_family),
        )
        .route("/families/{family_id}", get(family::get_family))
        .route("/families/{family_id}/guardians", post(family::add_guardian))
        .route(
            "/families/{family_id}/guardians/{guardian_id}",
            delete(family::remove_guardian),
        )
        .route("/families/{family_id}/children", post(family::add_child))
        .route(
            "/families/{family_id}/children/{child_id}",
            delete(family::remove_child),
        )
        .route(
            "/families/{family_id}/children/{child_id}/presence",
            put(family::set_presence),
        )
}

/// Health check endpoint
pub async fn health_check(State(_state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "guardian-dashboard",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// 500 for a failed actor RPC
pub(crate) fn actor_error(e: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": format!("Actor error: {e}")
        })),
    )
        .into_response()
}
