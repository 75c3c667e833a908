//! Family roster endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use shared_types::{Guardian, Recipient};

use crate::actors::family::{self as families, MembershipError};
use crate::api::{actor_error, ApiState};

#[derive(Debug, Deserialize)]
pub struct CreateFamilyRequest {
    pub id: String,
    pub name: String,
    pub founder: Guardian,
}

#[derive(Debug, Deserialize)]
pub struct AddChildRequest {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub reachable: bool,
}

#[derive(Debug, Deserialize)]
pub struct PresenceRequest {
    pub reachable: bool,
}

fn membership_status(e: &MembershipError) -> StatusCode {
    match e {
        MembershipError::FamilyNotFound(_) | MembershipError::MemberNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        MembershipError::FamilyExists(_)
        | MembershipError::DuplicateMember(_)
        | MembershipError::LastGuardian(_) => StatusCode::CONFLICT,
    }
}

fn membership_reply<T: serde::Serialize>(
    key: &str,
    result: Result<Result<T, MembershipError>, impl std::fmt::Display>,
) -> Response {
    match result {
        Ok(Ok(value)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                key: value
            })),
        )
            .into_response(),
        Ok(Err(e)) => (
            membership_status(&e),
            Json(json!({
                "success": false,
                "error": e.to_string()
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}

pub async fn create_family(
    State(state): State<ApiState>,
    Json(req): Json<CreateFamilyRequest>,
) -> impl IntoResponse {
    let result =
        families::create_family(&state.app_state.families(), req.id, req.name, req.founder).await;
    membership_reply("family", result)
}

pub async fn list_families(State(state): State<ApiState>) -> impl IntoResponse {
    match families::list_families(&state.app_state.families()).await {
        Ok(list) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "families": list
            })),
        )
            .into_response(),
        Err(e) => actor_error(e),
    }
}

pub async fn get_family(
    Path(family_id): Path<String>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    let result = families::get_family(&state.app_state.families(), family_id).await;
    membership_reply("family", result)
}

pub async fn add_guardian(
    Path(family_id): Path<String>,
    State(state): State<ApiState>,
    Json(guardian): Json<Guardian>,
) -> impl IntoResponse {
    let result = families::add_guardian(&state.app_state.families(), family_id, guardian).await;
    membership_reply("family", result)
}

pub async fn remove_guardian(
    Path((family_id, guardian_id)): Path<(String, String)>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    let result =
        families::remove_guardian(&state.app_state.families(), family_id, guardian_id).await;
    membership_reply("family", result)
}

pub async fn add_child(
    Path(family_id): Path<String>,
    State(state): State<ApiState>,
    Json(req): Json<AddChildRequest>,
) -> impl IntoResponse {
    let child = Recipient {
        reachable: req.reachable,
        last_seen: req.reachable.then(chrono::Utc::now),
        ..Recipient::new(req.id, req.display_name)
    };
    let result = families::add_child(&state.app_state.families(), family_id, child).await;
    membership_reply("family", result)
}

pub async fn remove_child(
    Path((family_id, child_id)): Path<(String, String)>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    let result = families::remove_child(&state.app_state.families(), family_id, child_id).await;
    membership_reply("family", result)
}

/// Presence update from the child's device
pub async fn set_presence(
    Path((family_id, child_id)): Path<(String, String)>,
    State(state): State<ApiState>,
    Json(req): Json<PresenceRequest>,
) -> impl IntoResponse {
    let result = families::set_reachability(
        &state.app_state.families(),
        family_id,
        child_id,
        req.reachable,
    )
    .await;
    membership_reply("child", result)
}
