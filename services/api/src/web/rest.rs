//! services/api/src/web/rest.rs
//!
//! Contains the small status endpoints and the master definition for the
//! OpenAPI specification.

use crate::error::port_error_response;
use crate::web::{auth, groups, parts, state::AppState};
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        stats_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        groups::list_groups_handler,
        groups::group_counts_handler,
        groups::create_group_handler,
        groups::get_group_handler,
        groups::update_group_handler,
        groups::join_group_handler,
        groups::toggle_admin_handler,
        parts::request_part_handler,
        parts::finish_part_handler,
        parts::abandon_part_handler,
        parts::sweep_handler,
    ),
    components(
        schemas(
            HealthResponse,
            StatsResponse,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            groups::GroupResponse,
            groups::MemberResponse,
            groups::GroupTab,
            groups::GroupCountsResponse,
            groups::CreateGroupRequest,
            groups::UpdateGroupRequest,
            groups::JoinGroupResponse,
            groups::ToggleAdminRequest,
            groups::ToggleAdminResponse,
            parts::PartAssignmentResponse,
            parts::FinishPartResponse,
            parts::AbandonPartResponse,
            parts::SweepResponse,
        )
    ),
    tags(
        (name = "Shared Reading Groups API", description = "Groups that divide a book among their readers.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    /// Currently open live connections.
    pub connections: usize,
    /// Registered users.
    pub members: u64,
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Live connection and member counts.
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Current counters", body = StatsResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, (StatusCode, String)> {
    let members = state
        .db
        .count_users()
        .await
        .map_err(|e| port_error_response("Count users", e))?;
    Ok(Json(StatsResponse {
        connections: state.live.connections(),
        members,
    }))
}
