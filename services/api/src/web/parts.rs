//! services/api/src/web/parts.rs
//!
//! REST handlers for the reading-part lifecycle: claim a random part, finish
//! it, or give it back.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use reading_groups_core::domain::PartNumber;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::port_error_response;
use crate::web::groups::GroupResponse;
use crate::web::state::AppState;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// Result of asking for a part. Running out of parts is a normal outcome.
#[derive(Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PartAssignmentResponse {
    Assigned {
        part: PartNumber,
        content_url: String,
        group: GroupResponse,
    },
    NoPartsAvailable {
        group: GroupResponse,
    },
}

#[derive(Serialize, ToSchema)]
pub struct FinishPartResponse {
    pub part: PartNumber,
    /// Nothing was recorded because the part had no live claim.
    pub already_completed: bool,
    pub cycle_completed: bool,
    pub group: GroupResponse,
}

#[derive(Serialize, ToSchema)]
pub struct AbandonPartResponse {
    pub part: PartNumber,
    pub released: bool,
    pub group: GroupResponse,
}

#[derive(Serialize, ToSchema)]
pub struct SweepResponse {
    pub cleaned_groups: usize,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Claim a random unread part of the group.
///
/// Stale claims are dropped first.
#[utoipa::path(
    post,
    path = "/groups/{id}/parts",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 200, description = "A part was assigned, or none is left", body = PartAssignmentResponse),
        (status = 404, description = "No such group"),
        (status = 409, description = "Too many concurrent updates")
    )
)]
pub async fn request_part_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<PartAssignmentResponse>, (StatusCode, String)> {
    let assignment = state
        .reading
        .request_part(group_id, Utc::now())
        .await
        .map_err(|e| port_error_response("Request part", e))?;

    let group = GroupResponse::from(&assignment.group);
    let response = match assignment.part {
        Some(part) => {
            info!(group_id = %group_id, user_id = %user_id, part, "Part claimed");
            PartAssignmentResponse::Assigned {
                part,
                content_url: state.content.url_for(assignment.group.book_type, part),
                group,
            }
        }
        None => {
            info!(group_id = %group_id, "No parts left to assign");
            PartAssignmentResponse::NoPartsAvailable { group }
        }
    };
    Ok(Json(response))
}

/// Mark a part as read.
#[utoipa::path(
    post,
    path = "/groups/{id}/parts/{part}/finish",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("part" = u32, Path, description = "Part number")
    ),
    responses(
        (status = 200, description = "Part recorded", body = FinishPartResponse),
        (status = 400, description = "Part outside the book"),
        (status = 404, description = "No such group"),
        (status = 409, description = "Too many concurrent updates")
    )
)]
pub async fn finish_part_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((group_id, part)): Path<(Uuid, PartNumber)>,
) -> Result<Json<FinishPartResponse>, (StatusCode, String)> {
    let finished = state
        .reading
        .finish_part(group_id, part)
        .await
        .map_err(|e| port_error_response("Finish part", e))?;

    info!(group_id = %group_id, user_id = %user_id, part, "Part finished");
    if finished.outcome.cycle_completed {
        info!(
            group_id = %group_id,
            books_read = finished.group.books_read,
            "Book completed, starting a new cycle"
        );
    }

    Ok(Json(FinishPartResponse {
        part,
        already_completed: finished.outcome.already_completed,
        cycle_completed: finished.outcome.cycle_completed,
        group: GroupResponse::from(&finished.group),
    }))
}

/// Give a claimed part back without finishing it.
#[utoipa::path(
    delete,
    path = "/groups/{id}/parts/{part}",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("part" = u32, Path, description = "Part number")
    ),
    responses(
        (status = 200, description = "Claim released (or was not held)", body = AbandonPartResponse),
        (status = 400, description = "Part outside the book"),
        (status = 404, description = "No such group")
    )
)]
pub async fn abandon_part_handler(
    State(state): State<Arc<AppState>>,
    Path((group_id, part)): Path<(Uuid, PartNumber)>,
) -> Result<Json<AbandonPartResponse>, (StatusCode, String)> {
    let (group, released) = state
        .reading
        .abandon_part(group_id, part)
        .await
        .map_err(|e| port_error_response("Abandon part", e))?;

    Ok(Json(AbandonPartResponse {
        part,
        released,
        group: GroupResponse::from(&group),
    }))
}

/// Drop stale claims in every group now.
#[utoipa::path(
    post,
    path = "/maintenance/sweep",
    responses(
        (status = 200, description = "Number of groups changed", body = SweepResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn sweep_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepResponse>, (StatusCode, String)> {
    let cleaned_groups = state
        .reading
        .sweep_all(Utc::now())
        .await
        .map_err(|e| port_error_response("Sweep", e))?;
    Ok(Json(SweepResponse { cleaned_groups }))
}
