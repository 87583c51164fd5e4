//! services/api/src/web/groups.rs
//!
//! REST handlers for creating, listing and editing groups and their members.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use reading_groups_core::domain::{
    BookType, Group, GroupDetailsUpdate, GroupFilter, Intention, Member, NewGroup, PartNumber, User,
};
use reading_groups_core::membership::normalize_image;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::port_error_response;
use crate::web::middleware::MaybeUser;
use crate::web::state::AppState;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct MemberResponse {
    pub email: String,
    pub name: String,
    pub picture_url: String,
    pub admin: bool,
}

impl From<&Member> for MemberResponse {
    fn from(m: &Member) -> Self {
        Self {
            email: m.email.clone(),
            name: m.name.clone(),
            picture_url: m.picture_url.clone(),
            admin: m.admin,
        }
    }
}

/// A group with its progress state.
#[derive(Serialize, ToSchema)]
pub struct GroupResponse {
    pub id: Uuid,
    pub version: i64,
    pub name: String,
    pub description: String,
    pub dedicated_to: String,
    /// Intention code ("1".."5", "7").
    pub intention: String,
    pub intention_label: String,
    /// Book type code: "1" Tanya, "2" Psalms, "3" Mishnah.
    pub book_type: String,
    pub book_type_name: String,
    pub book_image: Option<String>,
    pub owner_email: String,
    pub owner_name: String,
    pub global: bool,
    pub members: Vec<MemberResponse>,
    pub max: PartNumber,
    /// Parts completed in the current cycle.
    pub book: Vec<PartNumber>,
    /// Parts being read right now (mirror of `in_progress_data` keys).
    pub in_progress: Vec<PartNumber>,
    /// Part number to claim time in epoch milliseconds.
    pub in_progress_data: BTreeMap<String, i64>,
    pub books_read: u32,
    pub progress_percent: f64,
    pub created_at: DateTime<Utc>,
}

impl From<&Group> for GroupResponse {
    fn from(g: &Group) -> Self {
        Self {
            id: g.id,
            version: g.version,
            name: g.name.clone(),
            description: g.description.clone(),
            dedicated_to: g.dedicated_to.clone(),
            intention: g.intention.code().to_string(),
            intention_label: g.intention.label().to_string(),
            book_type: g.book_type.code().to_string(),
            book_type_name: g.book_type.display_name().to_string(),
            book_image: g.book_image.clone(),
            owner_email: g.owner_email.clone(),
            owner_name: g.owner_name.clone(),
            global: g.global,
            members: g.members.iter().map(MemberResponse::from).collect(),
            max: g.max,
            book: g.completed.iter().copied().collect(),
            in_progress: g.claims.keys().copied().collect(),
            in_progress_data: g
                .claims
                .iter()
                .map(|(part, at)| (part.to_string(), at.timestamp_millis()))
                .collect(),
            books_read: g.books_read,
            progress_percent: g.progress_percent(),
            created_at: g.created_at,
        }
    }
}

/// Which feed tab to list.
#[derive(Deserialize, ToSchema, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupTab {
    #[default]
    Global,
    Shared,
    Private,
}

#[derive(Deserialize, IntoParams)]
pub struct ListGroupsQuery {
    /// `global` (default), `shared` or `private`. Anonymous callers always get `global`.
    #[serde(default)]
    pub tab: GroupTab,
}

#[derive(Serialize, ToSchema)]
pub struct GroupCountsResponse {
    pub global: u64,
    pub shared: u64,
    pub private: u64,
}

fn default_code() -> String {
    "1".to_string()
}

#[derive(Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: String,
    pub dedicated_to: String,
    #[serde(default = "default_code")]
    pub intention: String,
    #[serde(default = "default_code")]
    pub book_type: String,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub book_image: Option<String>,
}

/// Replaces every editable field. `global` must be sent; a missing or blank
/// `book_image` removes the image.
#[derive(Deserialize, ToSchema)]
pub struct UpdateGroupRequest {
    pub name: String,
    pub description: String,
    pub dedicated_to: String,
    #[serde(default = "default_code")]
    pub intention: String,
    pub global: bool,
    #[serde(default)]
    pub book_image: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct JoinGroupResponse {
    pub added: bool,
    pub group: GroupResponse,
}

#[derive(Deserialize, ToSchema)]
pub struct ToggleAdminRequest {
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct ToggleAdminResponse {
    pub email: String,
    pub admin: bool,
}

//=========================================================================================
// Helpers
//=========================================================================================

pub(crate) async fn current_user(
    state: &AppState,
    user_id: Uuid,
) -> Result<User, (StatusCode, String)> {
    state
        .db
        .get_user_by_id(user_id)
        .await
        .map_err(|e| port_error_response("Load user", e))
}

fn tab_filter(tab: GroupTab, email: &str) -> GroupFilter {
    match tab {
        GroupTab::Global => GroupFilter::Global,
        GroupTab::Shared => GroupFilter::SharedWith(email.to_string()),
        GroupTab::Private => GroupFilter::OwnedBy(email.to_string()),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List groups for a feed tab.
#[utoipa::path(
    get,
    path = "/groups",
    params(ListGroupsQuery),
    responses(
        (status = 200, description = "Groups in the tab, newest first", body = [GroupResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_groups_handler(
    State(state): State<Arc<AppState>>,
    Extension(MaybeUser(user_id)): Extension<MaybeUser>,
    Query(query): Query<ListGroupsQuery>,
) -> Result<Json<Vec<GroupResponse>>, (StatusCode, String)> {
    let filter = match user_id {
        Some(user_id) => {
            let user = current_user(&state, user_id).await?;
            tab_filter(query.tab, &user.email)
        }
        None => GroupFilter::Global,
    };

    let groups = state
        .db
        .list_groups(&filter)
        .await
        .map_err(|e| port_error_response("List groups", e))?;
    Ok(Json(groups.iter().map(GroupResponse::from).collect()))
}

/// Number of groups in each feed tab for the signed-in user.
#[utoipa::path(
    get,
    path = "/groups/counts",
    responses(
        (status = 200, description = "Counts per tab", body = GroupCountsResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn group_counts_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<GroupCountsResponse>, (StatusCode, String)> {
    let user = current_user(&state, user_id).await?;

    let mut counts = [0u64; 3];
    for (slot, tab) in counts
        .iter_mut()
        .zip([GroupTab::Global, GroupTab::Shared, GroupTab::Private])
    {
        *slot = state
            .db
            .count_groups(&tab_filter(tab, &user.email))
            .await
            .map_err(|e| port_error_response("Count groups", e))?;
    }

    let [global, shared, private] = counts;
    Ok(Json(GroupCountsResponse {
        global,
        shared,
        private,
    }))
}

/// Create a group owned by the caller.
#[utoipa::path(
    post,
    path = "/groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 400, description = "Missing name, description or dedication, or unknown book type"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn create_group_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let book_type = BookType::from_code(&req.book_type).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown book type '{}'", req.book_type),
        )
    })?;
    let user = current_user(&state, user_id).await?;

    let new_group = NewGroup {
        name: req.name.trim().to_string(),
        description: req.description.trim().to_string(),
        dedicated_to: req.dedicated_to.trim().to_string(),
        intention: Intention::from_code(&req.intention),
        book_type,
        book_image: normalize_image(req.book_image),
        global: req.global,
        owner: user.as_member(true),
    };

    let group = state
        .reading
        .create_group(new_group)
        .await
        .map_err(|e| port_error_response("Create group", e))?;
    info!(group_id = %group.id, owner = %group.owner_email, "Group created");

    Ok((StatusCode::CREATED, Json(GroupResponse::from(&group))))
}

/// Fetch one group.
#[utoipa::path(
    get,
    path = "/groups/{id}",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 200, description = "The group", body = GroupResponse),
        (status = 404, description = "No such group")
    )
)]
pub async fn get_group_handler(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupResponse>, (StatusCode, String)> {
    let group = state
        .db
        .get_group(group_id)
        .await
        .map_err(|e| port_error_response("Load group", e))?;
    Ok(Json(GroupResponse::from(&group)))
}

/// Replace a group's descriptive fields. Owner only.
///
/// This is a full replacement: leaving out `book_image` removes the image.
#[utoipa::path(
    put,
    path = "/groups/{id}",
    params(("id" = Uuid, Path, description = "Group id")),
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Updated group", body = GroupResponse),
        (status = 400, description = "Blank required field"),
        (status = 422, description = "Missing field, e.g. `global`"),
        (status = 403, description = "Caller is not the owner"),
        (status = 404, description = "No such group")
    )
)]
pub async fn update_group_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<Json<GroupResponse>, (StatusCode, String)> {
    let user = current_user(&state, user_id).await?;
    let update = GroupDetailsUpdate {
        name: req.name.trim().to_string(),
        description: req.description.trim().to_string(),
        dedicated_to: req.dedicated_to.trim().to_string(),
        intention: Intention::from_code(&req.intention),
        global: req.global,
        book_image: req.book_image,
    };

    let group = state
        .reading
        .update_details(group_id, &user.email, update)
        .await
        .map_err(|e| port_error_response("Update group", e))?;
    Ok(Json(GroupResponse::from(&group)))
}

/// Join a group as a regular member.
#[utoipa::path(
    post,
    path = "/groups/{id}/members",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 200, description = "Membership result", body = JoinGroupResponse),
        (status = 404, description = "No such group")
    )
)]
pub async fn join_group_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<JoinGroupResponse>, (StatusCode, String)> {
    let user = current_user(&state, user_id).await?;
    let (group, added) = state
        .reading
        .join_group(group_id, user.as_member(false))
        .await
        .map_err(|e| port_error_response("Join group", e))?;
    if added {
        info!(group_id = %group_id, member = %user.email, "Member joined");
    }
    Ok(Json(JoinGroupResponse {
        added,
        group: GroupResponse::from(&group),
    }))
}

/// Grant or revoke a member's admin flag. Owner only.
#[utoipa::path(
    post,
    path = "/groups/{id}/members/admin",
    params(("id" = Uuid, Path, description = "Group id")),
    request_body = ToggleAdminRequest,
    responses(
        (status = 200, description = "New admin flag", body = ToggleAdminResponse),
        (status = 400, description = "Target is the owner"),
        (status = 403, description = "Caller is not the owner"),
        (status = 404, description = "No such group or member")
    )
)]
pub async fn toggle_admin_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<ToggleAdminRequest>,
) -> Result<Json<ToggleAdminResponse>, (StatusCode, String)> {
    let user = current_user(&state, user_id).await?;
    let (_, admin) = state
        .reading
        .toggle_admin(group_id, &user.email, &req.email)
        .await
        .map_err(|e| port_error_response("Toggle admin", e))?;
    Ok(Json(ToggleAdminResponse {
        email: req.email,
        admin,
    }))
}
