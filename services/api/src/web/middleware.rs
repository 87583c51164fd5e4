//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::web::state::AppState;

/// The caller's user id when a valid session cookie was sent, for routes that
/// also serve anonymous visitors.
#[derive(Clone, Copy, Debug)]
pub struct MaybeUser(pub Option<Uuid>);

/// Extracts the auth session id from the `session` cookie.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_cookie(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}

/// Like `require_auth`, but lets anonymous requests through as `MaybeUser(None)`.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user_id = match session_cookie(req.headers()) {
        Some(id) => match state.db.validate_auth_session(id).await {
            Ok(user_id) => Some(user_id),
            Err(e) => {
                debug!("Ignoring invalid session cookie: {:?}", e);
                None
            }
        },
        None => None,
    };

    req.extensions_mut().insert(MaybeUser(user_id));
    next.run(req).await
}
