//! End-to-end tests of the HTTP surface against the in-memory store.

use api_lib::{adapters::InMemoryDb, build_router, config::Config, web::AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use reading_groups_core::ports::DatabaseService;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    app_with_db().0
}

/// The router plus a handle on its store, for tests that arrange state directly.
fn app_with_db() -> (Router, Arc<InMemoryDb>) {
    let config = Config {
        site_url: "https://tehillim.example".to_string(),
        sweep_interval: None,
        ..Config::default()
    };
    let db = Arc::new(InMemoryDb::new());
    let state = Arc::new(AppState::new(db.clone(), Arc::new(config)));
    (build_router(state), db)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, set_cookie, bytes.to_vec())
}

fn json_of(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

/// Signs up a user and returns the `session=...` pair for later requests.
async fn sign_up(app: &Router, email: &str) -> String {
    let (status, set_cookie, _) = send(
        app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "email": email, "password": "secret1", "display_name": email })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    set_cookie
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn create_group(app: &Router, cookie: &str, book_type: &str, global: bool) -> Value {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/groups",
        Some(cookie),
        Some(json!({
            "name": "Daily Tehillim",
            "description": "One chapter a day",
            "dedicated_to": "Refuah shleima",
            "intention": "5",
            "book_type": book_type,
            "global": global
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json_of(&body)
}

#[tokio::test]
async fn health_and_stats_are_public() {
    let app = app();
    let (status, _, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["status"], "ok");

    sign_up(&app, "a@x.org").await;
    let (status, _, body) = send(&app, Method::GET, "/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let stats = json_of(&body);
    assert_eq!(stats["members"], 1);
    assert_eq!(stats["connections"], 0);
}

#[tokio::test]
async fn signup_rejects_short_password_and_duplicate_email() {
    let app = app();
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "email": "a@x.org", "password": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    sign_up(&app, "a@x.org").await;
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "email": "a@x.org", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signup_email_is_unique_ignoring_case() {
    let app = app();
    sign_up(&app, "Reader@X.org").await;
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "email": "reader@x.org", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_me_and_logout() {
    let app = app();
    sign_up(&app, "a@x.org").await;

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@x.org", "password": "wrong!!" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, set_cookie, _) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@x.org", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cookie = set_cookie.unwrap().split(';').next().unwrap().to_string();

    let (status, _, body) = send(&app, Method::GET, "/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["email"], "a@x.org");

    let (status, _, _) = send(&app, Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, Method::GET, "/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = app();
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/groups",
        None,
        Some(json!({ "name": "n", "description": "d", "dedicated_to": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/groups/00000000-0000-0000-0000-000000000000/parts",
        Some("session=not-a-session"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_group_sets_owner_and_book_size() {
    let app = app();
    let cookie = sign_up(&app, "owner@x.org").await;
    let group = create_group(&app, &cookie, "2", true).await;

    assert_eq!(group["max"], 150);
    assert_eq!(group["book_type"], "2");
    assert_eq!(group["intention"], "5");
    assert_eq!(group["owner_email"], "owner@x.org");
    assert_eq!(group["members"].as_array().unwrap().len(), 1);
    assert_eq!(group["members"][0]["admin"], true);
    assert_eq!(group["books_read"], 0);

    let id = group["id"].as_str().unwrap();
    let (status, _, body) = send(&app, Method::GET, &format!("/groups/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["name"], "Daily Tehillim");
}

#[tokio::test]
async fn create_group_rejects_blank_fields_and_unknown_books() {
    let app = app();
    let cookie = sign_up(&app, "owner@x.org").await;

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/groups",
        Some(&cookie),
        Some(json!({ "name": "  ", "description": "d", "dedicated_to": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/groups",
        Some(&cookie),
        Some(json!({ "name": "n", "description": "d", "dedicated_to": "x", "book_type": "9" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reading_a_part_end_to_end() {
    let app = app();
    let cookie = sign_up(&app, "reader@x.org").await;
    let group = create_group(&app, &cookie, "2", false).await;
    let id = group["id"].as_str().unwrap().to_string();

    let (status, _, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/parts", id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let assignment = json_of(&body);
    assert_eq!(assignment["status"], "assigned");
    let part = assignment["part"].as_u64().unwrap();
    assert!((1..=150).contains(&part));
    assert!(assignment["content_url"].as_str().unwrap().contains("תהילים-פרק-"));
    assert_eq!(assignment["group"]["in_progress"], json!([part]));
    assert!(assignment["group"]["in_progress_data"][part.to_string()].is_i64());

    let (status, _, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/parts/{}/finish", id, part),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let finished = json_of(&body);
    assert_eq!(finished["already_completed"], false);
    assert_eq!(finished["cycle_completed"], false);
    assert_eq!(finished["group"]["book"], json!([part]));
    assert_eq!(finished["group"]["in_progress"], json!([]));

    // Finishing twice is harmless.
    let (status, _, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/parts/{}/finish", id, part),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let again = json_of(&body);
    assert_eq!(again["already_completed"], true);
    assert_eq!(again["group"]["book"], json!([part]));
}

#[tokio::test]
async fn fully_claimed_book_reports_no_parts_available() {
    let (app, db) = app_with_db();
    let cookie = sign_up(&app, "reader@x.org").await;
    let group = create_group(&app, &cookie, "2", false).await;
    let id = group["id"].as_str().unwrap().parse().unwrap();

    let mut stored = db.get_group(id).await.unwrap();
    let now = Utc::now();
    stored.claims = (1..=stored.max).map(|part| (part, now)).collect();
    db.save_group(&stored).await.unwrap();

    let (status, _, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/parts", id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let response = json_of(&body);
    assert_eq!(response["status"], "no_parts_available");
    assert!(response.get("part").is_none());
    assert_eq!(response["group"]["in_progress"].as_array().unwrap().len(), 150);
}

#[tokio::test]
async fn abandoning_releases_the_claim() {
    let app = app();
    let cookie = sign_up(&app, "reader@x.org").await;
    let group = create_group(&app, &cookie, "1", false).await;
    let id = group["id"].as_str().unwrap().to_string();

    let (_, _, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/parts", id),
        Some(&cookie),
        None,
    )
    .await;
    let part = json_of(&body)["part"].as_u64().unwrap();

    let (status, _, body) = send(
        &app,
        Method::DELETE,
        &format!("/groups/{}/parts/{}", id, part),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let abandoned = json_of(&body);
    assert_eq!(abandoned["released"], true);
    assert_eq!(abandoned["group"]["in_progress"], json!([]));
    assert_eq!(abandoned["group"]["book"], json!([]));
}

#[tokio::test]
async fn finishing_a_part_outside_the_book_is_rejected() {
    let app = app();
    let cookie = sign_up(&app, "reader@x.org").await;
    let group = create_group(&app, &cookie, "2", false).await;
    let id = group["id"].as_str().unwrap();

    let (status, _, _) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/parts/151/finish", id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let app = app();
    let cookie = sign_up(&app, "reader@x.org").await;
    let (status, _, _) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/parts", uuid::Uuid::new_v4()),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_tabs_and_counts() {
    let app = app();
    let owner = sign_up(&app, "owner@x.org").await;
    let friend = sign_up(&app, "friend@x.org").await;

    let public = create_group(&app, &owner, "1", true).await;
    create_group(&app, &owner, "3", false).await;

    let (status, _, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/members", public["id"].as_str().unwrap()),
        Some(&friend),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["added"], true);

    // Anonymous visitors only ever see the global feed.
    let (_, _, body) = send(&app, Method::GET, "/groups?tab=private", None, None).await;
    assert_eq!(json_of(&body).as_array().unwrap().len(), 1);

    let (_, _, body) = send(&app, Method::GET, "/groups?tab=private", Some(&owner), None).await;
    assert_eq!(json_of(&body).as_array().unwrap().len(), 2);

    let (_, _, body) = send(&app, Method::GET, "/groups?tab=shared", Some(&friend), None).await;
    let shared = json_of(&body);
    assert_eq!(shared.as_array().unwrap().len(), 1);
    assert_eq!(shared[0]["id"], public["id"]);

    let (status, _, body) = send(&app, Method::GET, "/groups/counts", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let counts = json_of(&body);
    assert_eq!(counts["global"], 1);
    assert_eq!(counts["shared"], 0);
    assert_eq!(counts["private"], 2);
}

#[tokio::test]
async fn only_the_owner_edits_and_toggles_admins() {
    let app = app();
    let owner = sign_up(&app, "owner@x.org").await;
    let friend = sign_up(&app, "friend@x.org").await;
    let group = create_group(&app, &owner, "1", false).await;
    let id = group["id"].as_str().unwrap().to_string();

    send(&app, Method::POST, &format!("/groups/{}/members", id), Some(&friend), None).await;

    let update = json!({ "name": "Renamed", "description": "d", "dedicated_to": "x", "global": true });
    let (status, _, _) = send(
        &app,
        Method::PUT,
        &format!("/groups/{}", id),
        Some(&friend),
        Some(update.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(&app, Method::PUT, &format!("/groups/{}", id), Some(&owner), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    let updated = json_of(&body);
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["global"], true);

    // Visibility must be stated explicitly on a replacement.
    let (status, _, _) = send(
        &app,
        Method::PUT,
        &format!("/groups/{}", id),
        Some(&owner),
        Some(json!({ "name": "No flag", "description": "d", "dedicated_to": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (_, _, body) = send(&app, Method::GET, &format!("/groups/{}", id), None, None).await;
    let current = json_of(&body);
    assert_eq!(current["name"], "Renamed");
    assert_eq!(current["global"], true);

    let toggle = json!({ "email": "friend@x.org" });
    let (status, _, _) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/members/admin", id),
        Some(&friend),
        Some(toggle.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/members/admin", id),
        Some(&owner),
        Some(toggle),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["admin"], true);
}

#[tokio::test]
async fn sitemap_lists_only_global_groups() {
    let app = app();
    let owner = sign_up(&app, "owner@x.org").await;
    let public = create_group(&app, &owner, "1", true).await;
    let private = create_group(&app, &owner, "1", false).await;

    let (status, _, body) = send(&app, Method::GET, "/sitemap.xml", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let xml = String::from_utf8(body).unwrap();
    assert!(xml.contains(&format!("https://tehillim.example/group/{}", public["id"].as_str().unwrap())));
    assert!(!xml.contains(private["id"].as_str().unwrap()));

    let (status, _, body) = send(&app, Method::GET, "/robots.txt", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body)
        .unwrap()
        .contains("Sitemap: https://tehillim.example/sitemap.xml"));
}

#[tokio::test]
async fn manual_sweep_reports_cleaned_groups() {
    let app = app();
    let cookie = sign_up(&app, "reader@x.org").await;
    create_group(&app, &cookie, "1", false).await;

    let (status, _, body) = send(&app, Method::POST, "/maintenance/sweep", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["cleaned_groups"], 0);
}
