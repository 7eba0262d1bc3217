//! API Integration Tests
//!
//! Every test drives the full router with `tower::ServiceExt::oneshot`
//! against the in-memory stores.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use netcc_api::auth::{JwtConfig, ManualClock, PasswordConfig, TokenService};
use netcc_api::media::MemoryMediaStore;
use netcc_api::{create_router, create_router_for_testing, state::AppState};
use netcc_core::{AppConfig, MemoryStore, UserRepository};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "netcc-test-boundary";

/// Helper to create a JSON request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a str),
}

/// Hand-built multipart/form-data body
fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, content_type) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a]);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header("x-auth-token", token);
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn register(app: &Router, username: &str, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/auth/register",
            Some(json!({ "username": username, "email": email, "password": "hunter22" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn create_comic(app: &Router, token: &str, title: &str) -> Value {
    let response = app
        .clone()
        .oneshot(multipart_request(
            "/api/comics",
            Some(token),
            &[
                Part::Text("title", title),
                Part::Text("description", "A night-shift nurse and a ghost"),
                Part::Text("category", "drama"),
                Part::File("thumbnail", "cover.png", "image/png"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

/// Test app whose media uploads can be inspected
fn app_with_media() -> (Router, Arc<MemoryMediaStore>) {
    let store = Arc::new(MemoryStore::new());
    let media = Arc::new(MemoryMediaStore::default());
    let state = AppState::new(AppConfig::default(), store.clone(), store, media.clone())
        .with_password_config(PasswordConfig::minimal());
    (create_router(Arc::new(state)), media)
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/nothing-here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_register_duplicate_email() {
    let (app, state) = create_router_for_testing();
    register(&app, "mina", "mina@example.com").await;

    let response = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/auth/register",
            Some(json!({ "username": "other", "email": "MINA@example.com", "password": "x" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["msg"], "User already exists");
    assert!(state.users.find_by_email("mina@example.com").await.unwrap().is_some());
}

#[tokio::test]
async fn test_register_validation_errors() {
    let (app, _) = create_router_for_testing();

    let response = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/auth/register",
            Some(json!({ "username": "mina", "email": "not-an-email", "password": "hunter22" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header("Content-Type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concurrent_duplicate_registrations() {
    let (app, _) = create_router_for_testing();

    let mut handles = Vec::new();
    for i in 0..8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.oneshot(create_json_request(
                "POST",
                "/api/auth/register",
                Some(json!({
                    "username": format!("racer{i}"),
                    "email": "race@example.com",
                    "password": "hunter22"
                })),
            ))
            .await
            .unwrap()
            .status()
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            status => assert_eq!(status, StatusCode::BAD_REQUEST),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (app, _) = create_router_for_testing();
    register(&app, "mina", "mina@example.com").await;

    let wrong_password = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "mina@example.com", "password": "wrong" })),
        ))
        .await
        .unwrap();
    let unknown_email = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "ghost@example.com", "password": "hunter22" })),
        ))
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::BAD_REQUEST);
    assert_eq!(unknown_email.status(), StatusCode::BAD_REQUEST);

    let a = axum::body::to_bytes(wrong_password.into_body(), usize::MAX)
        .await
        .unwrap();
    let b = axum::body::to_bytes(unknown_email.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(a, b);
    let json: Value = serde_json::from_slice(&a).unwrap();
    assert_eq!(json["msg"], "Invalid Credentials");
}

#[tokio::test]
async fn test_malformed_login_is_invalid_credentials() {
    let (app, _) = create_router_for_testing();
    register(&app, "mina", "mina@example.com").await;

    for body in [
        json!({ "email": "ghost", "password": "hunter22" }),
        json!({ "email": "mina@example.com", "password": "" }),
        json!({ "email": "", "password": "" }),
        json!({}),
    ] {
        let response = app
            .clone()
            .oneshot(create_json_request("POST", "/api/auth/login", Some(body.clone())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(
            body_json(response).await,
            json!({ "code": "INVALID_CREDENTIALS", "msg": "Invalid Credentials" }),
            "{body}"
        );
    }
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let (app, _) = create_router_for_testing();
    let parts = [
        Part::Text("title", "Untitled"),
        Part::File("thumbnail", "cover.png", "image/png"),
    ];

    let response = app
        .clone()
        .oneshot(multipart_request("/api/comics", None, &parts))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["msg"],
        "No token, authorization denied"
    );

    let response = app
        .oneshot(multipart_request("/api/comics", Some("garbage"), &parts))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["msg"], "Token is not valid");
}

#[tokio::test]
async fn test_bearer_token_is_accepted() {
    let (app, _) = create_router_for_testing();
    let token = register(&app, "mina", "mina@example.com").await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/comics")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(multipart_body(&[
                    Part::Text("title", "Bearer Comic"),
                    Part::File("thumbnail", "cover.jpg", "image/jpeg"),
                ])))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let clock = Arc::new(ManualClock::starting_now());
    let tokens = Arc::new(TokenService::with_clock(JwtConfig::default(), clock.clone()));
    let state = AppState::in_memory(AppConfig::default())
        .with_password_config(PasswordConfig::minimal())
        .with_token_service(tokens);
    let app = create_router(Arc::new(state));

    let token = register(&app, "mina", "mina@example.com").await;
    clock.advance(3599);
    create_comic(&app, &token, "Still Valid").await;

    clock.advance(1);
    let response = app
        .oneshot(multipart_request(
            "/api/comics",
            Some(&token),
            &[
                Part::Text("title", "Too Late"),
                Part::File("thumbnail", "cover.png", "image/png"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["msg"], "Token is not valid");
}

// =============================================================================
// Comic Tests
// =============================================================================

#[tokio::test]
async fn test_create_requires_title_and_thumbnail() {
    let (app, _) = create_router_for_testing();
    let token = register(&app, "mina", "mina@example.com").await;

    let response = app
        .clone()
        .oneshot(multipart_request(
            "/api/comics",
            Some(&token),
            &[Part::Text("title", "No Cover")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["msg"], "Thumbnail is required");

    let response = app
        .clone()
        .oneshot(multipart_request(
            "/api/comics",
            Some(&token),
            &[Part::File("thumbnail", "cover.png", "image/png")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["msg"], "Title is required");

    let response = app
        .oneshot(multipart_request(
            "/api/comics",
            Some(&token),
            &[
                Part::Text("title", "Animated"),
                Part::File("thumbnail", "cover.gif", "image/gif"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_comic_not_found() {
    let (app, _) = create_router_for_testing();

    for id in [uuid::Uuid::new_v4().to_string(), "not-a-valid-id".to_string()] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/comics/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["msg"], "Comic not found");
    }
}

#[tokio::test]
async fn test_append_chapter_to_unknown_comic() {
    let (app, _) = create_router_for_testing();
    let token = register(&app, "mina", "mina@example.com").await;

    let response = app
        .oneshot(multipart_request(
            &format!("/api/comics/{}/chapters", uuid::Uuid::new_v4()),
            Some(&token),
            &[Part::Text("title", "Chapter 1")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_too_many_episodes() {
    let (app, _) = create_router_for_testing();
    let token = register(&app, "mina", "mina@example.com").await;
    let comic = create_comic(&app, &token, "Long Chapter").await;

    let mut parts = vec![Part::Text("title", "Chapter 1")];
    for _ in 0..11 {
        parts.push(Part::File("episodes", "page.png", "image/png"));
    }

    let response = app
        .oneshot(multipart_request(
            &format!("/api/comics/{}/chapters", comic["_id"].as_str().unwrap()),
            Some(&token),
            &parts,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ten_episodes_are_stored_in_upload_order() {
    let (app, media) = app_with_media();
    let token = register(&app, "mina", "mina@example.com").await;
    let comic = create_comic(&app, &token, "Full Chapter").await;

    let names: Vec<String> = (1..=10).map(|i| format!("page-{i:02}.png")).collect();
    let mut parts = vec![Part::Text("title", "Chapter 1")];
    parts.extend(names.iter().map(|n| Part::File("episodes", n.as_str(), "image/png")));

    let response = app
        .oneshot(multipart_request(
            &format!("/api/comics/{}/chapters", comic["_id"].as_str().unwrap()),
            Some(&token),
            &parts,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    let episodes = updated["chapters"][0]["episodes"].as_array().unwrap();
    assert_eq!(episodes.len(), 10);

    // First upload is the thumbnail
    let uploads = media.uploads().await;
    assert_eq!(uploads.len(), 11);
    assert_eq!(updated["chapters"][0]["episodes"], json!(uploads[1..].to_vec()));
}

#[tokio::test]
async fn test_chapter_requires_title() {
    let (app, media) = app_with_media();
    let token = register(&app, "mina", "mina@example.com").await;
    let comic = create_comic(&app, &token, "Untitled Pages").await;
    let uri = format!("/api/comics/{}/chapters", comic["_id"].as_str().unwrap());

    for parts in [
        vec![Part::File("episodes", "p1.png", "image/png")],
        vec![
            Part::Text("title", "   "),
            Part::File("episodes", "p1.png", "image/png"),
        ],
    ] {
        let response = app
            .clone()
            .oneshot(multipart_request(&uri, Some(&token), &parts))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["msg"], "Title is required");
    }

    // Only the thumbnail was uploaded
    assert_eq!(media.uploads().await.len(), 1);
}

#[tokio::test]
async fn test_author_workflow_end_to_end() {
    let (app, media) = app_with_media();

    // u1 registers, then logs in
    register(&app, "mina", "mina@example.com").await;
    let response = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "mina@example.com", "password": "hunter22" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let author_token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    // u1 creates a comic
    let comic = create_comic(&app, &author_token, "Night Shift").await;
    let comic_id = comic["_id"].as_str().unwrap().to_string();
    assert!(comic["thumbnail"]
        .as_str()
        .unwrap()
        .starts_with("memory://netcc_comics/"));
    assert!(comic["author"].is_string());
    assert_eq!(comic["chapters"], json!([]));

    // Listing populates the author
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/comics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["author"]["username"], "mina");

    // u1 appends a chapter
    let chapters_uri = format!("/api/comics/{comic_id}/chapters");
    let response = app
        .clone()
        .oneshot(multipart_request(
            &chapters_uri,
            Some(&author_token),
            &[
                Part::Text("title", "Chapter 1"),
                Part::File("episodes", "p1.png", "image/png"),
                Part::File("episodes", "p2.jpg", "image/jpeg"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    let chapters = updated["chapters"].as_array().unwrap();
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0]["title"], "Chapter 1");

    let uploads = media.uploads().await;
    assert_eq!(uploads.len(), 3);
    assert_eq!(chapters[0]["episodes"], json!(uploads[1..].to_vec()));

    // u2 is not the author
    let other_token = register(&app, "jun", "jun@example.com").await;
    let response = app
        .clone()
        .oneshot(multipart_request(
            &chapters_uri,
            Some(&other_token),
            &[
                Part::Text("title", "Hijack"),
                Part::File("episodes", "evil.png", "image/png"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["msg"], "User not authorized");

    // Nothing changed and nothing was uploaded
    assert_eq!(media.uploads().await.len(), 3);
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/comics/{comic_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let fetched = body_json(response).await;
    assert_eq!(fetched["chapters"].as_array().unwrap().len(), 1);
    assert_eq!(fetched["author"]["username"], "mina");
}
