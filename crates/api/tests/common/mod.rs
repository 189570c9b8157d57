#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use audnet_access::AccessService;
use audnet_api::auth::jwt::JwtConfig;
use audnet_api::config::ServerConfig;
use audnet_api::router::build_app_router;
use audnet_api::state::AppState;
use audnet_executor::testing::ScriptedExecutor;
use audnet_executor::{ExecutorMode, PlaybookConfig};
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tower::ServiceExt;

/// Rooms seeded into every test database.
pub const TEST_ROSTER: &[i64] = &[11, 14, 15, 103];

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 60,
        },
        mode: ExecutorMode::Simulate,
        playbooks: PlaybookConfig {
            binary: "ansible-playbook".to_string(),
            playbook_dir: PathBuf::from("./playbooks"),
        },
        roster: TEST_ROSTER.to_vec(),
    }
}

/// Application under test plus handles to its collaborators.
pub struct TestApp {
    pub router: Router,
    pub access: AccessService,
    pub executor: Arc<ScriptedExecutor>,
}

impl TestApp {
    /// A fresh clone of the router, consumed by one `oneshot` request.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router over `pool` with a scripted executor
/// and the test roster seeded.
pub async fn build_test_app(pool: SqlitePool) -> TestApp {
    let config = test_config();
    let executor = Arc::new(ScriptedExecutor::new());
    let access = AccessService::new(pool.clone(), executor.clone());
    access
        .start(&config.roster)
        .await
        .expect("access service should start");

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        access: access.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        access,
        executor,
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("request should be handled")
}

fn json_request(
    method: Method,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, json_request(Method::POST, uri, body, None)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    send(app, json_request(Method::POST, uri, body, Some(token))).await
}

/// Register `email` with [`TEST_PASSWORD`] and return an access token.
pub async fn register_and_login(app: &TestApp, email: &str) -> String {
    let credentials = serde_json::json!({ "email": email, "password": TEST_PASSWORD });

    let response = post_json(app.app(), "/api/v1/auth/register", credentials.clone()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post_json(app.app(), "/api/v1/auth/login", credentials).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["access_token"]
        .as_str()
        .expect("login should return a token")
        .to_string()
}
