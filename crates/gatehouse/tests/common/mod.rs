//! Test utilities and common setup.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use chrono::{TimeDelta, Utc};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use gatehouse::api::{self, AppState};
use gatehouse::auth::{AuthConfig, AuthState, Claims, Role, Status, VerifiedIdentity, hash_password};
use gatehouse::db::Database;
use gatehouse::user::{NewUser, User, UserRepository};

pub const TEST_SECRET: &str = "test-secret-for-integration-tests-minimum-32-chars";
pub const PASSWORD: &str = "correct-horse-battery";
pub const SESSION_COOKIE: &str = "gatehouse.session-token";

/// A running app over an in-memory user store.
pub struct TestApp {
    pub router: Router,
    pub auth: AuthState,
    pub users: UserRepository,
    pub db: Database,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Create a user with the shared test password.
    pub async fn seed(&self, email: &str, role: Role, status: Status) -> User {
        self.users
            .create(
                NewUser::new(email)
                    .with_password_hash(hash_password(PASSWORD).unwrap())
                    .with_role(role)
                    .with_status(status),
            )
            .await
            .unwrap()
    }

    /// Token for `user` whose role/status were last read `refreshed_ago`.
    pub fn token_for(&self, user: &User, refreshed_ago: TimeDelta) -> String {
        let now = Utc::now();
        let mut claims = self
            .auth
            .issuer()
            .issue_claims(&VerifiedIdentity::from(user), now);
        claims.last_refresh = Some((now - refreshed_ago).timestamp_millis());
        self.auth.issuer().encode(&claims).unwrap()
    }

    pub fn encode(&self, claims: &Claims) -> String {
        self.auth.issuer().encode(claims).unwrap()
    }
}

pub async fn test_app_with_config(config: AuthConfig) -> TestApp {
    let db = Database::in_memory().await.unwrap();
    let users = UserRepository::new(db.pool().clone());

    let state = AppState::new(config, Arc::new(users.clone()));
    let auth = state.auth.clone();
    let router = api::create_router(state);

    TestApp {
        router,
        auth,
        users,
        db,
    }
}

/// Development configuration with a fixed secret.
pub async fn test_app() -> TestApp {
    test_app_with_config(AuthConfig::development(TEST_SECRET)).await
}

pub fn get(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path).method(Method::GET);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("{SESSION_COOKIE}={token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(path: &str, body: &Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(path)
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|h| h.to_str().ok())
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Value of the session cookie set on `response`, if any.
pub fn session_token(response: &Response<Body>, cookie_name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        let (name, rest) = cookie.split_once('=')?;
        if name != cookie_name {
            return None;
        }
        let value = rest.split(';').next()?.to_string();
        (!value.is_empty()).then_some(value)
    })
}
