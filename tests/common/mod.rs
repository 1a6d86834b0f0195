#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use floodgate::{
    ServerConfig,
    auth::GatePolicy,
    create_app,
    db::{Database, NewUser, User, UserRole},
    jwt::{AccessClaims, IdentityClaims, JwtConfig, TokenCodec, TokenType, unix_now},
    password::hash_password,
    rate_limit::RateLimitConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use url::Url;

pub const ACCESS_SECRET: &[u8] = b"integration-access-secret-0000000000";
pub const REFRESH_SECRET: &[u8] = b"integration-refresh-secret-000000000";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn jwt_config() -> JwtConfig {
    JwtConfig::new(
        ACCESS_SECRET,
        REFRESH_SECRET,
        Duration::from_secs(15 * 60),
        Duration::from_secs(30 * 24 * 60 * 60),
    )
    .expect("Invalid JWT config")
}

/// Config with default gate policy over the given database.
pub fn test_config(db: Database, renewal_endpoint: Option<Url>) -> ServerConfig {
    ServerConfig {
        db,
        jwt: Arc::new(jwt_config()),
        secure_cookies: false,
        gate: GatePolicy::default(),
        renewal_endpoint,
        rate_limit: RateLimitConfig::new(),
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }
}

pub async fn create_test_app() -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = test_config(db.clone(), None);
    TestApp {
        app: create_app(&config),
        db,
        jwt: config.jwt.clone(),
    }
}

/// Create an active user whose password is [`PASSWORD`].
pub async fn create_user(db: &Database, name: &str, email: &str, role: UserRole) -> User {
    let password_hash = hash_password(PASSWORD).expect("Failed to hash password");
    let phone = format!("+91{}", &uuid::Uuid::new_v4().as_u128().to_string()[..10]);
    db.users()
        .create(&NewUser {
            name,
            email: Some(email),
            phone: Some(&phone),
            password_hash: &password_hash,
            role,
        })
        .await
        .expect("Failed to create user")
}

/// An access token for `user` that expired a minute ago.
pub fn expired_access_token(user: &User) -> String {
    let now = unix_now().unwrap();
    let identity = IdentityClaims::from_user(user);
    let claims = AccessClaims {
        sub: identity.sub,
        name: identity.name,
        contact: identity.contact,
        role: identity.role,
        token_type: TokenType::Access,
        iat: now - 1000,
        exp: now - 60,
    };
    TokenCodec::new(ACCESS_SECRET).unwrap().sign(&claims).unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn cookie_header(access: Option<&str>, refresh: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(access) = access {
        parts.push(format!("accessToken={}", access));
    }
    if let Some(refresh) = refresh {
        parts.push(format!("refreshToken={}", refresh));
    }
    parts.join("; ")
}

/// Extract all Set-Cookie headers from a response.
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of cookie `name` in a list of Set-Cookie headers.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|c| {
        let (pair, _) = c.split_once(';').unwrap_or((c, ""));
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Check if cookies contain `name` being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=;", name)) && c.contains("Max-Age=0"))
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).expect("Body is not JSON")
}

pub async fn text_body(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

/// Log in through the API and return (access token, refresh token).
pub async fn login(app: &TestApp, email: &str) -> (String, String) {
    let response = app
        .send(post_json(
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": PASSWORD }),
            None,
        ))
        .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    (
        cookie_value(&cookies, "accessToken").expect("No access cookie"),
        cookie_value(&cookies, "refreshToken").expect("No refresh cookie"),
    )
}
