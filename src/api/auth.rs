//! Session API endpoints.
//!
//! - POST `/register` - Create a citizen account and sign it in
//! - POST `/login` - Check a password and issue a session
//! - POST `/logout` - Revoke the presented refresh token and clear cookies
//! - POST `/logout-all` - Revoke every refresh token of the current user
//! - POST `/verify` - Exchange a refresh token for a new access token

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::error::{ApiError, ResultExt, optional, required};
use crate::auth::{
    Auth, IssuedSession, REFRESH_COOKIE_NAME, SessionError, Unauthorized, VerifyRequest,
    VerifyResponse, clear_session_cookies, get_cookie, issue_session, logout,
    renew_access_token,
};
use crate::db::{Database, NewUser, User, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::password::{hash_password, verify_dummy_password, verify_password};
use crate::rate_limit::RateLimitConfig;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

#[derive(Clone)]
pub struct AuthApiState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub rate_limit: RateLimitConfig,
}

impl_has_auth_backend!(AuthApiState);

pub fn router(state: AuthApiState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout_handler))
        .route("/logout-all", post(logout_all))
        .route("/verify", post(verify))
        .with_state(state)
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    phone: Option<String>,
    password: Option<String>,
}

/// Public view of a user record.
#[derive(Serialize)]
struct UserInfo {
    id: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    role: UserRole,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterData {
    user_id: String,
}

#[derive(Serialize)]
struct LoginData {
    user: UserInfo,
}

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

impl<T> SuccessResponse<T> {
    fn new(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

fn session_err(e: SessionError) -> ApiError {
    error!(error = %e, "Failed to issue session");
    ApiError::internal("Failed to create session")
}

fn set_cookie_headers(
    session: &IssuedSession,
    secure: bool,
) -> AppendHeaders<[(HeaderName, String); 2]> {
    let [access, refresh] = session.set_cookies(secure);
    AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)])
}

fn required_password(password: Option<&str>) -> Result<&str, ApiError> {
    password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("password is required"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

/// Register a new citizen and sign them in.
async fn register(
    State(state): State<AuthApiState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let name = required(req.name.as_deref(), "name")?;
    let email = required(req.email.as_deref(), "email")?;
    let phone = required(req.phone.as_deref(), "phone")?;
    let password = required_password(req.password.as_deref())?;

    let conflict = || ApiError::conflict("A user with this email or phone already exists");

    if state
        .db
        .users()
        .contact_taken(Some(email), Some(phone))
        .await
        .db_err("Failed to check existing user")?
    {
        return Err(conflict());
    }

    let password_hash = hash_password(password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to create user")
    })?;

    let user = state
        .db
        .users()
        .create(&NewUser {
            name,
            email: Some(email),
            phone: Some(phone),
            password_hash: &password_hash,
            role: UserRole::Citizen,
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                conflict()
            } else {
                ApiError::db_error("Failed to create user", e)
            }
        })?;

    info!(user_id = %user.id, "User registered");

    let session = issue_session(&state.db, &state.jwt, &user.id)
        .await
        .map_err(session_err)?;

    Ok((
        StatusCode::CREATED,
        set_cookie_headers(&session, state.secure_cookies),
        SuccessResponse::new(RegisterData { user_id: user.id }),
    ))
}

fn too_many_attempts() -> ApiError {
    ApiError::too_many_requests("Too many login attempts. Please wait before trying again.")
}

fn throttle_login(state: &AuthApiState, identifier: &str) -> Result<(), ApiError> {
    if state.rate_limit.check_login(identifier) {
        Ok(())
    } else {
        warn!("Login attempts throttled");
        Err(too_many_attempts())
    }
}

/// Log in with email or phone and a password.
async fn login(
    State(state): State<AuthApiState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let password = required_password(req.password.as_deref())?;

    // Exactly one identifier, so the throttled key is the one looked up
    let user = match (
        optional(req.email.as_deref()),
        optional(req.phone.as_deref()),
    ) {
        (Some(_), Some(_)) => {
            return Err(ApiError::bad_request(
                "Provide either email or phone, not both",
            ));
        }
        (None, None) => return Err(ApiError::bad_request("email or phone is required")),
        (Some(email), None) => {
            throttle_login(&state, email)?;
            state.db.users().get_by_email(email).await
        }
        (None, Some(phone)) => {
            throttle_login(&state, phone)?;
            state.db.users().get_by_phone(phone).await
        }
    }
    .db_err("Failed to look up user")?;

    let Some(user) = user else {
        verify_dummy_password(password);
        info!("Login rejected: unknown user");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    if !state.rate_limit.check_account(&user.id) {
        warn!(user_id = %user.id, "Login attempts throttled for account");
        return Err(too_many_attempts());
    }

    if !verify_password(password, &user.password_hash) {
        info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    if !user.is_active {
        info!(user_id = %user.id, "Login rejected: user inactive");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let session = issue_session(&state.db, &state.jwt, &user.id)
        .await
        .map_err(session_err)?;

    Ok((
        StatusCode::OK,
        set_cookie_headers(&session, state.secure_cookies),
        SuccessResponse::new(LoginData {
            user: UserInfo::from(&user),
        }),
    ))
}

/// Revoke the refresh cookie's record and clear both cookies. Always succeeds.
async fn logout_handler(
    State(state): State<AuthApiState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let outcome = logout(
        &state.db,
        get_cookie(&headers, REFRESH_COOKIE_NAME),
        state.secure_cookies,
    )
    .await;

    let [access, refresh] = outcome.clear_cookies;
    (
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        SuccessResponse::new(serde_json::json!({})),
    )
}

#[derive(Serialize)]
struct LogoutAllData {
    revoked: u64,
}

/// Revoke every refresh token of the current user, ending all their sessions.
async fn logout_all(
    State(state): State<AuthApiState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state
        .db
        .refresh_tokens()
        .revoke_all_for_user(&auth.claims.sub)
        .await
        .db_err("Failed to revoke refresh tokens")?;

    info!(user_id = %auth.claims.sub, revoked, "All sessions revoked");

    let [access, refresh] = clear_session_cookies(state.secure_cookies);
    Ok((
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        SuccessResponse::new(LogoutAllData { revoked }),
    ))
}

/// Verification endpoint used for renewal.
///
/// Every failure, including an unreadable body or a store outage, answers
/// with the same 401.
async fn verify(
    State(state): State<AuthApiState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, Unauthorized> {
    let Ok(Json(req)) = body else {
        tracing::debug!("Verification request body rejected");
        return Err(Unauthorized);
    };

    let access = renew_access_token(&state.db, &state.jwt, &req.refresh_token).await?;

    Ok(Json(VerifyResponse {
        ok: true,
        access_token: access.token,
    }))
}
