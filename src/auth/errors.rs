//! Authentication failure kinds and their boundary responses.
//!
//! Every kind collapses to the same generic outcome at the HTTP boundary.
//! The distinctions only exist for logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::jwt::VerificationError;
use crate::store::StoreError;

/// Internal reason an authentication step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Malformed,
    InvalidSignature,
    Expired,
    /// No persisted record for the presented refresh token
    UnknownToken,
    Revoked,
    /// The persisted record is past its expiry
    RecordExpired,
    UserNotFound,
    UserInactive,
    StoreUnavailable,
    SigningFailed,
    /// The system clock could not be read
    ClockUnavailable,
    /// The remote verification endpoint refused the token
    Rejected,
    /// The remote verification endpoint could not be reached
    Unreachable,
    /// Renewal did not answer within its time budget
    Timeout,
}

impl AuthFailure {
    /// Operational failures are infrastructure problems, not bad credentials.
    pub fn is_operational(self) -> bool {
        matches!(
            self,
            AuthFailure::StoreUnavailable
                | AuthFailure::SigningFailed
                | AuthFailure::ClockUnavailable
                | AuthFailure::Unreachable
                | AuthFailure::Timeout
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthFailure::Malformed => "malformed",
            AuthFailure::InvalidSignature => "invalid_signature",
            AuthFailure::Expired => "expired",
            AuthFailure::UnknownToken => "unknown_token",
            AuthFailure::Revoked => "revoked",
            AuthFailure::RecordExpired => "record_expired",
            AuthFailure::UserNotFound => "user_not_found",
            AuthFailure::UserInactive => "user_inactive",
            AuthFailure::StoreUnavailable => "store_unavailable",
            AuthFailure::SigningFailed => "signing_failed",
            AuthFailure::ClockUnavailable => "clock_unavailable",
            AuthFailure::Rejected => "rejected",
            AuthFailure::Unreachable => "unreachable",
            AuthFailure::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<VerificationError> for AuthFailure {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::Malformed => AuthFailure::Malformed,
            VerificationError::InvalidSignature => AuthFailure::InvalidSignature,
            VerificationError::Expired => AuthFailure::Expired,
        }
    }
}

/// A failed renewal. Callers only ever learn "unauthorized"; `kind` is for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("access token renewal failed: {kind}")]
pub struct RenewError {
    kind: AuthFailure,
}

impl RenewError {
    pub fn new(kind: AuthFailure) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthFailure {
        self.kind
    }

    /// Emit a log line at a level matching the failure kind.
    pub fn log(&self) {
        if self.kind.is_operational() {
            tracing::error!(reason = %self.kind, "Access token renewal failed");
        } else {
            tracing::info!(reason = %self.kind, "Access token renewal rejected");
        }
    }
}

impl From<AuthFailure> for RenewError {
    fn from(kind: AuthFailure) -> Self {
        Self::new(kind)
    }
}

impl From<VerificationError> for RenewError {
    fn from(e: VerificationError) -> Self {
        Self::new(e.into())
    }
}

impl From<StoreError> for RenewError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Credential store failed during renewal");
        Self::new(AuthFailure::StoreUnavailable)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

/// Generic 401 used by every auth failure at a JSON boundary.
#[derive(Debug)]
pub struct Unauthorized;

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized",
            }),
        )
            .into_response()
    }
}

impl From<RenewError> for Unauthorized {
    fn from(e: RenewError) -> Self {
        e.log();
        Unauthorized
    }
}

/// Gate denial - redirects to the login surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub login_path: String,
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::temporary(&self.login_path).into_response()
    }
}
