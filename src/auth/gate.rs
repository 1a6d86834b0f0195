//! Per-request gate in front of protected route prefixes.
//!
//! For a protected path the gate walks a small state machine:
//!
//! - no cookies at all: denied
//! - access token verifies: allowed
//! - otherwise, with a refresh token: renew through a [`Renewer`]; on success
//!   the request continues and the new access token is set on the response
//! - anything else: denied, which redirects to the login path
//!
//! The login path itself is never redirected to itself. A visitor who already
//! holds a valid access token is sent to the landing page for their role.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::cookie::{ACCESS_COOKIE_NAME, SessionCookies, session_cookie};
use super::errors::{AuthFailure, LoginRedirect, RenewError};
use super::refresh::Renewer;
use super::types::AuthenticatedUser;
use crate::db::UserRole;
use crate::jwt::{AccessClaims, JwtConfig};

/// Renewal budget when none is configured.
pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Which paths the gate guards and where it sends denied requests.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    pub login_path: String,
    pub protected_prefixes: Vec<String>,
    pub renewal_timeout: Duration,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            protected_prefixes: vec![
                "/user".to_string(),
                "/analyst".to_string(),
                "/admin".to_string(),
            ],
            renewal_timeout: DEFAULT_RENEWAL_TIMEOUT,
        }
    }
}

impl GatePolicy {
    pub fn is_login_path(&self, path: &str) -> bool {
        path_has_prefix(path, &self.login_path)
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_prefixes
            .iter()
            .any(|prefix| path_has_prefix(path, prefix))
    }
}

/// Segment-aware prefix match: `/user` matches `/user` and `/user/x`, not `/users`.
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Landing page for an authenticated user of the given role.
pub fn landing_path(role: UserRole) -> &'static str {
    match role {
        UserRole::Citizen => "/user/dashboard",
        UserRole::Analyst => "/analyst/validate",
        UserRole::Admin => "/admin/dashboard",
    }
}

/// Outcome of gating one request.
#[derive(Debug, Clone)]
pub enum GateDecision {
    /// The path is not gated
    PassThrough,
    Allowed(AccessClaims),
    /// Allowed after a silent renewal; `access_token` must be set on the response
    AllowedRenewed {
        claims: AccessClaims,
        access_token: String,
    },
    /// A signed-in user asked for the login page
    AlreadyAuthenticated { landing: &'static str },
    Denied,
}

pub struct Gate<R> {
    policy: GatePolicy,
    jwt: Arc<JwtConfig>,
    renewer: R,
    secure_cookies: bool,
}

impl<R: Renewer> Gate<R> {
    pub fn new(policy: GatePolicy, jwt: Arc<JwtConfig>, renewer: R, secure_cookies: bool) -> Self {
        Self {
            policy,
            jwt,
            renewer,
            secure_cookies,
        }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Decide what happens to a request for `path` carrying `cookies`.
    pub async fn decide(&self, path: &str, cookies: SessionCookies<'_>) -> GateDecision {
        if self.policy.is_login_path(path) {
            return match self.verify_access(cookies.access_token) {
                Some(claims) => GateDecision::AlreadyAuthenticated {
                    landing: landing_path(claims.role),
                },
                None => GateDecision::PassThrough,
            };
        }

        if !self.policy.is_protected(path) {
            return GateDecision::PassThrough;
        }

        if cookies.access_token.is_none() && cookies.refresh_token.is_none() {
            tracing::debug!(path, "No session cookies");
            return GateDecision::Denied;
        }

        if let Some(claims) = self.verify_access(cookies.access_token) {
            return GateDecision::Allowed(claims);
        }

        let Some(refresh_token) = cookies.refresh_token else {
            return GateDecision::Denied;
        };

        match self.renew(refresh_token).await {
            Ok((access_token, claims)) => GateDecision::AllowedRenewed {
                claims,
                access_token,
            },
            Err(e) => {
                e.log();
                GateDecision::Denied
            }
        }
    }

    fn verify_access(&self, token: Option<&str>) -> Option<AccessClaims> {
        match self.jwt.verify_access_token(token?) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(reason = %AuthFailure::from(e), "Access token not accepted");
                None
            }
        }
    }

    /// One bounded renewal attempt. Timeouts count as failures; no retries.
    async fn renew(&self, refresh_token: &str) -> Result<(String, AccessClaims), RenewError> {
        let token = tokio::time::timeout(
            self.policy.renewal_timeout,
            self.renewer.renew(refresh_token),
        )
        .await
        .map_err(|_| AuthFailure::Timeout)??;

        // Tokens from a remote endpoint are checked like any other
        let claims = self.jwt.verify_access_token(&token)?;
        Ok((token, claims))
    }

    /// `Set-Cookie` value carrying a renewed access token.
    pub fn renewed_cookie(&self, access_token: &str) -> String {
        session_cookie(
            ACCESS_COOKIE_NAME,
            access_token,
            self.jwt.access_ttl().as_secs(),
            self.secure_cookies,
        )
    }
}

/// Axum middleware applying a [`Gate`] to every request.
pub async fn gate_middleware<R: Renewer + 'static>(
    State(gate): State<Arc<Gate<R>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let decision = {
        let cookies = SessionCookies::from_headers(request.headers());
        gate.decide(&path, cookies).await
    };

    match decision {
        GateDecision::PassThrough => next.run(request).await,
        GateDecision::Allowed(claims) => {
            request
                .extensions_mut()
                .insert(AuthenticatedUser { claims });
            next.run(request).await
        }
        GateDecision::AllowedRenewed {
            claims,
            access_token,
        } => {
            request
                .extensions_mut()
                .insert(AuthenticatedUser { claims });
            let mut response = next.run(request).await;
            if let Ok(value) = HeaderValue::from_str(&gate.renewed_cookie(&access_token)) {
                response.headers_mut().append(SET_COOKIE, value);
            }
            response
        }
        GateDecision::AlreadyAuthenticated { landing } => {
            Redirect::temporary(landing).into_response()
        }
        GateDecision::Denied => LoginRedirect {
            login_path: gate.policy.login_path.clone(),
        }
        .into_response(),
    }
}
