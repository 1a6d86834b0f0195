//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};
use super::errors::{AuthFailure, Unauthorized};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;

/// Extractor for handlers that need the caller's identity.
///
/// Behind the gate this is the identity the gate attached (possibly from a
/// renewal). Elsewhere only the access-token cookie is checked; no renewal
/// is attempted.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = Unauthorized;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Auth(user.clone()));
        }

        let token = get_cookie(&parts.headers, ACCESS_COOKIE_NAME).ok_or(Unauthorized)?;
        match state.jwt().verify_access_token(token) {
            Ok(claims) => Ok(Auth(AuthenticatedUser { claims })),
            Err(e) => {
                tracing::debug!(reason = %AuthFailure::from(e), "Access token not accepted");
                Err(Unauthorized)
            }
        }
    }
}

/// Optional authentication - never fails.
pub struct MaybeAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for MaybeAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(
            Auth::from_request_parts(parts, state)
                .await
                .ok()
                .map(|Auth(user)| user),
        ))
    }
}
