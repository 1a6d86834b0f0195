//! Access token renewal from a refresh token.
//!
//! [`renew_access_token`] holds the whole verification. The gate reaches it
//! through a [`Renewer`]: either in-process, or over HTTP against the
//! `/api/auth/verify` endpoint when the gate cannot reach the store.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::{AuthFailure, RenewError};
use crate::db::Database;
use crate::jwt::{IdentityClaims, JwtConfig, SignedAccessToken, unix_now};
use crate::store::CredentialStore;

/// Verify a refresh token against its signature and its persisted record,
/// then mint a new access token from the owner's current state.
///
/// The refresh token is not rotated: it stays usable until it expires or is
/// revoked, so concurrent renewals with the same token all succeed.
pub async fn renew_access_token<S: CredentialStore>(
    store: &S,
    jwt: &JwtConfig,
    refresh_token: &str,
) -> Result<SignedAccessToken, RenewError> {
    let claims = jwt.verify_refresh_token(refresh_token)?;

    let record = store
        .find_refresh_token(refresh_token)
        .await?
        .ok_or(AuthFailure::UnknownToken)?;

    if record.revoked {
        return Err(AuthFailure::Revoked.into());
    }

    let now = unix_now().map_err(|_| AuthFailure::ClockUnavailable)?;
    if record.is_expired_at(now) {
        return Err(AuthFailure::RecordExpired.into());
    }

    if record.user_id != claims.sub {
        return Err(AuthFailure::UnknownToken.into());
    }

    let user = store
        .find_user_by_id(&record.user_id)
        .await?
        .ok_or(AuthFailure::UserNotFound)?;

    if !user.is_active {
        return Err(AuthFailure::UserInactive.into());
    }

    let access = jwt
        .sign_access_token(&IdentityClaims::from_user(&user))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            AuthFailure::SigningFailed
        })?;

    tracing::debug!(user_id = %user.id, "Access token renewed");
    Ok(access)
}

/// Body of `POST /api/auth/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub refresh_token: String,
}

/// Success body of `POST /api/auth/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub ok: bool,
    pub access_token: String,
}

/// Something that can exchange a refresh token for a new access token string.
pub trait Renewer: Send + Sync {
    fn renew(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<String, RenewError>> + Send;
}

/// Calls [`renew_access_token`] directly against a store.
#[derive(Clone)]
pub struct InProcessRenewer<S> {
    store: S,
    jwt: Arc<JwtConfig>,
}

impl<S: CredentialStore> InProcessRenewer<S> {
    pub fn new(store: S, jwt: Arc<JwtConfig>) -> Self {
        Self { store, jwt }
    }
}

impl<S: CredentialStore> Renewer for InProcessRenewer<S> {
    async fn renew(&self, refresh_token: &str) -> Result<String, RenewError> {
        renew_access_token(&self.store, &self.jwt, refresh_token)
            .await
            .map(|signed| signed.token)
    }
}

/// Calls the verification endpoint over HTTP.
#[derive(Clone)]
pub struct HttpRenewer {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpRenewer {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

impl Renewer for HttpRenewer {
    async fn renew(&self, refresh_token: &str) -> Result<String, RenewError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&VerifyRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(endpoint = %self.endpoint, error = %e, "Verification endpoint unreachable");
                AuthFailure::Unreachable
            })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(AuthFailure::Rejected.into());
        }

        let body: VerifyResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Verification endpoint returned an unexpected body");
            AuthFailure::Unreachable
        })?;

        if !body.ok {
            return Err(AuthFailure::Rejected.into());
        }
        Ok(body.access_token)
    }
}

/// The renewer selected at startup.
#[derive(Clone)]
pub enum RenewalBackend {
    InProcess(InProcessRenewer<Database>),
    Http(HttpRenewer),
}

impl Renewer for RenewalBackend {
    async fn renew(&self, refresh_token: &str) -> Result<String, RenewError> {
        match self {
            RenewalBackend::InProcess(renewer) => renewer.renew(refresh_token).await,
            RenewalBackend::Http(renewer) => renewer.renew(refresh_token).await,
        }
    }
}
