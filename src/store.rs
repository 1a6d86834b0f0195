//! The persistence contract the session core depends on.
//!
//! Session issuing, renewal and logout only ever talk to a
//! [`CredentialStore`]; [`Database`] is the SQLite implementation.

use std::future::Future;

use crate::db::{Database, RefreshTokenRecord, User};

/// The store could not be reached or the query failed.
#[derive(Debug, thiserror::Error)]
#[error("credential store unavailable: {0}")]
pub struct StoreError(pub String);

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError(e.to_string())
    }
}

pub trait CredentialStore: Send + Sync {
    fn find_user_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn find_refresh_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<RefreshTokenRecord>, StoreError>> + Send;

    fn create_refresh_token(
        &self,
        token: &str,
        user_id: &str,
        expires_at: u64,
    ) -> impl Future<Output = Result<RefreshTokenRecord, StoreError>> + Send;

    /// Idempotent. Returns whether a live record was flipped to revoked.
    fn revoke_refresh_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

impl CredentialStore for Database {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().get_by_id(id).await?)
    }

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self.refresh_tokens().get_by_token(token).await?)
    }

    async fn create_refresh_token(
        &self,
        token: &str,
        user_id: &str,
        expires_at: u64,
    ) -> Result<RefreshTokenRecord, StoreError> {
        Ok(self
            .refresh_tokens()
            .create(token, user_id, expires_at)
            .await?)
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.refresh_tokens().revoke(token).await?)
    }
}
