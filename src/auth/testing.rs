//! Shared fixtures for the auth unit tests.

use std::time::Duration;

use crate::db::{Database, NewUser, RefreshTokenRecord, User, UserRole};
use crate::jwt::JwtConfig;
use crate::store::{CredentialStore, StoreError};

pub const ACCESS_SECRET: &[u8] = b"access-secret-for-unit-tests-0000";
pub const REFRESH_SECRET: &[u8] = b"refresh-secret-for-unit-tests-000";

pub fn jwt_config() -> JwtConfig {
    JwtConfig::new(
        ACCESS_SECRET,
        REFRESH_SECRET,
        Duration::from_secs(15 * 60),
        Duration::from_secs(30 * 24 * 60 * 60),
    )
    .unwrap()
}

/// In-memory database with one active citizen.
pub async fn setup() -> (Database, JwtConfig, User) {
    let db = Database::open(":memory:").await.unwrap();
    let user = db
        .users()
        .create(&NewUser {
            name: "Meera",
            email: Some("meera@example.org"),
            phone: Some("+910000000001"),
            password_hash: "unused",
            role: UserRole::Citizen,
        })
        .await
        .unwrap();
    (db, jwt_config(), user)
}

/// Wraps a database and fails selected operations.
pub struct FailingStore {
    inner: Database,
    fail_reads: bool,
    fail_writes: bool,
}

impl FailingStore {
    pub fn failing_reads(inner: Database) -> Self {
        Self {
            inner,
            fail_reads: true,
            fail_writes: false,
        }
    }

    pub fn failing_writes(inner: Database) -> Self {
        Self {
            inner,
            fail_reads: false,
            fail_writes: true,
        }
    }

    fn unavailable() -> StoreError {
        StoreError("simulated outage".to_string())
    }
}

impl CredentialStore for FailingStore {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        self.inner.find_user_by_id(id).await
    }

    async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        self.inner.find_refresh_token(token).await
    }

    async fn create_refresh_token(
        &self,
        token: &str,
        user_id: &str,
        expires_at: u64,
    ) -> Result<RefreshTokenRecord, StoreError> {
        if self.fail_writes {
            return Err(Self::unavailable());
        }
        self.inner
            .create_refresh_token(token, user_id, expires_at)
            .await
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        if self.fail_writes {
            return Err(Self::unavailable());
        }
        self.inner.revoke_refresh_token(token).await
    }
}
