//! Refresh token records.
//!
//! Only refresh tokens are stored. Access tokens are stateless and never
//! touch the database. Revocation flips a flag instead of deleting the row.

use sqlx::sqlite::SqlitePool;

/// A persisted refresh token.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub token: String,
    pub user_id: String,
    /// Unix seconds
    pub expires_at: i64,
    pub revoked: bool,
    /// Unix seconds
    pub created_at: i64,
}

impl RefreshTokenRecord {
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at < now as i64
    }
}

/// Store for managing refresh token records.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new, unrevoked record.
    pub async fn create(
        &self,
        token: &str,
        user_id: &str,
        expires_at: u64,
    ) -> Result<RefreshTokenRecord, sqlx::Error> {
        let created_at = crate::jwt::unix_now().unwrap_or_default() as i64;

        let result = sqlx::query(
            "INSERT INTO refresh_tokens (token, user_id, expires_at, revoked, created_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at as i64)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(RefreshTokenRecord {
            id: result.last_insert_rowid(),
            token: token.to_string(),
            user_id: user_id.to_string(),
            expires_at: expires_at as i64,
            revoked: false,
            created_at,
        })
    }

    /// Look up a record by its exact token string.
    pub async fn get_by_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, token, user_id, expires_at, revoked, created_at FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    /// Mark a record revoked. Returns whether a live record was flipped;
    /// revoking twice or revoking an unknown token is not an error.
    pub async fn revoke(&self, token: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE token = ? AND revoked = 0")
                .bind(token)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every live record owned by a user (logout everywhere).
    pub async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
