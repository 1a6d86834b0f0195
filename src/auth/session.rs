//! Session issuing at login.

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, session_cookie};
use crate::jwt::{CodecError, IdentityClaims, JwtConfig, SignedAccessToken, SignedRefreshToken};
use crate::store::{CredentialStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Signing(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A matched access + refresh token pair whose refresh record is persisted.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub access: SignedAccessToken,
    pub refresh: SignedRefreshToken,
}

impl IssuedSession {
    /// `Set-Cookie` values for both tokens.
    pub fn set_cookies(&self, secure: bool) -> [String; 2] {
        [
            session_cookie(
                ACCESS_COOKIE_NAME,
                &self.access.token,
                self.access.duration,
                secure,
            ),
            session_cookie(
                REFRESH_COOKIE_NAME,
                &self.refresh.token,
                self.refresh.duration,
                secure,
            ),
        ]
    }
}

/// Create a session for `user_id`.
///
/// The refresh record is written before anything is returned; if the write
/// fails the whole call fails, so a refresh token without a backing record
/// never reaches a client.
pub async fn issue_session<S: CredentialStore>(
    store: &S,
    jwt: &JwtConfig,
    user_id: &str,
) -> Result<IssuedSession, SessionError> {
    let user = store
        .find_user_by_id(user_id)
        .await?
        .ok_or(SessionError::UserNotFound)?;

    let identity = IdentityClaims::from_user(&user);
    let refresh = jwt.sign_refresh_token(&user.id)?;
    let access = jwt.sign_access_token(&identity)?;

    store
        .create_refresh_token(&refresh.token, &user.id, refresh.expires_at)
        .await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "Session issued");

    Ok(IssuedSession { access, refresh })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{FailingStore, setup};

    #[tokio::test]
    async fn test_issue_session_persists_refresh_record() {
        let (db, jwt, user) = setup().await;

        let session = issue_session(&db, &jwt, &user.id).await.unwrap();

        let claims = jwt.verify_access_token(&session.access.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.name, user.name);

        let refresh_claims = jwt.verify_refresh_token(&session.refresh.token).unwrap();
        assert_eq!(refresh_claims.sub, user.id);

        let record = db
            .refresh_tokens()
            .get_by_token(&session.refresh.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user_id, user.id);
        assert!(!record.revoked);
        assert_eq!(record.expires_at as u64, session.refresh.expires_at);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (db, jwt, _) = setup().await;

        let result = issue_session(&db, &jwt, "no-such-user").await;
        assert!(matches!(result, Err(SessionError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_store_write_failure_fails_issue() {
        let (db, jwt, user) = setup().await;
        let store = FailingStore::failing_writes(db);

        let result = issue_session(&store, &jwt, &user.id).await;
        assert!(matches!(result, Err(SessionError::Store(_))));
    }

    #[tokio::test]
    async fn test_multiple_sessions_per_user() {
        let (db, jwt, user) = setup().await;

        let a = issue_session(&db, &jwt, &user.id).await.unwrap();
        let b = issue_session(&db, &jwt, &user.id).await.unwrap();
        assert_ne!(a.refresh.token, b.refresh.token);
    }

    #[tokio::test]
    async fn test_set_cookies() {
        let (db, jwt, user) = setup().await;
        let session = issue_session(&db, &jwt, &user.id).await.unwrap();

        let [access, refresh] = session.set_cookies(true);
        assert!(access.starts_with(&format!("accessToken={};", session.access.token)));
        assert!(access.contains("HttpOnly") && access.ends_with("; Secure"));
        assert!(refresh.contains(&format!("Max-Age={}", jwt.refresh_ttl().as_secs())));
    }
}
