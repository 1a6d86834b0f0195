//! Logout: revoke the refresh record and clear both cookies.

use super::cookie::clear_session_cookies;
use crate::store::CredentialStore;

#[derive(Debug, Clone)]
pub struct LogoutOutcome {
    /// Whether a live refresh record was flipped to revoked by this call
    pub revoked: bool,
    /// `Set-Cookie` values that expire both session cookies
    pub clear_cookies: [String; 2],
}

/// Revoke `refresh_token` (if any) and return cookie-clearing headers.
///
/// Never fails. A store error is logged and the cookies are still cleared.
pub async fn logout<S: CredentialStore>(
    store: &S,
    refresh_token: Option<&str>,
    secure: bool,
) -> LogoutOutcome {
    let revoked = match refresh_token {
        Some(token) => match store.revoke_refresh_token(token).await {
            Ok(revoked) => revoked,
            Err(e) => {
                tracing::error!(error = %e, "Failed to revoke refresh token on logout");
                false
            }
        },
        None => false,
    };

    if revoked {
        tracing::info!("Refresh token revoked on logout");
    }

    LogoutOutcome {
        revoked,
        clear_cookies: clear_session_cookies(secure),
    }
}
