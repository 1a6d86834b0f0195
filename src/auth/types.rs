//! Authentication user types.

use crate::jwt::AccessClaims;

/// Identity verified for the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Claims from the access token (renewed or presented)
    pub claims: AccessClaims,
}
