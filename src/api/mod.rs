mod auth;
mod error;
mod me;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    secure_cookies: bool,
    rate_limit: RateLimitConfig,
) -> Router {
    let auth_state = auth::AuthApiState {
        db,
        jwt: jwt.clone(),
        secure_cookies,
        rate_limit,
    };

    let me_state = me::MeState { jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .merge(me::router(me_state))
}
