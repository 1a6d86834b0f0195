//! Current user endpoint.
//!
//! GET `/me` checks the access-token cookie only. It never renews, so a
//! client with an expired access token gets 401 here even while its
//! refresh token is still good.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::MaybeAuth;
use crate::impl_has_auth_backend;
use crate::jwt::{AccessClaims, JwtConfig};

#[derive(Clone)]
pub struct MeState {
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(MeState);

pub fn router(state: MeState) -> Router {
    Router::new().route("/me", get(me)).with_state(state)
}

#[derive(Serialize)]
struct MeResponse {
    success: bool,
    user: Option<AccessClaims>,
}

async fn me(MaybeAuth(auth): MaybeAuth) -> Response {
    match auth {
        Some(auth) => Json(MeResponse {
            success: true,
            user: Some(auth.claims),
        })
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(MeResponse {
                success: false,
                user: None,
            }),
        )
            .into_response(),
    }
}
