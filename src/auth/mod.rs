//! Session authentication with a dual-token system.
//!
//! Short-lived access tokens are verified statelessly. Long-lived refresh
//! tokens are checked against their persisted record on every renewal, so
//! revocation takes effect immediately for renewal even though outstanding
//! access tokens stay valid until they expire.

mod cookie;
mod errors;
mod extractors;
pub mod gate;
mod logout;
pub mod refresh;
mod session;
mod state;
#[cfg(test)]
mod testing;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, SessionCookies, clear_session_cookies, get_cookie,
    session_cookie,
};
pub use errors::{AuthFailure, LoginRedirect, RenewError, Unauthorized};
pub use extractors::{Auth, MaybeAuth};
pub use gate::{Gate, GateDecision, GatePolicy, gate_middleware, landing_path};
pub use logout::{LogoutOutcome, logout};
pub use refresh::{
    HttpRenewer, InProcessRenewer, RenewalBackend, Renewer, VerifyRequest, VerifyResponse,
    renew_access_token,
};
pub use session::{IssuedSession, SessionError, issue_session};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
