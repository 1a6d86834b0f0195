//! Minimal HTML pages: the login surface and one landing page per role.
//!
//! Landing pages live under the protected prefixes, so the gate has already
//! verified (or renewed) the identity by the time a handler runs.

use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use std::sync::Arc;

use crate::auth::{Auth, AuthenticatedUser};
use crate::db::UserRole;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct PagesState {
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(PagesState);

/// Fixed page routes. The login path must not be one of these.
pub const LANDING_ROUTES: [&str; 3] = [
    "/user/dashboard",
    "/analyst/validate",
    "/admin/dashboard",
];

/// Whether `login_path` would collide with a route the app already serves.
pub fn is_reserved_path(login_path: &str) -> bool {
    login_path == "/"
        || login_path == "/api"
        || login_path.starts_with("/api/")
        || LANDING_ROUTES.iter().any(|route| *route == login_path)
}

/// Create the page router. `login_path` must start with `/` and must not be
/// a reserved path.
pub fn create_pages_router(state: PagesState, login_path: &str) -> Router {
    Router::new()
        .route("/", get(Redirect::temporary(login_path)))
        .route(login_path, get(login_page))
        .route(LANDING_ROUTES[0], get(citizen_dashboard))
        .route(LANDING_ROUTES[1], get(analyst_validate))
        .route(LANDING_ROUTES[2], get(admin_dashboard))
        .with_state(state)
}

const LOGIN_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
<form id="login">
  <label>Email or phone <input name="identifier" required></label>
  <label>Password <input name="password" type="password" required></label>
  <button type="submit">Sign in</button>
</form>
<p id="error" role="alert"></p>
<script>
document.getElementById("login").addEventListener("submit", async (event) => {
  event.preventDefault();
  const form = new FormData(event.target);
  const identifier = form.get("identifier");
  const body = identifier.includes("@")
    ? { email: identifier, password: form.get("password") }
    : { phone: identifier, password: form.get("password") };
  const response = await fetch("/api/auth/login", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify(body),
  });
  if (response.ok) {
    window.location.reload();
  } else {
    const data = await response.json().catch(() => ({}));
    document.getElementById("error").textContent = data.error || "Sign in failed";
  }
});
</script>
</body>
</html>
"#;

async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn landing(title: &str, user: &AuthenticatedUser) -> Response {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n<p>Signed in as {name} ({role})</p>\n<button onclick=\"fetch('/api/auth/logout', {{ method: 'POST' }}).then(() => window.location.reload())\">Sign out</button>\n</body>\n</html>\n",
        title = title,
        name = escape_html(&user.claims.name),
        role = user.claims.role.as_str(),
    ))
    .into_response()
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, Html("<h1>Forbidden</h1>")).into_response()
}

async fn citizen_dashboard(Auth(user): Auth) -> Response {
    landing("Dashboard", &user)
}

async fn analyst_validate(Auth(user): Auth) -> Response {
    match user.claims.role {
        UserRole::Analyst | UserRole::Admin => landing("Validate reports", &user),
        UserRole::Citizen => forbidden(),
    }
}

async fn admin_dashboard(Auth(user): Auth) -> Response {
    match user.claims.role {
        UserRole::Admin => landing("Admin dashboard", &user),
        _ => forbidden(),
    }
}
