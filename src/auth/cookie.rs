//! Cookie parsing and `Set-Cookie` construction for the session cookies.

use axum::http::header;

/// Cookie name for the short-lived access token.
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the long-lived refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header. Empty values count as absent.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim();
            if key.trim() == name && !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// The two session cookies as read from a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCookies<'a> {
    pub access_token: Option<&'a str>,
    pub refresh_token: Option<&'a str>,
}

impl<'a> SessionCookies<'a> {
    pub fn from_headers(headers: &'a axum::http::HeaderMap) -> Self {
        Self {
            access_token: get_cookie(headers, ACCESS_COOKIE_NAME),
            refresh_token: get_cookie(headers, REFRESH_COOKIE_NAME),
        }
    }
}

/// Build an http-only session cookie.
pub fn session_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        name, value, max_age, secure
    )
}

/// Build a cookie that expires `name` immediately.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{}",
        name, secure
    )
}

/// `Set-Cookie` values that clear both session cookies.
pub fn clear_session_cookies(secure: bool) -> [String; 2] {
    [
        clear_cookie(ACCESS_COOKIE_NAME, secure),
        clear_cookie(REFRESH_COOKIE_NAME, secure),
    ]
}
