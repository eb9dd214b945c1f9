//! Authentication utility functions: session cookies and login redirects.

use axum::{
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::config::{Config, SessionConfig};

/// `Set-Cookie` value carrying a freshly issued session token.
pub fn session_cookie(token: &str, session: &SessionConfig) -> String {
    let secure = if session.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly{}; SameSite={}; Max-Age={}",
        session.cookie_name,
        token,
        secure,
        session.cookie_same_site,
        session.expiry.as_secs()
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(cookie_name: &str) -> String {
    format!("{cookie_name}=; Path=/; HttpOnly; Max-Age=0")
}

/// Whether the request is a browser page navigation rather than an API call.
pub fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// Send a browser back to the login page, dropping whatever session cookie it had.
pub fn login_redirect(config: &Config) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, config.auth.login_path.clone()),
            (header::SET_COOKIE, clear_session_cookie(&config.auth.session.cookie_name)),
        ],
    )
        .into_response()
}
