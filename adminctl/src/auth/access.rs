//! Per-request access decision.
//!
//! Every protected request runs through one linear chain and ends in exactly one [`Decision`]:
//!
//! 1. extract the token (Bearer header, then session cookie, then `token` query parameter)
//! 2. verify it
//! 3. decode the revocation marker
//! 4. resolve the user
//! 5. reject tokens whose version is behind the stored one
//! 6. reject disabled accounts
//! 7. allow super admins
//! 8. resolve the permissions of the session's roles
//! 9. allow if any permission matches the request
//! 10. report storage failures while resolving permissions as internal errors
//!
//! Steps 1-6 are [`AccessControl::authenticate`], steps 7-10 are [`AccessControl::authorize`].
//! Routes that only need a session (logout, profile) run the first half.

use axum::http::{HeaderMap, Method, Uri, header};
use std::sync::Arc;
use tracing::{debug, error, instrument, trace, warn};

use crate::{
    api::models::users::CurrentUser,
    auth::{
        matcher,
        session::{SessionCodec, extract_revocation_info},
        stores::{RoleStore, UserStore},
    },
};

pub const NO_TOKEN: &str = "no token provided";
pub const TOKEN_INVALID: &str = "token invalid or expired";
pub const TOKEN_MALFORMED: &str = "malformed token";
pub const USER_NOT_FOUND: &str = "user not found";
pub const TOKEN_SUPERSEDED: &str = "token superseded";
pub const ACCOUNT_DISABLED: &str = "account disabled";
pub const NO_PERMISSION: &str = "no permission for this resource";
pub const PERMISSION_LOOKUP_FAILED: &str = "failed to resolve permissions";

/// Query parameter carrying a token for clients that cannot set headers.
pub const TOKEN_QUERY_PARAM: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyKind {
    Unauthenticated,
    Forbidden,
    InternalError,
}

impl DenyKind {
    fn as_label(self) -> &'static str {
        match self {
            DenyKind::Unauthenticated => "unauthenticated",
            DenyKind::Forbidden => "forbidden",
            DenyKind::InternalError => "internal_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deny {
    pub kind: DenyKind,
    pub message: &'static str,
}

impl Deny {
    const fn new(kind: DenyKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// Whether the request never got past session checks. Browser navigations are sent back to
    /// the login page for these.
    pub fn is_session_failure(&self) -> bool {
        matches!(self.kind, DenyKind::Unauthenticated) || self.message == ACCOUNT_DISABLED
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(CurrentUser),
    Deny(Deny),
}

impl Decision {
    fn deny(kind: DenyKind, message: &'static str) -> Self {
        Decision::Deny(Deny::new(kind, message))
    }

    fn outcome_label(&self) -> &'static str {
        match self {
            Decision::Allow(_) => "allow",
            Decision::Deny(deny) => deny.kind.as_label(),
        }
    }
}

/// Find the session token on a request.
///
/// Precedence is `Authorization: Bearer <token>`, then the session cookie, then the `token`
/// query parameter. Empty values are treated as absent.
pub fn extract_token(headers: &HeaderMap, uri: &Uri, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        trace!("Found bearer token");
        return Some(token.to_string());
    }

    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = cookie_header.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            if let Some((name, value)) = cookie.trim().split_once('=')
                && name == cookie_name
                && !value.is_empty()
            {
                trace!("Found session cookie");
                return Some(value.to_string());
            }
        }
    }

    uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, value)| key == TOKEN_QUERY_PARAM && !value.is_empty())
            .map(|(_, value)| {
                trace!("Found token query parameter");
                value.into_owned()
            })
    })
}

/// The access decision chain and its collaborators.
#[derive(Clone)]
pub struct AccessControl {
    codec: SessionCodec,
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    cookie_name: String,
}

impl AccessControl {
    pub fn new(codec: SessionCodec, users: Arc<dyn UserStore>, roles: Arc<dyn RoleStore>, cookie_name: impl Into<String>) -> Self {
        Self {
            codec,
            users,
            roles,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    pub fn roles(&self) -> &Arc<dyn RoleStore> {
        &self.roles
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Full decision for a request. `require_permission = false` stops after the session checks.
    #[instrument(skip_all, fields(method = %method, path = uri.path()))]
    pub async fn decide(&self, method: &Method, uri: &Uri, headers: &HeaderMap, require_permission: bool) -> Decision {
        let token = extract_token(headers, uri, &self.cookie_name);
        let decision = match self.authenticate(token.as_deref()).await {
            Decision::Allow(user) if require_permission => self.authorize(&user, method.as_str(), uri.path()).await,
            other => other,
        };

        metrics::counter!("adminctl_access_decisions_total", "outcome" => decision.outcome_label()).increment(1);
        match &decision {
            Decision::Allow(user) => trace!(user_id = user.id, "Access allowed"),
            Decision::Deny(deny) if deny.kind == DenyKind::InternalError => {
                error!(reason = deny.message, "Access decision failed")
            }
            Decision::Deny(deny) => debug!(kind = ?deny.kind, reason = deny.message, "Access denied"),
        }
        decision
    }

    /// Steps 1-6: establish who is calling.
    pub async fn authenticate(&self, token: Option<&str>) -> Decision {
        let Some(token) = token else {
            return Decision::deny(DenyKind::Unauthenticated, NO_TOKEN);
        };

        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(_) => return Decision::deny(DenyKind::Unauthenticated, TOKEN_INVALID),
        };

        let revocation = match extract_revocation_info(&claims) {
            Ok(info) => info,
            Err(_) => return Decision::deny(DenyKind::Unauthenticated, TOKEN_MALFORMED),
        };

        let user = match self.users.find_for_auth(claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => return Decision::deny(DenyKind::Unauthenticated, USER_NOT_FOUND),
            Err(e) => {
                warn!(user_id = claims.sub, "User lookup failed during authentication: {e}");
                return Decision::deny(DenyKind::Unauthenticated, USER_NOT_FOUND);
            }
        };

        if revocation.token_version < user.token_version {
            return Decision::deny(DenyKind::Unauthenticated, TOKEN_SUPERSEDED);
        }

        if !user.status.is_enabled() {
            return Decision::deny(DenyKind::Forbidden, ACCOUNT_DISABLED);
        }

        Decision::Allow(CurrentUser::from(claims))
    }

    /// Steps 7-10: decide whether an authenticated user may call `(method, path)`.
    pub async fn authorize(&self, user: &CurrentUser, method: &str, path: &str) -> Decision {
        if user.is_super_admin {
            return Decision::Allow(user.clone());
        }

        let permissions = if user.role_ids.is_empty() {
            Vec::new()
        } else {
            match self.roles.permissions_for_roles(&user.role_ids).await {
                Ok(permissions) => permissions,
                Err(e) => {
                    error!(user_id = user.id, "Failed to resolve permissions: {e}");
                    return Decision::deny(DenyKind::InternalError, PERMISSION_LOOKUP_FAILED);
                }
            }
        };

        if permissions
            .iter()
            .any(|permission| matcher::matches(&permission.method, &permission.path, method, path))
        {
            Decision::Allow(user.clone())
        } else {
            Decision::deny(DenyKind::Forbidden, NO_PERMISSION)
        }
    }
}
