//! Route protection middleware.
//!
//! [`permission_guard`] runs the full access decision and is layered over every protected admin
//! route. [`session_guard`] stops after the session checks and is used by routes any signed-in
//! user may call (logout, profile, own permissions).
//!
//! On success the [`CurrentUser`] is stored in the request extensions, where the operation log
//! and the handlers find it.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::trace;

use crate::{
    AppState,
    auth::{
        access::{Decision, Deny, DenyKind},
        utils,
    },
    errors::Error,
};

impl From<Deny> for Error {
    fn from(deny: Deny) -> Self {
        match deny.kind {
            DenyKind::Unauthenticated => Error::Unauthenticated {
                message: Some(deny.message.to_string()),
            },
            DenyKind::Forbidden => Error::Forbidden {
                message: deny.message.to_string(),
            },
            DenyKind::InternalError => Error::Internal {
                operation: deny.message.to_string(),
            },
        }
    }
}

/// Run the access decision for `request`. On allow, returns the request with the caller attached.
pub(crate) async fn check_access(state: &AppState, mut request: Request, require_permission: bool) -> Result<Request, Deny> {
    let decision = state
        .access
        .decide(request.method(), request.uri(), request.headers(), require_permission)
        .await;

    match decision {
        Decision::Allow(user) => {
            trace!(user_id = user.id, "Attaching current user to request");
            request.extensions_mut().insert(user);
            Ok(request)
        }
        Decision::Deny(deny) => Err(deny),
    }
}

/// Browser navigations that fail the session checks are sent to the login page; everything else
/// gets the JSON error body.
pub(crate) fn deny_response(state: &AppState, wants_html: bool, deny: Deny) -> Response {
    if wants_html && deny.is_session_failure() {
        return utils::login_redirect(&state.config);
    }
    Error::from(deny).into_response()
}

async fn guard(state: AppState, request: Request, next: Next, require_permission: bool) -> Response {
    let wants_html = utils::wants_html(request.headers());
    match check_access(&state, request, require_permission).await {
        Ok(request) => next.run(request).await,
        Err(deny) => deny_response(&state, wants_html, deny),
    }
}

/// Middleware requiring a valid session and a permission matching the request.
pub async fn permission_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guard(state, request, next, true).await
}

/// Middleware requiring only a valid session.
pub async fn session_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guard(state, request, next, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::access::{ACCOUNT_DISABLED, NO_PERMISSION, NO_TOKEN, PERMISSION_LOOKUP_FAILED};
    use axum::http::StatusCode;

    #[test]
    fn test_deny_to_error_status() {
        let cases = [
            (DenyKind::Unauthenticated, NO_TOKEN, StatusCode::UNAUTHORIZED),
            (DenyKind::Forbidden, NO_PERMISSION, StatusCode::FORBIDDEN),
            (DenyKind::InternalError, PERMISSION_LOOKUP_FAILED, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, message, status) in cases {
            assert_eq!(Error::from(Deny { kind, message }).status_code(), status);
        }

        let err = Error::from(Deny {
            kind: DenyKind::Forbidden,
            message: ACCOUNT_DISABLED,
        });
        assert_eq!(err.user_message(), ACCOUNT_DISABLED);
    }
}
