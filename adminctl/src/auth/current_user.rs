use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::access::Decision,
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

/// Handlers take [`CurrentUser`] as an argument to require a signed-in caller.
///
/// Behind [`permission_guard`](crate::auth::middleware::permission_guard) or
/// [`session_guard`](crate::auth::middleware::session_guard) the user is already in the request
/// extensions. Anywhere else the session checks run here.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            trace!(user_id = user.id, "Current user found in request extensions");
            return Ok(user.clone());
        }

        match state.access.decide(&parts.method, &parts.uri, &parts.headers, false).await {
            Decision::Allow(user) => Ok(user),
            Decision::Deny(deny) => Err(deny.into()),
        }
    }
}
