//! Route declaration.
//!
//! Protected routes are declared once with their display name and group. The declaration adds
//! the handler to the router behind [`permission_guard`], with the operation log inside the
//! guard, and records `(method, pattern)` in the
//! [`RoutePermissionRegistry`], which later feeds the permission import and the operation log.
//! Patterns use `:param` segments, the same syntax stored permissions use; they are converted to
//! axum's `{param}` syntax here.

use axum::{
    Router,
    handler::Handler,
    http::Method,
    middleware::from_fn_with_state,
    routing::{MethodFilter, on},
};
use tracing::{trace, warn};

use crate::{
    AppState,
    audit::middleware::record_operation,
    auth::middleware::{permission_guard, session_guard},
};

/// Builds the router and the registry together so the two cannot drift apart.
pub struct Routes {
    state: AppState,
    router: Router<AppState>,
}

impl Routes {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            router: Router::new(),
        }
    }

    /// A route anyone may call.
    pub fn public<H, T>(self, method: Method, pattern: &str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.add(method, pattern, handler, Guard::None)
    }

    /// A route any signed-in user may call. Not recorded in the registry.
    pub fn session<H, T>(self, method: Method, pattern: &str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.add(method, pattern, handler, Guard::Session)
    }

    /// A route requiring a matching permission, registered under `name` and `group`.
    pub fn protected<H, T>(self, method: Method, pattern: &str, handler: H, name: &str, group: &str) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.state.registry.register(method.as_str(), pattern, name, group);
        self.add(method, pattern, handler, Guard::Permission)
    }

    pub fn into_router(self) -> Router<AppState> {
        self.router
    }

    fn add<H, T>(mut self, method: Method, pattern: &str, handler: H, guard: Guard) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        let filter = match MethodFilter::try_from(method.clone()) {
            Ok(filter) => filter,
            Err(e) => {
                warn!(%method, pattern, "Skipping route: {e}");
                return self;
            }
        };

        let method_router = on(filter, handler);
        // The last route_layer runs first: the guard decides before the audit reads the body
        let method_router = match guard {
            Guard::None => method_router,
            Guard::Session => method_router
                .route_layer(from_fn_with_state(self.state.clone(), record_operation))
                .route_layer(from_fn_with_state(self.state.clone(), session_guard)),
            Guard::Permission => method_router
                .route_layer(from_fn_with_state(self.state.clone(), record_operation))
                .route_layer(from_fn_with_state(self.state.clone(), permission_guard)),
        };

        let path = to_axum_path(pattern);
        trace!(%method, path, ?guard, "Adding route");
        // Same path, different method: axum merges the method routers
        self.router = self.router.route(&path, method_router);
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Guard {
    None,
    Session,
    Permission,
}

/// `/users/:id/roles` becomes `/users/{id}/roles`.
pub fn to_axum_path(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => format!("{{{name}}}"),
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_axum_path() {
        assert_eq!(to_axum_path("/admin/api/users"), "/admin/api/users");
        assert_eq!(to_axum_path("/admin/api/users/:id"), "/admin/api/users/{id}");
        assert_eq!(
            to_axum_path("/admin/api/roles/:id/permissions"),
            "/admin/api/roles/{id}/permissions"
        );
        assert_eq!(to_axum_path("/a/:x/:y"), "/a/{x}/{y}");
        assert_eq!(to_axum_path("/"), "/");
    }
}
