//! Import of declared admin routes into the permissions table.
//!
//! Every route registered under [`ADMIN_API_PREFIX`] gets a permission row with the route's name
//! and group, so administrators can grant it without typing paths by hand. Rows created by hand
//! for the same `(path, method)` are taken over and flagged as imported.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use crate::{
    auth::registry::RoutePermissionRegistry,
    db::handlers::{Permissions, permissions::RouteSync},
    errors::Error,
};

/// Only routes under this prefix are imported.
pub const ADMIN_API_PREFIX: &str = "/admin/api/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Reconcile every admin route in `registry` with the permissions table.
///
/// A failure on one route is logged and counted; the remaining routes are still processed.
#[instrument(skip_all, fields(routes = registry.len()))]
pub async fn import_route_permissions(pool: &PgPool, registry: &RoutePermissionRegistry) -> Result<ImportSummary, Error> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut permissions = Permissions::new(&mut conn);
    let mut summary = ImportSummary::default();

    for entry in registry.entries() {
        if !entry.pattern.starts_with(ADMIN_API_PREFIX) {
            continue;
        }

        match permissions
            .sync_route(&entry.method, &entry.pattern, &entry.descriptor.name, &entry.descriptor.group)
            .await
        {
            Ok(RouteSync::Inserted) => summary.inserted += 1,
            Ok(RouteSync::Updated) => summary.updated += 1,
            Ok(RouteSync::Unchanged) => summary.unchanged += 1,
            Err(e) => {
                warn!(method = %entry.method, path = %entry.pattern, "Failed to import route permission: {e}");
                summary.failed += 1;
            }
        }
    }

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        failed = summary.failed,
        "Route permission import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Repository as _, permissions::PermissionFilter};

    #[sqlx::test]
    #[ignore = "requires a Postgres database (DATABASE_URL)"]
    async fn test_import_is_idempotent_and_skips_non_admin_routes(pool: PgPool) {
        let registry = RoutePermissionRegistry::new();
        registry.register("GET", "/admin/api/users", "List users", "Users");
        registry.register("PUT", "/admin/api/users/:id", "Update user", "Users");
        registry.register("POST", "/api/login", "Login", "Auth");

        let summary = import_route_permissions(&pool, &registry).await.unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.updated, 0);

        let summary = import_route_permissions(&pool, &registry).await.unwrap();
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.unchanged, 2);

        registry.register("GET", "/admin/api/users", "Browse users", "Users");
        let summary = import_route_permissions(&pool, &registry).await.unwrap();
        assert_eq!(summary.updated, 1);

        let mut conn = pool.acquire().await.unwrap();
        let total = Permissions::new(&mut conn).count(&PermissionFilter::new(0, 100)).await.unwrap();
        assert_eq!(total, 2);
    }
}
