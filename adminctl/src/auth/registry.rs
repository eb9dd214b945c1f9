//! Route permission registry.
//!
//! Each protected route is declared once at startup with a human-readable name and a group. The
//! registry is consulted per request (by the operation log, to label entries) and by the route
//! permission import, which reconciles declared routes into permission rows.
//!
//! Reads vastly outnumber writes, so the table lives behind an [`ArcSwap`]: lookups load a
//! snapshot without locking and registration publishes a new snapshot.

use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use super::matcher;

/// Name and group attached to a declared route. Both empty when no route matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteDescriptor {
    pub name: String,
    pub group: String,
}

impl RouteDescriptor {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.group.is_empty()
    }
}

/// One registered route, in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Uppercased HTTP method
    pub method: String,
    /// Path pattern, possibly containing `:param` segments
    pub pattern: String,
    pub descriptor: RouteDescriptor,
}

#[derive(Debug, Default, Clone)]
struct Table {
    entries: Vec<RouteEntry>,
    index: HashMap<(String, String), usize>,
}

/// Mapping from `(METHOD, path_pattern)` to a [`RouteDescriptor`].
///
/// Constructed once and shared through the application state. Cloning is cheap and clones share
/// the same table.
#[derive(Debug, Clone, Default)]
pub struct RoutePermissionRegistry {
    table: Arc<ArcSwap<Table>>,
}

impl RoutePermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a route. Re-registering the same `(method, pattern)` overwrites its descriptor but
    /// keeps the position of the first registration.
    pub fn register(&self, method: &str, pattern: &str, name: &str, group: &str) {
        let key = (method.to_ascii_uppercase(), pattern.to_string());
        let descriptor = RouteDescriptor::new(name, group);

        self.table.rcu(|current| {
            let mut next = Table::clone(current);
            match next.index.get(&key) {
                Some(&pos) => next.entries[pos].descriptor = descriptor.clone(),
                None => {
                    next.index.insert(key.clone(), next.entries.len());
                    next.entries.push(RouteEntry {
                        method: key.0.clone(),
                        pattern: key.1.clone(),
                        descriptor: descriptor.clone(),
                    });
                }
            }
            next
        });
        trace!(method = %key.0, pattern = %key.1, name, group, "Registered route permission");
    }

    /// Find the descriptor for a concrete request.
    ///
    /// An exact `(METHOD, path)` registration wins. Otherwise entries with the same method are
    /// tried in registration order and the first pattern whose segments fit the path wins. No
    /// match yields an empty descriptor.
    pub fn lookup(&self, method: &str, path: &str) -> RouteDescriptor {
        let table = self.table.load();
        let method = method.to_ascii_uppercase();

        if let Some(&pos) = table.index.get(&(method.clone(), path.to_string())) {
            return table.entries[pos].descriptor.clone();
        }

        table
            .entries
            .iter()
            .filter(|entry| entry.method == method && entry.pattern.contains(':'))
            .find(|entry| matcher::template_matches(&entry.pattern, path))
            .map(|entry| entry.descriptor.clone())
            .unwrap_or_default()
    }

    /// All registered routes in registration order.
    pub fn entries(&self) -> Vec<RouteEntry> {
        self.table.load().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.table.load().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup() {
        let registry = RoutePermissionRegistry::new();
        registry.register("GET", "/admin/api/users", "List users", "Users");

        assert_eq!(
            registry.lookup("GET", "/admin/api/users"),
            RouteDescriptor::new("List users", "Users")
        );
        assert!(registry.lookup("POST", "/admin/api/users").is_empty());
    }

    #[test]
    fn test_method_is_normalized() {
        let registry = RoutePermissionRegistry::new();
        registry.register("delete", "/admin/api/users/:id", "Delete user", "Users");

        assert_eq!(registry.lookup("DELETE", "/admin/api/users/9").name, "Delete user");
        assert_eq!(registry.lookup("Delete", "/admin/api/users/9").name, "Delete user");
        assert_eq!(registry.entries()[0].method, "DELETE");
    }

    #[test]
    fn test_pattern_lookup() {
        let registry = RoutePermissionRegistry::new();
        registry.register("PUT", "/admin/api/users/:id", "Update user", "Users");

        assert_eq!(registry.lookup("PUT", "/admin/api/users/123").name, "Update user");
        assert!(registry.lookup("PUT", "/admin/api/users/123/extra").is_empty());
        assert!(registry.lookup("PUT", "/admin/api/users/").is_empty());
    }

    #[test]
    fn test_exact_beats_pattern() {
        let registry = RoutePermissionRegistry::new();
        registry.register("GET", "/admin/api/items/:id", "Get item", "Items");
        registry.register("GET", "/admin/api/items/by-code", "Items by code", "Items");

        assert_eq!(registry.lookup("GET", "/admin/api/items/by-code").name, "Items by code");
        assert_eq!(registry.lookup("GET", "/admin/api/items/5").name, "Get item");
    }

    #[test]
    fn test_first_registered_pattern_wins() {
        let registry = RoutePermissionRegistry::new();
        registry.register("GET", "/admin/api/:kind/:id", "Generic", "A");
        registry.register("GET", "/admin/api/users/:id", "Specific", "B");

        assert_eq!(registry.lookup("GET", "/admin/api/users/1").name, "Generic");
    }

    #[test]
    fn test_reregistration_overwrites_in_place() {
        let registry = RoutePermissionRegistry::new();
        registry.register("GET", "/admin/api/a/:id", "First", "G");
        registry.register("GET", "/admin/api/:x/:id", "Other", "G");
        registry.register("GET", "/admin/api/a/:id", "Renamed", "H");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("GET", "/admin/api/a/1"), RouteDescriptor::new("Renamed", "H"));
        assert_eq!(registry.entries()[0].descriptor.name, "Renamed");
    }

    #[test]
    fn test_clones_share_state() {
        let registry = RoutePermissionRegistry::new();
        let clone = registry.clone();
        clone.register("POST", "/admin/api/roles", "Create role", "Roles");

        assert_eq!(registry.lookup("POST", "/admin/api/roles").group, "Roles");
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = RoutePermissionRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        registry.register("GET", &format!("/admin/api/t{i}/{j}"), "n", "g");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 200);
    }
}
