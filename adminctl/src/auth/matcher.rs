//! Matching stored permission rows against concrete requests.
//!
//! A stored permission has a method and a path pattern. The pattern is one of:
//!
//! - an exact path (`/admin/api/users`)
//! - a prefix wildcard ending in `/*` (`/admin/api/users/*`), matching anything strictly below
//!   the prefix
//! - a segment template using `:name` placeholders (`/admin/api/users/:id`), where each
//!   placeholder matches exactly one non-empty segment
//!
//! Matching is pure string work on `/`-separated segments. No regex is compiled, so patterns
//! containing regex metacharacters are compared literally.

/// Returns true when a permission `(perm_method, perm_path)` grants `(req_method, req_path)`.
///
/// Methods are compared case-insensitively. The checks run in order: exact path equality, prefix
/// wildcard, segment template. Anything else does not match.
pub fn matches(perm_method: &str, perm_path: &str, req_method: &str, req_path: &str) -> bool {
    if !perm_method.eq_ignore_ascii_case(req_method) {
        return false;
    }

    if perm_path == req_path {
        return true;
    }

    if let Some(prefix) = perm_path.strip_suffix("/*") {
        // Must continue with a `/` right after the prefix, so `/users/*` does not cover `/usersX`
        // or `/users` itself.
        return req_path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'));
    }

    if perm_path.contains(':') {
        return template_matches(perm_path, req_path);
    }

    false
}

/// Segment-by-segment comparison where `:name` segments match any single non-empty segment.
pub fn template_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.split('/');
    let mut path_segments = path.split('/');

    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) => {
                if is_param(p) {
                    if s.is_empty() {
                        return false;
                    }
                } else if p != s {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

fn is_param(segment: &str) -> bool {
    segment.len() > 1 && segment.starts_with(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches("GET", "/admin/api/users", "GET", "/admin/api/users"));
        assert!(!matches("GET", "/admin/api/users", "GET", "/admin/api/users/1"));
    }

    #[test]
    fn test_method_is_case_insensitive() {
        assert!(matches("get", "/admin/api/users", "GET", "/admin/api/users"));
        assert!(matches("Delete", "/admin/api/users/:id", "DELETE", "/admin/api/users/3"));
    }

    #[test]
    fn test_method_mismatch_never_matches() {
        assert!(!matches("POST", "/admin/api/users", "GET", "/admin/api/users"));
        assert!(!matches("GET", "/admin/api/users/*", "PUT", "/admin/api/users/1"));
    }

    #[test]
    fn test_prefix_wildcard() {
        assert!(matches("GET", "/admin/api/users/*", "GET", "/admin/api/users/123"));
        assert!(matches("GET", "/admin/api/users/*", "GET", "/admin/api/users/123/roles"));
        assert!(!matches("GET", "/admin/api/users/*", "GET", "/admin/api/users"));
        assert!(!matches("GET", "/admin/api/users/*", "GET", "/admin/api/usersX"));
        assert!(!matches("GET", "/admin/api/users/*", "GET", "/admin/api/usersX/1"));
    }

    #[test]
    fn test_segment_template() {
        assert!(matches("PUT", "/admin/api/users/:id", "PUT", "/admin/api/users/42"));
        assert!(matches(
            "PUT",
            "/admin/api/roles/:id/permissions",
            "PUT",
            "/admin/api/roles/7/permissions"
        ));
        assert!(!matches("PUT", "/admin/api/users/:id", "PUT", "/admin/api/users/42/extra"));
        assert!(!matches("PUT", "/admin/api/users/:id", "PUT", "/admin/api/users"));
    }

    #[test]
    fn test_param_rejects_empty_segment() {
        assert!(!matches("PUT", "/admin/api/users/:id", "PUT", "/admin/api/users/"));
        assert!(!template_matches("/a/:x/b", "/a//b"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(!matches("GET", "/admin/api/a.c", "GET", "/admin/api/abc"));
        assert!(matches("GET", "/admin/api/a.c", "GET", "/admin/api/a.c"));
        assert!(!matches("GET", "/admin/api/(x|y)/:id", "GET", "/admin/api/x/1"));
        assert!(matches("GET", "/admin/api/(x|y)/:id", "GET", "/admin/api/(x|y)/1"));
    }

    #[test]
    fn test_pattern_without_wildcard_or_params_only_matches_exactly() {
        assert!(!matches("GET", "/admin/api", "GET", "/admin/api/users"));
        assert!(!matches("GET", "", "GET", "/"));
    }

    #[test]
    fn test_bare_colon_is_literal() {
        assert!(!template_matches("/a/:", "/a/b"));
        assert!(template_matches("/a/:", "/a/:"));
    }
}
