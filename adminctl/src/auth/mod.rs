//! Authentication and authorization system.
//!
//! # Pieces
//!
//! - [`registry`]: declared routes, `(METHOD, pattern) -> (name, group)`
//! - [`matcher`]: does a stored permission cover a concrete request
//! - [`session`]: HS256 session tokens and their revocation marker
//! - [`stores`]: storage capabilities the decision depends on
//! - [`access`]: the per-request decision chain
//! - [`middleware`]: axum guards running the decision
//! - [`current_user`]: extractor for the authenticated caller
//! - [`password`]: Argon2 hashing, length rules, one-time passwords
//! - [`captcha`]: login challenges
//! - [`utils`]: session cookies and login redirects
//!
//! # Sessions
//!
//! A session is a signed token carrying the user id, display data, the role ids held at login,
//! and a revocation marker `"{user_id}:{token_version}"`. Tokens are accepted from an
//! `Authorization: Bearer` header, the session cookie, or a `token` query parameter.
//!
//! Nothing is stored server-side per session. Each user has a token version; logout, password
//! changes and role changes bump it, which invalidates every token issued before.
//!
//! # Authorization
//!
//! Permissions are `(method, path)` rows attached to roles. A path may be exact, end in `/*` to
//! cover a subtree, or contain `:param` segments. Holders of the super-admin role skip the check.
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use adminctl::api::models::users::CurrentUser;
//!
//! async fn handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.username)
//! }
//! ```

pub mod access;
pub mod captcha;
pub mod current_user;
pub mod matcher;
pub mod middleware;
pub mod password;
pub mod registry;
pub mod session;
pub mod stores;
pub mod utils;
