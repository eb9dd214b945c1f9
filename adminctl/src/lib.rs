//! # adminctl: RBAC administration backend
//!
//! `adminctl` manages users, roles, route permissions and key/value dictionaries behind a JSON
//! API. Sessions are signed tokens, every protected route is checked against the permissions the
//! caller's roles grant, and mutating requests are recorded in an operation log.
//!
//! ## Overview
//!
//! The interesting part is the permission subsystem. Each protected route is declared once with a
//! method, a path pattern (`/admin/api/users/:id`), a display name and a group. The declaration
//! feeds both the axum router and the [`RoutePermissionRegistry`](auth::registry::RoutePermissionRegistry).
//! At startup the registry is reconciled into the `permissions` table so administrators can grant
//! routes to roles without typing paths by hand. On each request the access decision:
//!
//! 1. extracts the token (bearer header, then cookie, then `token` query parameter),
//! 2. verifies its signature and expiry,
//! 3. reads the revocation marker (`"{user_id}:{token_version}"`),
//! 4. loads the user and rejects superseded tokens and disabled accounts,
//! 5. lets super admins through,
//! 6. otherwise matches the request against the permissions of the user's roles.
//!
//! Logout and password changes bump the user's token version, which invalidates every token
//! issued before without any server-side session table.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for persistence.
//!
//! - The **API layer** ([`api`]) holds handlers, request/response models and route declaration.
//! - The **authentication layer** ([`auth`]) holds the registry, the matcher, the session codec,
//!   the access decision and the guards.
//! - The **database layer** ([`db`]) uses the repository pattern, one repository per table.
//! - The **audit layer** ([`audit`]) records mutating admin requests and prunes old entries.
//! - The **sync layer** ([`sync`]) imports declared routes into the permissions table.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use adminctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = adminctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     adminctl::telemetry::init_telemetry(&config.log, config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod sync;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test;
#[cfg(test)]
pub mod test_utils;

use crate::{
    api::{handlers, routing::Routes},
    auth::{
        access::AccessControl,
        captcha::{ArithmeticCaptcha, CaptchaProvider},
        password,
        registry::RoutePermissionRegistry,
        session::SessionCodec,
    },
    config::CorsOrigin,
    db::{
        PgAuthStore,
        handlers::{Repository, Roles, Users},
        models::{
            roles::RoleCreateDBRequest,
            users::{UserCreateDBRequest, UserUpdateDBRequest},
        },
    },
    errors::Error,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::get,
};
use bon::Builder;
pub use config::Config;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{any::Any, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, error, info, instrument, warn};

pub use types::{PermissionId, RoleId, UserId};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration loaded from environment/files
/// - `registry`: Declared protected routes, shared with the router and the permission import
/// - `access`: The access decision and the session codec it verifies with
/// - `captcha`: Login captcha provider
/// - `metrics_recorder`: Prometheus handle rendering `/internal/metrics` (when enabled)
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .registry(RoutePermissionRegistry::new())
///     .access(access)
///     .captcha(captcha)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub registry: RoutePermissionRegistry,
    pub access: Arc<AccessControl>,
    pub captcha: Arc<dyn CaptchaProvider>,
    pub metrics_recorder: Option<PrometheusHandle>,
}

/// Get the adminctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Make sure the super-admin role and the initial admin account exist.
///
/// Idempotent: the role is created when missing, the admin user is created when missing and
/// otherwise given the role if it lost it. A configured `admin_password` replaces the stored one
/// only when it differs, so restarts do not end the admin's sessions. When the user has to be
/// created without a configured password, a random one is generated and logged once.
///
/// Returns the admin user's id.
#[instrument(skip_all, fields(username = %config.admin_username))]
pub async fn create_initial_admin_user(config: &Config, db: &PgPool) -> anyhow::Result<UserId> {
    let role_name = &config.auth.super_admin_role;
    let mut tx = db.begin().await?;

    let role = {
        let mut roles = Roles::new(&mut tx);
        match roles.get_by_name(role_name).await? {
            Some(role) => role,
            None => {
                info!(role = %role_name, "Creating super admin role");
                roles
                    .create(&RoleCreateDBRequest {
                        name: role_name.clone(),
                        description: "Full access to every route".to_string(),
                        permission_ids: Vec::new(),
                    })
                    .await?
            }
        }
    };

    let mut users = Users::new(&mut tx);
    let user_id = match users.get_by_username(&config.admin_username).await? {
        Some(existing) => {
            let mut update = UserUpdateDBRequest::default();

            if !existing.has_role_named(role_name) {
                let mut role_ids = existing.role_ids();
                role_ids.push(role.id);
                update.role_ids = Some(role_ids);
            }

            if let Some(admin_password) = &config.admin_password
                && !password::verify_blocking(admin_password.clone(), existing.password_hash.clone()).await?
            {
                update.password_hash = Some(password::hash_blocking(admin_password.clone(), &config.auth.password).await?);
            }

            if update.revokes_sessions() {
                users.update(existing.id, &update).await?;
                info!(user_id = existing.id, "Updated initial admin user");
            }
            existing.id
        }
        None => {
            let admin_password = match &config.admin_password {
                Some(admin_password) => admin_password.clone(),
                None => {
                    let generated = password::generate_password(16);
                    warn!(
                        username = %config.admin_username,
                        password = %generated,
                        "No admin_password configured, generated one for the initial admin user"
                    );
                    generated
                }
            };

            let created = users
                .create(&UserCreateDBRequest {
                    username: config.admin_username.clone(),
                    password_hash: password::hash_blocking(admin_password, &config.auth.password).await?,
                    nickname: "Administrator".to_string(),
                    avatar: String::new(),
                    kind: 0,
                    status: types::Status::Enabled,
                    remark: String::new(),
                    role_ids: vec![role.id],
                })
                .await?;
            info!(user_id = created.id, "Created initial admin user");
            created.id
        }
    };

    tx.commit().await?;
    Ok(user_id)
}

/// Routes anyone may call.
fn public_routes(state: &AppState) -> Router<AppState> {
    Routes::new(state.clone())
        .public(Method::GET, "/api/captcha", handlers::auth::get_captcha)
        .public(Method::POST, "/api/login", handlers::auth::login)
        .into_router()
}

/// The admin API: session routes plus every protected route, registered with its name and group.
fn admin_routes(state: &AppState) -> Router<AppState> {
    use handlers::{dictionaries, operation_logs, permissions, roles, users};

    Routes::new(state.clone())
        // Any signed-in user
        .session(Method::POST, "/admin/api/logout", handlers::auth::logout)
        .session(Method::PUT, "/admin/api/profile/password", handlers::auth::change_password)
        .session(Method::PUT, "/admin/api/profile/avatar", handlers::auth::update_avatar)
        .session(Method::GET, "/admin/api/user/permissions", handlers::auth::get_user_permissions)
        // Users
        .protected(Method::GET, "/admin/api/users", users::list_users, "List users", "Users")
        .protected(Method::POST, "/admin/api/users", users::create_user, "Create user", "Users")
        .protected(Method::PUT, "/admin/api/users/:id", users::update_user, "Update user", "Users")
        .protected(Method::DELETE, "/admin/api/users/:id", users::delete_user, "Delete user", "Users")
        .protected(
            Method::POST,
            "/admin/api/users/:id/reset-password",
            users::reset_password,
            "Reset user password",
            "Users",
        )
        .protected(
            Method::PUT,
            "/admin/api/users/:id/toggle-status",
            users::toggle_status,
            "Toggle user status",
            "Users",
        )
        // Roles
        .protected(Method::GET, "/admin/api/roles", roles::list_roles, "List roles", "Roles")
        .protected(Method::POST, "/admin/api/roles", roles::create_role, "Create role", "Roles")
        .protected(Method::PUT, "/admin/api/roles/:id", roles::update_role, "Update role", "Roles")
        .protected(Method::DELETE, "/admin/api/roles/:id", roles::delete_role, "Delete role", "Roles")
        .protected(
            Method::PUT,
            "/admin/api/roles/:id/permissions",
            roles::assign_permissions,
            "Assign role permissions",
            "Roles",
        )
        // Permissions
        .protected(
            Method::GET,
            "/admin/api/permissions",
            permissions::list_permissions,
            "List permissions",
            "Permissions",
        )
        .protected(
            Method::POST,
            "/admin/api/permissions",
            permissions::create_permission,
            "Create permission",
            "Permissions",
        )
        .protected(
            Method::PUT,
            "/admin/api/permissions/:id",
            permissions::update_permission,
            "Update permission",
            "Permissions",
        )
        .protected(
            Method::DELETE,
            "/admin/api/permissions/:id",
            permissions::delete_permission,
            "Delete permission",
            "Permissions",
        )
        .protected(
            Method::POST,
            "/admin/api/permissions/batch-delete",
            permissions::batch_delete_permissions,
            "Batch delete permissions",
            "Permissions",
        )
        // Dictionaries
        .protected(
            Method::GET,
            "/admin/api/dictionaries/types",
            dictionaries::list_dict_types,
            "List dictionary types",
            "Dictionaries",
        )
        .protected(
            Method::POST,
            "/admin/api/dictionaries/types",
            dictionaries::create_dict_type,
            "Create dictionary type",
            "Dictionaries",
        )
        .protected(
            Method::PUT,
            "/admin/api/dictionaries/types/:id",
            dictionaries::update_dict_type,
            "Update dictionary type",
            "Dictionaries",
        )
        .protected(
            Method::DELETE,
            "/admin/api/dictionaries/types/:id",
            dictionaries::delete_dict_type,
            "Delete dictionary type",
            "Dictionaries",
        )
        .protected(
            Method::GET,
            "/admin/api/dictionaries/items",
            dictionaries::list_dict_items,
            "List dictionary items",
            "Dictionaries",
        )
        .protected(
            Method::GET,
            "/admin/api/dictionaries/items/by-code",
            dictionaries::items_by_code,
            "Dictionary items by code",
            "Dictionaries",
        )
        .protected(
            Method::POST,
            "/admin/api/dictionaries/items",
            dictionaries::create_dict_item,
            "Create dictionary item",
            "Dictionaries",
        )
        .protected(
            Method::PUT,
            "/admin/api/dictionaries/items/:id",
            dictionaries::update_dict_item,
            "Update dictionary item",
            "Dictionaries",
        )
        .protected(
            Method::DELETE,
            "/admin/api/dictionaries/items/:id",
            dictionaries::delete_dict_item,
            "Delete dictionary item",
            "Dictionaries",
        )
        // Operation logs
        .protected(
            Method::GET,
            "/admin/api/operation-logs",
            operation_logs::list_operation_logs,
            "List operation logs",
            "System logs",
        )
        .into_router()
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allowed = &config.auth.cors.allowed_origins;
    // `AllowOrigin::list` panics on `*`, so a wildcard becomes `AllowOrigin::any`
    let allow_origin = if allowed.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::with_capacity(allowed.len());
        for origin in allowed {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Panics inside handlers become the usual JSON 500 body.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "Request handler panicked");

    Error::Internal {
        operation: "handle request".to_string(),
    }
    .into_response()
}

/// Build the main application router with all endpoints and middleware.
///
/// This function constructs the complete Axum router with:
/// - Public routes (captcha, login)
/// - Admin API routes behind the session and permission guards, each audited once allowed
/// - Optional static file serving and Prometheus metrics
/// - CORS, request ids, panic recovery and tracing
///
/// Declaring the admin routes also fills `state.registry`.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(public_routes(state))
        .merge(admin_routes(state))
        .layer(DefaultBodyLimit::max(state.config.max_request_bytes))
        .with_state(state.clone());

    if let Some(handle) = state.metrics_recorder.clone() {
        router = router.route(
            "/internal/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    if let Some(static_dir) = &state.config.static_dir {
        info!(dir = %static_dir.display(), "Serving static files");
        router = router.fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true));
    }

    let router = router
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CatchPanicLayer::custom(handle_panic));

    Ok(router)
}

/// Connect to the configured database with the configured pool settings
async fn connect_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool_settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .min_connections(pool_settings.min_connections)
        .acquire_timeout(pool_settings.acquire_timeout)
        .idle_timeout(pool_settings.idle_timeout)
        .max_lifetime(pool_settings.max_lifetime)
        .connect(&config.database.url)
        .await?;
    Ok(pool)
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations, bootstraps the
///    admin account, declares routes, imports route permissions and starts the operation log
///    cleanup task
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, background tasks are cancelled and
///    awaited before the pool is closed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    shutdown_token: CancellationToken,
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting adminctl with configuration: {:#?}", config);

        let pool = connect_database(&config).await?;
        migrator().run(&pool).await?;

        create_initial_admin_user(&config, &pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;

        let metrics_recorder = if config.enable_metrics {
            Some(PrometheusBuilder::new().install_recorder()?)
        } else {
            None
        };

        let store = Arc::new(PgAuthStore::new(pool.clone()));
        let access = AccessControl::new(
            SessionCodec::from_config(&config)?,
            store.clone(),
            store,
            config.auth.session.cookie_name.clone(),
        );

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .registry(RoutePermissionRegistry::new())
            .access(Arc::new(access))
            .captcha(Arc::new(ArithmeticCaptcha::from_config(&config.auth.captcha)) as Arc<dyn CaptchaProvider>)
            .maybe_metrics_recorder(metrics_recorder)
            .build();

        let router = build_router(&state)?;

        match sync::route_permissions::import_route_permissions(&pool, &state.registry).await {
            Ok(summary) => debug!(?summary, "Imported route permissions"),
            Err(e) => warn!("Route permission import failed, continuing with existing permissions: {e}"),
        }

        let shutdown_token = CancellationToken::new();
        let mut background_tasks = Vec::new();
        if config.operation_log.enabled {
            background_tasks.push(tokio::spawn(audit::cleanup::run_cleanup_task(
                pool.clone(),
                config.operation_log.clone(),
                shutdown_token.clone(),
            )));
        }

        Ok(Self {
            router,
            config,
            pool,
            shutdown_token,
            background_tasks,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("adminctl listening on http://{}", bind_addr);

        // Peer addresses feed the operation log's client IP fallback
        axum::serve(listener, self.router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryAuthStore, create_test_config, create_test_state};
    use axum::http::StatusCode;
    use axum_test::TestServer;

    #[test_log::test(tokio::test)]
    async fn test_static_dir_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>admin</h1>").unwrap();

        let mut config = create_test_config();
        config.static_dir = Some(dir.path().to_path_buf());
        let state = create_test_state(config, MemoryAuthStore::default());
        let server = TestServer::new(build_router(&state).unwrap()).unwrap();

        let response = server.get("/").await;
        response.assert_status(StatusCode::OK);
        response.assert_text("<h1>admin</h1>");

        // API routes still win over the fallback
        server.get("/admin/api/users").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_metrics_endpoint_only_with_recorder() {
        let state = create_test_state(create_test_config(), MemoryAuthStore::default());
        let server = TestServer::new(build_router(&state).unwrap()).unwrap();
        server.get("/internal/metrics").await.assert_status(StatusCode::NOT_FOUND);

        let handle = PrometheusBuilder::new().build_recorder().handle();
        let state = AppState {
            metrics_recorder: Some(handle),
            ..state
        };
        let server = TestServer::new(build_router(&state).unwrap()).unwrap();
        server.get("/internal/metrics").await.assert_status(StatusCode::OK);
    }

    #[test_log::test(tokio::test)]
    async fn test_default_cors_allows_any_origin() {
        let state = create_test_state(create_test_config(), MemoryAuthStore::default());
        let server = TestServer::new(build_router(&state).unwrap()).unwrap();

        let response = server
            .method(Method::OPTIONS, "/api/login")
            .add_header("origin", "https://admin.example.com")
            .add_header("access-control-request-method", "POST")
            .await;
        assert_eq!(response.header("access-control-allow-origin").to_str().unwrap(), "*");
    }

    #[test_log::test(tokio::test)]
    async fn test_cors_with_explicit_origins() {
        let mut config = create_test_config();
        config.auth.cors.allowed_origins = vec![CorsOrigin::Url("https://admin.example.com/".parse().unwrap())];
        config.auth.cors.allow_credentials = true;
        let state = create_test_state(config, MemoryAuthStore::default());
        let server = TestServer::new(build_router(&state).unwrap()).unwrap();

        let response = server
            .method(Method::OPTIONS, "/api/login")
            .add_header("origin", "https://admin.example.com")
            .add_header("access-control-request-method", "POST")
            .await;
        assert_eq!(
            response.header("access-control-allow-origin").to_str().unwrap(),
            "https://admin.example.com"
        );
        assert_eq!(response.header("access-control-allow-credentials").to_str().unwrap(), "true");
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres database (DATABASE_URL)"]
    async fn test_initial_admin_user_is_idempotent(pool: PgPool) {
        let mut config = create_test_config();
        config.admin_password = Some("first-password".to_string());

        let id = create_initial_admin_user(&config, &pool).await.unwrap();
        let again = create_initial_admin_user(&config, &pool).await.unwrap();
        assert_eq!(id, again);

        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn).get_by_username("admin").await.unwrap().unwrap();
        assert!(user.has_role_named(&config.auth.super_admin_role));
        // Unchanged password: no session revocation on restart
        assert_eq!(user.token_version, 0);

        config.admin_password = Some("second-password".to_string());
        create_initial_admin_user(&config, &pool).await.unwrap();
        let user = Users::new(&mut conn).get_by_username("admin").await.unwrap().unwrap();
        assert_eq!(user.token_version, 1);
        assert!(password::verify_string("second-password", &user.password_hash).unwrap());
    }
}
