//! # quotactl: multi-tenant resources with per-account quotas
//!
//! `quotactl` is a REST backend where accounts own resources, and staff can cap how many
//! resources each account may hold. Every account has exactly one options row carrying its
//! quota (`null` = unlimited).
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); all state lives in PostgreSQL
//! behind repository types in [`db`]. Requests authenticate with a JWT access token (see
//! [`auth`]) and are authorized either by a staff flag or by ownership of the row being touched.
//!
//! ### Quota enforcement
//!
//! Creating a resource and lowering a quota both run through [`quota`]: the owner's options row
//! is locked `FOR UPDATE`, the owner's resources are counted, and only then is the change
//! applied and committed. Concurrent creations for the same owner therefore serialize on the
//! options row and can never push the count past the quota.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use quotactl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = quotactl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     quotactl::telemetry::init_telemetry(config.log_format)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod quota;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::time::Duration;

use axum::{
    Router,
    http::{self, HeaderValue},
    routing::get,
};
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};
use uuid::Uuid;

pub use config::Config;
pub use types::{ResourceId, UserId};

use crate::{
    auth::password,
    config::{CorsOrigin, PoolSettings},
    db::{
        handlers::{Accounts, Repository},
        models::accounts::{AccountCreateDBRequest, AccountUpdateDBRequest},
    },
    openapi::ApiDoc,
};

/// Shared state handed to every handler.
///
/// ```ignore
/// let state = AppState::builder().db(pool).config(config).build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the quotactl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial staff account if it doesn't exist.
///
/// Idempotent: an existing account with `config.admin_email` keeps its id and only has its
/// password replaced when `admin_password` is set. A newly created admin without a configured
/// password gets a random one, so it cannot log in until a password is supplied.
#[instrument(skip_all, fields(email = %config.admin_email))]
pub async fn create_initial_admin_user(config: &Config, db: &PgPool) -> anyhow::Result<UserId> {
    let params = config.auth.password.argon2_params();
    let password_hash = match config.admin_password.clone() {
        Some(pwd) => Some(password::hash_password(pwd, params).await?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut accounts = Accounts::new(&mut tx);

    if let Some(existing) = accounts.get_by_email(&config.admin_email).await? {
        if password_hash.is_some() {
            accounts
                .update(
                    existing.id,
                    &AccountUpdateDBRequest {
                        password_hash,
                        ..Default::default()
                    },
                )
                .await?;
        }
        tx.commit().await?;
        debug!("Initial admin account already exists");
        return Ok(existing.id);
    }

    let password_hash = match password_hash {
        Some(hash) => hash,
        None => password::hash_password(Uuid::new_v4().to_string(), params).await?,
    };

    let created = accounts
        .create(&AccountCreateDBRequest {
            email: config.admin_email.clone(),
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            is_staff: true,
            is_active: true,
            quota: None,
        })
        .await?;

    tx.commit().await?;
    info!("Created initial admin account");
    Ok(created.id)
}

fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    let non_zero = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(non_zero(settings.idle_timeout_secs))
        .max_lifetime(non_zero(settings.max_lifetime_secs))
}

/// Connect, run migrations and make sure the initial admin exists.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    info!("Connecting to database");
    let pool = pool_options(&config.database.pool).connect(&config.database.url).await?;
    migrator().run(&pool).await?;
    create_initial_admin_user(config, &pool).await?;
    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let configured = &config.auth.security.cors.allowed_origins;
    let allow_origin = if configured.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in configured {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the router: API routes under `/api/v1`, health check, docs, tracing and CORS.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, resources, users};

    let api_routes = Router::new()
        .route("/auth/register", axum::routing::post(auth::register))
        .route("/auth/login", axum::routing::post(auth::login))
        // Own profile
        .route("/users/me", get(users::get_me).put(users::update_me).patch(users::update_me))
        // Account management (staff only)
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", get(users::get_user).delete(users::delete_user))
        .route(
            "/users/{id}/options",
            get(users::get_user_options)
                .put(users::update_user_options)
                .patch(users::update_user_options),
        )
        // Resources
        .route("/resources", get(resources::list_resources).post(resources::create_resource))
        .route("/resources/{id}", get(resources::get_resource).delete(resources::delete_resource))
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes);

    if state.config.enable_docs {
        let doc = ApiDoc::openapi();
        let json = axum::Json(doc.clone());
        router = router
            .route("/api/v1/openapi.json", get(move || std::future::ready(json.clone())))
            .merge(Scalar::with_url("/api/docs", doc));
    }

    let router = router.layer(create_cors_layer(&state.config)?).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled service: database pool, state and router.
///
/// 1. [`Application::new`] connects, migrates and bootstraps the admin account
/// 2. [`Application::serve`] binds the configured address and serves until the shutdown future
///    resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting quotactl with configuration: {:#?}", config);
        let pool = setup_database(&config).await?;
        Self::new_with_pool(config, pool)
    }

    /// Build on an already migrated pool.
    pub fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(state)?;
        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("quotactl listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        api::models::auth::TokenPairResponse,
        db::handlers::AccountOptions,
        test_utils::*,
    };
    use serde_json::json;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_initial_admin_user_new_user(pool: PgPool) {
        let mut config = create_test_config();
        config.admin_email = "new-admin@example.com".to_string();
        config.admin_password = Some("bootstrap-password".to_string());

        let id = create_initial_admin_user(&config, &pool).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let account = Accounts::new(&mut conn).get_by_email("new-admin@example.com").await.unwrap().unwrap();
        assert_eq!(account.id, id);
        assert!(account.is_staff);
        assert!(account.is_active);
        assert!(password::verify_string("bootstrap-password", &account.password_hash).unwrap());

        let options = AccountOptions::new(&mut conn).get_for_account(id).await.unwrap().unwrap();
        assert_eq!(options.quota, None);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_initial_admin_user_is_idempotent(pool: PgPool) {
        let mut config = create_test_config();
        config.admin_email = "existing-admin@example.com".to_string();
        config.admin_password = None;

        let first = create_initial_admin_user(&config, &pool).await.unwrap();
        let second = create_initial_admin_user(&config, &pool).await.unwrap();
        assert_eq!(first, second);

        // A configured password replaces the stored one on the next start
        config.admin_password = Some("rotated-password".to_string());
        let third = create_initial_admin_user(&config, &pool).await.unwrap();
        assert_eq!(first, third);

        let mut conn = pool.acquire().await.unwrap();
        let account = Accounts::new(&mut conn).get_by_id(first).await.unwrap().unwrap();
        assert!(password::verify_string("rotated-password", &account.password_hash).unwrap());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE email = $1")
            .bind("existing-admin@example.com")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_application_integration(pool: PgPool) {
        let mut config = create_test_config();
        config.admin_email = "root@example.com".to_string();
        config.admin_password = Some("root-password".to_string());
        create_initial_admin_user(&config, &pool).await.unwrap();

        let server = Application::new_with_pool(config, pool).unwrap().into_test_server();

        let health = server.get("/healthz").await;
        health.assert_status_ok();
        assert_eq!(health.text(), "OK");

        // API routes require a token
        server.get("/api/v1/users").await.assert_status_unauthorized();

        // The bootstrapped admin can log in and list accounts
        let tokens: TokenPairResponse = server
            .post("/api/v1/auth/login")
            .json(&json!({"email": "root@example.com", "password": "root-password"}))
            .await
            .json();
        server
            .get("/api/v1/users")
            .authorization_bearer(tokens.access)
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_docs_toggle(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let response = app.get("/api/v1/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/resources"].is_object());

        let mut config = create_test_config();
        config.enable_docs = false;
        let app = create_test_app_with_config(pool, config).await;
        app.get("/api/v1/openapi.json").await.assert_status_not_found();
        app.get("/api/docs").await.assert_status_not_found();
    }

    #[sqlx::test]
    async fn test_cors_preflight(pool: PgPool) {
        use tower::ServiceExt;

        let router = build_router(create_test_state(pool)).unwrap();
        let request = http::Request::builder()
            .method(http::Method::OPTIONS)
            .uri("/api/v1/resources")
            .header(http::header::ORIGIN, "https://app.example.com")
            .header(http::header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[http::header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn test_cors_layer_from_config() {
        let mut config = create_test_config();
        assert!(create_cors_layer(&config).is_ok());

        config.auth.security.cors.allowed_origins = vec![CorsOrigin::Url("https://app.example.com/".parse().unwrap())];
        config.auth.security.cors.allow_credentials = true;
        assert!(create_cors_layer(&config).is_ok());
    }
}
