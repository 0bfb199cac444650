//! Test utilities shared by the handler and repository tests.

use axum::http::{HeaderName, HeaderValue, header};
use axum_test::TestServer;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{
        password::{self, Argon2Params},
        session::{self, TokenType},
    },
    config::{Config, PoolSettings},
    db::{
        handlers::{Accounts, Repository, Resources},
        models::{
            accounts::AccountCreateDBRequest,
            resources::{ResourceCreateDBRequest, ResourceDBResponse},
        },
    },
};

/// Password of every account created by [`create_test_user`] and [`create_test_admin_user`].
pub const TEST_PASSWORD: &str = "test-password-123";

/// Deliberately weak hashing parameters so tests stay fast.
const TEST_ARGON2: Argon2Params = Argon2Params {
    memory_kib: 1024,
    iterations: 1,
    parallelism: 1,
};

pub fn create_test_config() -> Config {
    let mut config = Config {
        secret_key: Some("test-secret-key-for-signing-tokens".to_string()),
        admin_email: "admin@test.example.com".to_string(),
        enable_docs: true,
        ..Default::default()
    };
    config.database.pool = PoolSettings {
        max_connections: 2,
        min_connections: 0,
        ..Default::default()
    };
    config.auth.password.argon2_memory_kib = TEST_ARGON2.memory_kib;
    config.auth.password.argon2_iterations = TEST_ARGON2.iterations;
    config.auth.password.argon2_parallelism = TEST_ARGON2.parallelism;
    config
}

pub fn create_test_state(pool: PgPool) -> AppState {
    AppState::builder().db(pool).config(create_test_config()).build()
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> TestServer {
    crate::Application::new_with_pool(config, pool)
        .expect("Failed to create application")
        .into_test_server()
}

async fn insert_account(pool: &PgPool, is_staff: bool, quota: Option<i64>) -> CurrentUser {
    let prefix = if is_staff { "admin" } else { "user" };
    let password_hash = password::hash_string_with_params(TEST_PASSWORD, TEST_ARGON2).expect("Failed to hash test password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let account = Accounts::new(&mut conn)
        .create(&AccountCreateDBRequest {
            email: format!("{prefix}-{}@example.com", Uuid::new_v4().simple()),
            password_hash,
            first_name: "Test".to_string(),
            last_name: prefix.to_string(),
            is_staff,
            is_active: true,
            quota,
        })
        .await
        .expect("Failed to create test account");

    CurrentUser::from(account)
}

/// A regular account with the given quota (`None` = unlimited).
pub async fn create_test_user(pool: &PgPool, quota: Option<i64>) -> CurrentUser {
    insert_account(pool, false, quota).await
}

pub async fn create_test_admin_user(pool: &PgPool) -> CurrentUser {
    insert_account(pool, true, None).await
}

/// Insert `count` resources for `owner` directly, bypassing the quota check.
pub async fn create_test_resources(pool: &PgPool, owner: crate::UserId, count: usize) -> Vec<ResourceDBResponse> {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = Resources::new(&mut conn);

    let mut created = Vec::with_capacity(count);
    for i in 0..count {
        let resource = repo
            .create(&ResourceCreateDBRequest {
                owner_id: owner,
                name: format!("resource-{i}"),
            })
            .await
            .expect("Failed to create test resource");
        created.push(resource);
    }
    created
}

/// `Authorization: Bearer <access token>` for `user`, signed with [`create_test_config`].
pub fn add_auth_headers(user: &CurrentUser) -> (HeaderName, HeaderValue) {
    let token = session::create_token(user, TokenType::Access, &create_test_config()).expect("Failed to create test token");
    let value = HeaderValue::from_str(&format!("Bearer {token}")).expect("Invalid header value");
    (header::AUTHORIZATION, value)
}
