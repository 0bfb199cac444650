use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::{
    AppState,
    api::{
        json::JsonBody,
        models::{
            auth::{LoginRequest, RegisterRequest, TokenPairResponse},
            users::CurrentUser,
            validation::{FieldValidator, MAX_FIRST_NAME_LENGTH, MAX_LAST_NAME_LENGTH},
        },
    },
    auth::{current_user::has_valid_access_token, password, session},
    config::Config,
    db::{
        handlers::{Accounts, Repository},
        models::accounts::AccountCreateDBRequest,
    },
    errors::{Error, Result},
    types::{Operation, Permission, Resource},
};

const INVALID_CREDENTIALS: &str = "No active account found with the given credentials";

/// Field checks shared by self-registration and staff account creation.
pub(crate) fn validate_new_account(email: &str, password: &str, first_name: &str, last_name: &str, config: &Config) -> Result<()> {
    let mut validator = FieldValidator::default();
    validator.email("email", email);
    validator.extend("password", password::validate_password(password, email, &config.auth.password));
    validator.max_chars("first_name", first_name, MAX_FIRST_NAME_LENGTH);
    validator.max_chars("last_name", last_name, MAX_LAST_NAME_LENGTH);
    validator.finish()
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "authentication",
    summary = "Register",
    description = "Create a regular account with unlimited quota and return a token pair. Not available to authenticated callers.",
    responses(
        (status = 201, description = "Account created", body = TokenPairResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 403, description = "Caller is already authenticated", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenPairResponse>)> {
    if has_valid_access_token(&headers, &state.config) {
        return Err(Error::InsufficientPermissions {
            required: Permission::Allow(Resource::Users, Operation::CreateOwn),
            action: Operation::CreateOwn,
            resource: "an account while authenticated".to_string(),
        });
    }

    if !state.config.auth.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let email = request.email.trim().to_string();
    validate_new_account(&email, &request.password, &request.first_name, &request.last_name, &state.config)?;

    let password_hash = password::hash_password(request.password, state.config.auth.password.argon2_params()).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = Accounts::new(&mut conn)
        .create(&AccountCreateDBRequest {
            email,
            password_hash,
            first_name: request.first_name,
            last_name: request.last_name,
            is_staff: false,
            is_active: true,
            quota: None,
        })
        .await?;

    let tokens = session::create_token_pair(&CurrentUser::from(account), &state.config)?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    summary = "Login",
    responses(
        (status = 201, description = "Token pair issued", body = TokenPairResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, JsonBody(request): JsonBody<LoginRequest>) -> Result<(StatusCode, Json<TokenPairResponse>)> {
    let invalid = || Error::Unauthenticated {
        message: Some(INVALID_CREDENTIALS.to_string()),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = Accounts::new(&mut conn)
        .get_by_email(request.email.trim())
        .await?
        .ok_or_else(invalid)?;

    let is_valid = password::verify_password(request.password, account.password_hash.clone()).await?;
    if !is_valid || !account.is_active {
        return Err(invalid());
    }

    let tokens = session::create_token_pair(&CurrentUser::from(account), &state.config)?;
    Ok((StatusCode::CREATED, Json(tokens)))
}
