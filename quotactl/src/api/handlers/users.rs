use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::{
        handlers::auth::validate_new_account,
        json::JsonBody,
        models::users::{
            CurrentUser, ListUsersQuery, OptionsResponse, OptionsUpdate, ProfileResponse, ProfileUpdate, UserCreate, UserResponse,
        },
    },
    auth::{
        password,
        permissions::{RequiresPermission, operation, resource},
    },
    db::{
        handlers::{AccountOptions, Accounts, Repository, accounts::AccountFilter},
        models::accounts::{AccountCreateDBRequest, AccountUpdateDBRequest},
    },
    errors::{Error, Result},
    quota::{self, PgUnitOfWork},
    types::UserId,
};

fn user_not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

/// Get the caller's own profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    summary = "Get own profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ProfileResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = Accounts::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| user_not_found(current_user.id))?;

    Ok(Json(ProfileResponse::from(account)))
}

/// Update the caller's own profile.
///
/// Only `first_name` and `last_name` are applied; any other field is ignored.
#[utoipa::path(
    method(put, patch),
    path = "/users/me",
    request_body = ProfileUpdate,
    tag = "users",
    summary = "Update own profile",
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_me(
    State(state): State<AppState>,
    current_user: CurrentUser,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    update.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = Accounts::new(&mut conn)
        .update(
            current_user.id,
            &AccountUpdateDBRequest {
                first_name: update.first_name,
                last_name: update.last_name,
                password_hash: None,
            },
        )
        .await?;

    Ok(Json(ProfileResponse::from(account)))
}

/// List accounts
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Accounts", body = [UserResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff only"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Users, operation::ReadAll>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let accounts = Accounts::new(&mut conn)
        .list(&AccountFilter::new(query.pagination.skip(), query.pagination.limit()))
        .await?;

    Ok(Json(accounts.into_iter().map(UserResponse::from).collect()))
}

/// Create an account (staff only). New accounts start with unlimited quota.
#[utoipa::path(
    post,
    path = "/users",
    request_body = UserCreate,
    tag = "users",
    summary = "Create user",
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff only"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Users, operation::CreateAll>,
    JsonBody(create): JsonBody<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let email = create.email.trim().to_string();
    validate_new_account(&email, &create.password, &create.first_name, &create.last_name, &state.config)?;

    let password_hash = password::hash_password(create.password, state.config.auth.password.argon2_params()).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = Accounts::new(&mut conn)
        .create(&AccountCreateDBRequest {
            email,
            password_hash,
            first_name: create.first_name,
            last_name: create.last_name,
            is_staff: create.is_staff,
            is_active: true,
            quota: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(account))))
}

/// Get an account by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get user",
    params(("id" = uuid::Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Users, operation::ReadAll>,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = Accounts::new(&mut conn).get_by_id(id).await?.ok_or_else(|| user_not_found(id))?;

    Ok(Json(UserResponse::from(account)))
}

/// Delete an account. Refused with `409` while the account still owns resources.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    summary = "Delete user",
    params(("id" = uuid::Uuid, Path, description = "Account ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Account still owns resources", body = crate::errors::ErrorBody),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Users, operation::DeleteAll>,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Accounts::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(user_not_found(id))
    }
}

/// Get an account's options
#[utoipa::path(
    get,
    path = "/users/{id}/options",
    tag = "users",
    summary = "Get user options",
    params(("id" = uuid::Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Options", body = OptionsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user_options(
    State(state): State<AppState>,
    _: RequiresPermission<resource::AccountOptions, operation::ReadAll>,
    Path(id): Path<UserId>,
) -> Result<Json<OptionsResponse>> {
    load_options(&state, id).await.map(Json)
}

async fn load_options(state: &AppState, id: UserId) -> Result<OptionsResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let options = AccountOptions::new(&mut conn)
        .get_for_account(id)
        .await?
        .ok_or_else(|| user_not_found(id))?;

    Ok(OptionsResponse::from(options))
}

/// Change an account's quota.
///
/// Rejected when the new quota is below the account's current number of resources. An absent
/// `quota` leaves the options unchanged; `null` removes the limit.
#[utoipa::path(
    method(put, patch),
    path = "/users/{id}/options",
    request_body = OptionsUpdate,
    tag = "users",
    summary = "Update user options",
    params(("id" = uuid::Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Updated options", body = OptionsResponse),
        (status = 400, description = "Quota below current usage", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user_options(
    State(state): State<AppState>,
    _: RequiresPermission<resource::AccountOptions, operation::UpdateAll>,
    Path(id): Path<UserId>,
    JsonBody(update): JsonBody<OptionsUpdate>,
) -> Result<Json<OptionsResponse>> {
    let Some(new_quota) = update.quota else {
        return load_options(&state, id).await.map(Json);
    };

    let uow = PgUnitOfWork::begin(&state.db).await?;
    let options = quota::authorize_quota_change(uow, id, new_quota).await?;

    Ok(Json(OptionsResponse::from(options)))
}
