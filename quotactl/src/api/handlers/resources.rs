use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::{
        json::JsonBody,
        models::{
            resources::{ListResourcesQuery, ResourceCreate, ResourceResponse},
            users::CurrentUser,
        },
    },
    auth::permissions::{check_resource_access, scope_resource_filter},
    db::handlers::{Repository, Resources},
    errors::{Error, Result},
    quota::{self, PgUnitOfWork},
    types::{Operation, ResourceId},
};

fn resource_not_found(id: ResourceId) -> Error {
    Error::NotFound {
        resource: "Resource".to_string(),
        id: id.to_string(),
    }
}

/// List resources visible to the caller.
///
/// Regular accounts only ever see their own resources; an `owner_id` naming someone else
/// returns an empty list. Staff see everything, optionally narrowed by `owner_id`.
#[utoipa::path(
    get,
    path = "/resources",
    tag = "resources",
    summary = "List resources",
    params(ListResourcesQuery),
    responses(
        (status = 200, description = "Resources", body = [ResourceResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<ListResourcesQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ResourceResponse>>> {
    let filter = scope_resource_filter(&current_user, query.owner_id, &query.pagination);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let resources = Resources::new(&mut conn).list(&filter).await?;

    Ok(Json(resources.into_iter().map(ResourceResponse::from).collect()))
}

/// Create a resource, subject to the owner's quota.
///
/// Regular accounts always own what they create. Staff may pass `owner_id` to create on
/// behalf of another account, in which case that account's quota applies.
#[utoipa::path(
    post,
    path = "/resources",
    request_body = ResourceCreate,
    tag = "resources",
    summary = "Create resource",
    responses(
        (status = 201, description = "Resource created", body = ResourceResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Quota reached", body = crate::errors::ErrorBody),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_resource(
    State(state): State<AppState>,
    current_user: CurrentUser,
    JsonBody(create): JsonBody<ResourceCreate>,
) -> Result<(StatusCode, Json<ResourceResponse>)> {
    create.validate()?;

    let uow = PgUnitOfWork::begin(&state.db).await?;
    let resource = quota::authorize_resource_creation(uow, &current_user, create.owner_id, create.name.trim()).await?;

    Ok((StatusCode::CREATED, Json(ResourceResponse::from(resource))))
}

/// Get a resource the caller owns (or any resource, for staff)
#[utoipa::path(
    get,
    path = "/resources/{id}",
    tag = "resources",
    summary = "Get resource",
    params(("id" = uuid::Uuid, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Resource", body = ResourceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Owned by another account"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    current_user: CurrentUser,
) -> Result<Json<ResourceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let resource = Resources::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| resource_not_found(id))?;

    check_resource_access(&current_user, &resource, Operation::ReadOwn)?;

    Ok(Json(ResourceResponse::from(resource)))
}

/// Delete a resource the caller owns (or any resource, for staff)
#[utoipa::path(
    delete,
    path = "/resources/{id}",
    tag = "resources",
    summary = "Delete resource",
    params(("id" = uuid::Uuid, Path, description = "Resource ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Owned by another account"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_resource(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Resources::new(&mut tx);

    let resource = repo.get_by_id(id).await?.ok_or_else(|| resource_not_found(id))?;
    check_resource_access(&current_user, &resource, Operation::DeleteOwn)?;

    if !repo.delete(id).await? {
        return Err(resource_not_found(id));
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}
