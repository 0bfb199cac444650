//! Database repository for resources.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::resources::{ResourceCreateDBRequest, ResourceDBResponse},
};
use crate::types::{ResourceId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing resources.
///
/// `owner_id` is the filter the caller asked for; `restrict_to` is the scope imposed on
/// non-staff callers. Both must match, so a non-staff caller asking for someone else's
/// rows gets nothing back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    pub owner_id: Option<UserId>,
    pub restrict_to: Option<UserId>,
    pub skip: i64,
    /// `None` returns every remaining row
    pub limit: Option<i64>,
}

pub struct Resources<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Resources<'c> {
    type CreateRequest = ResourceCreateDBRequest;
    type Response = ResourceDBResponse;
    type Id = ResourceId;
    type Filter = ResourceFilter;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let resource = sqlx::query_as::<_, ResourceDBResponse>(
            r#"
            INSERT INTO resources (id, name, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, owner_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(request.owner_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(resource)
    }

    #[instrument(skip(self), fields(resource_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let resource = sqlx::query_as::<_, ResourceDBResponse>("SELECT id, name, owner_id, created_at FROM resources WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(resource)
    }

    #[instrument(skip(self, filter), fields(owner_id = ?filter.owner_id, restrict_to = ?filter.restrict_to), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let resources = sqlx::query_as::<_, ResourceDBResponse>(
            r#"
            SELECT id, name, owner_id, created_at
            FROM resources
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND ($2::uuid IS NULL OR owner_id = $2)
            ORDER BY created_at, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.owner_id)
        .bind(filter.restrict_to)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(resources)
    }

    #[instrument(skip(self), fields(resource_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM resources WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> Resources<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(owner_id = %abbrev_uuid(&owner_id)), err)]
    pub async fn count_for_owner(&mut self, owner_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resources WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}
