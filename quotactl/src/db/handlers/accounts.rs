//! Database repository for accounts.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::accounts::{AccountCreateDBRequest, AccountDBResponse, AccountUpdateDBRequest},
};
use crate::types::{Operation, UserId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing accounts
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub skip: i64,
    /// `None` returns every remaining row
    pub limit: Option<i64>,
}

impl AccountFilter {
    pub fn new(skip: i64, limit: Option<i64>) -> Self {
        Self { skip, limit }
    }
}

pub struct Accounts<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Accounts<'c> {
    type CreateRequest = AccountCreateDBRequest;
    type Response = AccountDBResponse;
    type Id = UserId;
    type Filter = AccountFilter;

    /// Inserts the account and its options row atomically.
    #[instrument(skip(self, request), fields(email = %request.email, is_staff = request.is_staff), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let account_id = Uuid::new_v4();

        // Two tables are written, so regardless of the connection passed in we still need a transaction.
        let mut tx = self.db.begin().await?;

        let account = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            INSERT INTO accounts (id, email, password_hash, first_name, last_name, is_staff, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, email, password_hash, first_name, last_name, is_staff, is_active, created_at
            "#,
        )
        .bind(account_id)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.is_staff)
        .bind(request.is_active)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO account_options (id, account_id, quota) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(account_id)
            .bind(request.quota)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let account = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, is_staff, is_active, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self, filter), fields(limit = ?filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let accounts = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, is_staff, is_active, created_at
            FROM accounts
            ORDER BY created_at, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(accounts)
    }

    /// Deleting cascades to the options row and is refused while the account owns resources.
    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::ForeignKeyViolation { .. } => DbError::ProtectedEntity {
                    operation: Operation::DeleteAll,
                    reason: "account still owns resources".to_string(),
                    entity_type: "account".to_string(),
                    entity_id: Some(id.to_string()),
                },
                other => other,
            })?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> Accounts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, is_staff, is_active, created_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(account)
    }

    /// Apply the fields that are set; absent fields keep their stored value.
    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&id)), err)]
    pub async fn update(&mut self, id: UserId, request: &AccountUpdateDBRequest) -> Result<AccountDBResponse> {
        sqlx::query_as::<_, AccountDBResponse>(
            r#"
            UPDATE accounts SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                password_hash = COALESCE($4, password_hash)
            WHERE id = $1
            RETURNING id, email, password_hash, first_name, last_name, is_staff, is_active, created_at
            "#,
        )
        .bind(id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.password_hash)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)
    }
}
