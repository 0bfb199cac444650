//! Postgres-backed unit of work for the quota guard.

use super::QuotaUnitOfWork;
use crate::db::{
    errors::Result,
    handlers::{AccountOptions, Repository, Resources},
    models::{account_options::OptionsDBResponse, resources::ResourceCreateDBRequest, resources::ResourceDBResponse},
};
use crate::types::UserId;
use sqlx::{PgPool, Postgres, Transaction};

/// A database transaction. Options rows are locked with `SELECT ... FOR UPDATE`, so the
/// locks live exactly as long as the transaction; dropping it rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        Ok(Self { tx: pool.begin().await? })
    }
}

#[async_trait::async_trait]
impl QuotaUnitOfWork for PgUnitOfWork {
    async fn lock_options(&mut self, owner: UserId) -> Result<Option<OptionsDBResponse>> {
        AccountOptions::new(&mut self.tx).lock_for_account(owner).await
    }

    async fn get_resource_count(&mut self, owner: UserId) -> Result<i64> {
        Resources::new(&mut self.tx).count_for_owner(owner).await
    }

    async fn insert_resource(&mut self, owner: UserId, name: &str) -> Result<ResourceDBResponse> {
        Resources::new(&mut self.tx)
            .create(&ResourceCreateDBRequest {
                owner_id: owner,
                name: name.to_string(),
            })
            .await
    }

    async fn update_quota(&mut self, owner: UserId, quota: Option<i64>) -> Result<OptionsDBResponse> {
        AccountOptions::new(&mut self.tx).set_quota(owner, quota).await
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
