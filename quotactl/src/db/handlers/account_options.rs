//! Database repository for account options.
//!
//! Options rows are created together with their account (see [`super::Accounts`]) and are
//! never inserted or deleted on their own, so this repository only reads, locks and updates.

use crate::db::{
    errors::{DbError, Result},
    models::account_options::OptionsDBResponse,
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

pub struct AccountOptions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AccountOptions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&account_id)), err)]
    pub async fn get_for_account(&mut self, account_id: UserId) -> Result<Option<OptionsDBResponse>> {
        let options = sqlx::query_as::<_, OptionsDBResponse>("SELECT id, account_id, quota FROM account_options WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(options)
    }

    /// Read the options row and take a row lock held until the surrounding transaction ends.
    ///
    /// Must be called on a connection with an open transaction; outside one the lock is
    /// released as soon as the statement completes.
    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&account_id)), err)]
    pub async fn lock_for_account(&mut self, account_id: UserId) -> Result<Option<OptionsDBResponse>> {
        let options =
            sqlx::query_as::<_, OptionsDBResponse>("SELECT id, account_id, quota FROM account_options WHERE account_id = $1 FOR UPDATE")
                .bind(account_id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(options)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&account_id)), err)]
    pub async fn set_quota(&mut self, account_id: UserId, quota: Option<i64>) -> Result<OptionsDBResponse> {
        sqlx::query_as::<_, OptionsDBResponse>("UPDATE account_options SET quota = $2 WHERE account_id = $1 RETURNING id, account_id, quota")
            .bind(account_id)
            .bind(quota)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::NotFound)
    }
}
