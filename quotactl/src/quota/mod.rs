//! Quota enforcement for resource creation and quota changes.
//!
//! Every quota-relevant decision runs inside a [`QuotaUnitOfWork`]: the owner's options row
//! is locked first, the live resource count is read under that lock, and the write is
//! committed only if the count check passes. Two requests for the same owner therefore
//! serialize on the lock, while requests for different owners never contend.
//!
//! ```text
//! begin ─► lock_options(owner) ─► get_resource_count(owner) ─► check ─┬─► write ─► commit
//!                                                                     └─► reject (drop = rollback)
//! ```
//!
//! [`postgres::PgUnitOfWork`] implements the contract with a database transaction holding a
//! `SELECT ... FOR UPDATE` row lock on `account_options`. Tests additionally get
//! `memory::MemoryQuotaStore`, an in-process store with one async mutex per owner.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use crate::api::models::users::CurrentUser;
use crate::db::{
    errors::{DbError, Result as DbResult},
    models::{account_options::OptionsDBResponse, resources::ResourceDBResponse},
};
use crate::errors::Error;
use crate::types::{UserId, abbrev_uuid};
use thiserror::Error as ThisError;
use tracing::{debug, instrument};

#[cfg(test)]
pub use memory::MemoryQuotaStore;
pub use postgres::PgUnitOfWork;

/// Message attached to the `quota` field when a change would undercut current usage
pub const QUOTA_BELOW_USAGE: &str = "quota cannot be less than current number of resources";

/// Data access needed by the quota guard, scoped to one atomic unit of work.
///
/// Locks taken by [`lock_options`](QuotaUnitOfWork::lock_options) are held until the unit of
/// work is committed or dropped. Dropping without committing discards every write.
#[async_trait::async_trait]
pub trait QuotaUnitOfWork: Send {
    /// Lock the owner's options row. `None` when the account does not exist.
    async fn lock_options(&mut self, owner: UserId) -> DbResult<Option<OptionsDBResponse>>;

    /// Number of resources currently owned, including writes made in this unit of work.
    async fn get_resource_count(&mut self, owner: UserId) -> DbResult<i64>;

    async fn insert_resource(&mut self, owner: UserId, name: &str) -> DbResult<ResourceDBResponse>;

    async fn update_quota(&mut self, owner: UserId, quota: Option<i64>) -> DbResult<OptionsDBResponse>;

    /// Make every write visible and release the locks.
    async fn commit(self) -> DbResult<()>;
}

/// Rejections produced by the quota guard
#[derive(ThisError, Debug)]
pub enum QuotaError {
    /// The owner already holds as many resources as their quota allows
    #[error("Maximum number of resources is reached: {quota}")]
    QuotaExceeded { quota: i64 },

    /// The requested quota is below the account's current resource count
    #[error("{QUOTA_BELOW_USAGE} (quota {quota}, current {current})")]
    QuotaViolation { quota: i64, current: i64 },

    /// Quotas are non-negative
    #[error("quota must not be negative, got {0}")]
    NegativeQuota(i64),

    /// A staff caller named an owner that does not exist
    #[error("owner {0} does not exist")]
    OwnerNotFound(UserId),

    /// The account whose quota is being changed does not exist
    #[error("account {0} not found")]
    AccountNotFound(UserId),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<QuotaError> for Error {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::QuotaExceeded { quota } => Error::QuotaExceeded { quota },
            QuotaError::QuotaViolation { .. } => Error::field("quota", QUOTA_BELOW_USAGE),
            QuotaError::NegativeQuota(_) => Error::field("quota", "Ensure this value is greater than or equal to 0."),
            QuotaError::OwnerNotFound(id) => Error::field("owner_id", format!("Invalid pk \"{id}\" - object does not exist.")),
            QuotaError::AccountNotFound(id) => Error::NotFound {
                resource: "User".to_string(),
                id: id.to_string(),
            },
            QuotaError::Database(e) => Error::Database(e),
        }
    }
}

/// Decide who owns a resource being created.
///
/// Non-staff callers always own what they create, whatever owner they asked for. Staff
/// callers may create on behalf of any account and default to themselves.
pub fn resolve_effective_owner(caller: &CurrentUser, requested_owner: Option<UserId>) -> UserId {
    if caller.is_staff {
        requested_owner.unwrap_or(caller.id)
    } else {
        caller.id
    }
}

/// Create a resource if the effective owner's quota allows it.
///
/// Succeeds iff the owner's quota is unset or their current count is strictly below it.
#[instrument(skip(uow, caller, name), fields(caller = %abbrev_uuid(&caller.id)))]
pub async fn authorize_resource_creation<U: QuotaUnitOfWork>(
    mut uow: U,
    caller: &CurrentUser,
    requested_owner: Option<UserId>,
    name: &str,
) -> Result<ResourceDBResponse, QuotaError> {
    let owner = resolve_effective_owner(caller, requested_owner);

    let options = uow.lock_options(owner).await?.ok_or(QuotaError::OwnerNotFound(owner))?;
    let count = uow.get_resource_count(owner).await?;

    if let Some(quota) = options.quota
        && count >= quota
    {
        debug!(owner = %abbrev_uuid(&owner), count, quota, "resource creation rejected");
        return Err(QuotaError::QuotaExceeded { quota });
    }

    let resource = uow.insert_resource(owner, name).await?;
    uow.commit().await?;

    debug!(owner = %abbrev_uuid(&owner), count = count + 1, "resource created");
    Ok(resource)
}

/// Change an account's quota unless it would fall below the account's current usage.
///
/// Only the quota is applied. Staff privilege is checked by the caller of this function.
#[instrument(skip(uow), fields(target = %abbrev_uuid(&target)))]
pub async fn authorize_quota_change<U: QuotaUnitOfWork>(
    mut uow: U,
    target: UserId,
    new_quota: Option<i64>,
) -> Result<OptionsDBResponse, QuotaError> {
    if let Some(quota) = new_quota
        && quota < 0
    {
        return Err(QuotaError::NegativeQuota(quota));
    }

    uow.lock_options(target).await?.ok_or(QuotaError::AccountNotFound(target))?;
    let current = uow.get_resource_count(target).await?;

    if let Some(quota) = new_quota
        && current > quota
    {
        return Err(QuotaError::QuotaViolation { quota, current });
    }

    let options = uow.update_quota(target, new_quota).await?;
    uow.commit().await?;

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::time::Duration;
    use uuid::Uuid;

    fn caller(id: UserId, is_staff: bool) -> CurrentUser {
        CurrentUser {
            id,
            email: format!("{}@example.com", id.simple()),
            is_staff,
        }
    }

    #[test]
    fn test_resolve_effective_owner() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(resolve_effective_owner(&caller(me, false), None), me);
        assert_eq!(resolve_effective_owner(&caller(me, false), Some(other)), me);
        assert_eq!(resolve_effective_owner(&caller(me, true), None), me);
        assert_eq!(resolve_effective_owner(&caller(me, true), Some(other)), other);
    }

    #[tokio::test]
    async fn test_creation_succeeds_below_quota() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(Some(2));
        let user = caller(owner, false);

        let first = authorize_resource_creation(store.begin(), &user, None, "one").await.unwrap();
        assert_eq!(first.owner_id, owner);
        authorize_resource_creation(store.begin(), &user, None, "two").await.unwrap();

        assert_eq!(store.resource_count(owner), 2);
    }

    #[tokio::test]
    async fn test_creation_rejected_at_quota() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(Some(2));
        store.seed_resources(owner, 2);

        let err = authorize_resource_creation(store.begin(), &caller(owner, false), None, "three")
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::QuotaExceeded { quota: 2 }));
        assert_eq!(store.resource_count(owner), 2);

        let api_err = Error::from(err);
        assert_eq!(api_err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(api_err.body().quota, Some(2));
    }

    #[tokio::test]
    async fn test_zero_quota_blocks_everything() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(Some(0));

        let err = authorize_resource_creation(store.begin(), &caller(owner, false), None, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::QuotaExceeded { quota: 0 }));
    }

    #[tokio::test]
    async fn test_unlimited_quota_always_succeeds() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(None);
        store.seed_resources(owner, 50);

        authorize_resource_creation(store.begin(), &caller(owner, false), None, "more")
            .await
            .unwrap();
        assert_eq!(store.resource_count(owner), 51);
    }

    #[tokio::test]
    async fn test_non_staff_requested_owner_is_ignored() {
        let store = MemoryQuotaStore::new();
        let me = store.add_account(None);
        let victim = store.add_account(Some(0));

        let resource = authorize_resource_creation(store.begin(), &caller(me, false), Some(victim), "mine")
            .await
            .unwrap();
        assert_eq!(resource.owner_id, me);
        assert_eq!(store.resource_count(victim), 0);
    }

    #[tokio::test]
    async fn test_staff_creation_counts_against_target_owner() {
        let store = MemoryQuotaStore::new();
        let admin = store.add_account(None);
        let target = store.add_account(Some(1));
        let staff = caller(admin, true);

        let resource = authorize_resource_creation(store.begin(), &staff, Some(target), "for target")
            .await
            .unwrap();
        assert_eq!(resource.owner_id, target);

        let err = authorize_resource_creation(store.begin(), &staff, Some(target), "again")
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::QuotaExceeded { quota: 1 }));
        assert_eq!(store.resource_count(admin), 0);
    }

    #[tokio::test]
    async fn test_staff_unknown_owner() {
        let store = MemoryQuotaStore::new();
        let admin = store.add_account(None);
        let ghost = Uuid::new_v4();

        let err = authorize_resource_creation(store.begin(), &caller(admin, true), Some(ghost), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::OwnerNotFound(id) if id == ghost));
        assert_eq!(Error::from(err).status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creations_respect_quota() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(Some(1));
        let user = caller(owner, false);

        let tasks = (0..16).map(|i| {
            let store = store.clone();
            let user = user.clone();
            tokio::spawn(async move { authorize_resource_creation(store.begin(), &user, None, &format!("r{i}")).await })
        });

        let results: Vec<_> = futures::future::join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let rejections = results
            .iter()
            .filter(|r| matches!(r, Err(QuotaError::QuotaExceeded { quota: 1 })))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(rejections, 15);
        assert_eq!(store.resource_count(owner), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_and_quota_lowering() {
        for _ in 0..20 {
            let store = MemoryQuotaStore::new();
            let owner = store.add_account(None);
            store.seed_resources(owner, 2);
            let user = caller(owner, false);

            let lower = {
                let store = store.clone();
                tokio::spawn(async move { authorize_quota_change(store.begin(), owner, Some(2)).await })
            };
            let creations = (0..8).map(|i| {
                let store = store.clone();
                let user = user.clone();
                tokio::spawn(async move { authorize_resource_creation(store.begin(), &user, None, &format!("r{i}")).await })
            });

            let created = futures::future::join_all(creations)
                .await
                .into_iter()
                .filter(|r| r.as_ref().unwrap().is_ok())
                .count() as i64;
            let lowered = lower.await.unwrap();
            let count = store.resource_count(owner);
            assert_eq!(count, 2 + created);

            match lowered {
                Ok(options) => {
                    assert_eq!(options.quota, Some(2));
                    assert_eq!(store.quota(owner), Some(Some(2)));
                    assert_eq!(count, 2, "no creation may land after the quota was lowered");
                }
                Err(QuotaError::QuotaViolation { quota: 2, current }) => {
                    assert!(current > 2);
                    assert_eq!(store.quota(owner), Some(None));
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_owners_do_not_contend() {
        let store = MemoryQuotaStore::new();
        let alice = store.add_account(None);
        let bob = store.add_account(None);

        // Hold Alice's lock for the whole test
        let mut held = store.begin();
        held.lock_options(alice).await.unwrap();

        let created = tokio::time::timeout(
            Duration::from_secs(1),
            authorize_resource_creation(store.begin(), &caller(bob, false), None, "bob's"),
        )
        .await
        .expect("creation for another owner must not wait on the held lock")
        .unwrap();
        assert_eq!(created.owner_id, bob);

        let blocked = tokio::time::timeout(
            Duration::from_millis(100),
            authorize_resource_creation(store.begin(), &caller(alice, false), None, "alice's"),
        )
        .await;
        assert!(blocked.is_err(), "same-owner creation must wait for the held lock");
        drop(held);
    }

    #[tokio::test]
    async fn test_quota_change_accepted_at_or_above_usage() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(None);
        store.seed_resources(owner, 3);

        let options = authorize_quota_change(store.begin(), owner, Some(5)).await.unwrap();
        assert_eq!(options.quota, Some(5));

        let options = authorize_quota_change(store.begin(), owner, Some(3)).await.unwrap();
        assert_eq!(options.quota, Some(3));

        let options = authorize_quota_change(store.begin(), owner, None).await.unwrap();
        assert_eq!(options.quota, None);
        assert_eq!(store.quota(owner), Some(None));
    }

    #[tokio::test]
    async fn test_quota_change_below_usage_rejected() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(Some(5));
        store.seed_resources(owner, 3);

        let err = authorize_quota_change(store.begin(), owner, Some(2)).await.unwrap_err();
        assert!(matches!(err, QuotaError::QuotaViolation { quota: 2, current: 3 }));
        assert_eq!(store.quota(owner), Some(Some(5)));

        let body = Error::from(err).body();
        assert_eq!(body.code, "invalid");
        assert_eq!(body.fields.unwrap()["quota"], vec![QUOTA_BELOW_USAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_quota_change_negative_and_missing() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(None);

        let err = authorize_quota_change(store.begin(), owner, Some(-1)).await.unwrap_err();
        assert!(matches!(err, QuotaError::NegativeQuota(-1)));

        let ghost = Uuid::new_v4();
        let err = authorize_quota_change(store.begin(), ghost, Some(1)).await.unwrap_err();
        assert!(matches!(err, QuotaError::AccountNotFound(id) if id == ghost));
        assert_eq!(Error::from(err).status_code(), StatusCode::NOT_FOUND);
    }
}
