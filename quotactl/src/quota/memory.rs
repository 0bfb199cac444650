//! In-process quota store used by the quota guard tests.
//!
//! Mirrors the Postgres semantics closely enough to exercise the quota guard without a
//! database: each owner has its own async mutex standing in for the options row lock, and
//! writes are buffered in the unit of work until [`commit`](QuotaUnitOfWork::commit).

use super::QuotaUnitOfWork;
use crate::db::{
    errors::{DbError, Result},
    models::{account_options::OptionsDBResponse, resources::ResourceDBResponse},
};
use crate::types::{ResourceId, UserId};
use chrono::Utc;
use dashmap::DashMap;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    options: DashMap<UserId, OptionsDBResponse>,
    resources: DashMap<ResourceId, ResourceDBResponse>,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

/// Shared handle to an in-memory set of accounts, options and resources.
#[derive(Clone, Default)]
pub struct MemoryQuotaStore {
    inner: Arc<Inner>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account with the given quota and return its id.
    pub fn add_account(&self, quota: Option<i64>) -> UserId {
        let account_id = Uuid::new_v4();
        self.inner.options.insert(
            account_id,
            OptionsDBResponse {
                id: Uuid::new_v4(),
                account_id,
                quota,
            },
        );
        account_id
    }

    /// Insert resources directly, bypassing the quota guard.
    pub fn seed_resources(&self, owner: UserId, count: usize) {
        for i in 0..count {
            let resource = ResourceDBResponse {
                id: Uuid::new_v4(),
                name: format!("seed-{i}"),
                owner_id: owner,
                created_at: Utc::now(),
            };
            self.inner.resources.insert(resource.id, resource);
        }
    }

    /// Committed resource count for an owner.
    pub fn resource_count(&self, owner: UserId) -> i64 {
        self.inner.resources.iter().filter(|r| r.owner_id == owner).count() as i64
    }

    /// Committed quota; `None` when the account is unknown.
    pub fn quota(&self, owner: UserId) -> Option<Option<i64>> {
        self.inner.options.get(&owner).map(|o| o.quota)
    }

    pub fn begin(&self) -> MemoryUnitOfWork {
        MemoryUnitOfWork {
            store: self.clone(),
            guards: HashMap::new(),
            pending_resources: Vec::new(),
            pending_quotas: HashMap::new(),
        }
    }

    fn lock_for(&self, owner: UserId) -> Arc<Mutex<()>> {
        // Clone the Arc out so no DashMap shard guard is held across an await
        self.inner.locks.entry(owner).or_default().value().clone()
    }
}

/// One unit of work against a [`MemoryQuotaStore`].
///
/// Dropping it without committing discards buffered writes and releases every owner lock.
pub struct MemoryUnitOfWork {
    store: MemoryQuotaStore,
    guards: HashMap<UserId, OwnedMutexGuard<()>>,
    pending_resources: Vec<ResourceDBResponse>,
    pending_quotas: HashMap<UserId, Option<i64>>,
}

impl MemoryUnitOfWork {
    fn current_options(&self, owner: UserId) -> Option<OptionsDBResponse> {
        let mut options = self.store.inner.options.get(&owner)?.value().clone();
        if let Some(quota) = self.pending_quotas.get(&owner) {
            options.quota = *quota;
        }
        Some(options)
    }
}

#[async_trait::async_trait]
impl QuotaUnitOfWork for MemoryUnitOfWork {
    async fn lock_options(&mut self, owner: UserId) -> Result<Option<OptionsDBResponse>> {
        if !self.store.inner.options.contains_key(&owner) {
            return Ok(None);
        }

        if !self.guards.contains_key(&owner) {
            let guard = self.store.lock_for(owner).lock_owned().await;
            self.guards.insert(owner, guard);
        }

        Ok(self.current_options(owner))
    }

    async fn get_resource_count(&mut self, owner: UserId) -> Result<i64> {
        let pending = self.pending_resources.iter().filter(|r| r.owner_id == owner).count() as i64;
        Ok(self.store.resource_count(owner) + pending)
    }

    async fn insert_resource(&mut self, owner: UserId, name: &str) -> Result<ResourceDBResponse> {
        if !self.store.inner.options.contains_key(&owner) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("resources_owner_id_fkey".to_string()),
                table: Some("resources".to_string()),
                message: format!("owner {owner} does not exist"),
            });
        }

        let resource = ResourceDBResponse {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id: owner,
            created_at: Utc::now(),
        };
        self.pending_resources.push(resource.clone());
        Ok(resource)
    }

    async fn update_quota(&mut self, owner: UserId, quota: Option<i64>) -> Result<OptionsDBResponse> {
        if quota.is_some_and(|q| q < 0) {
            return Err(DbError::CheckViolation {
                constraint: Some("account_options_quota_non_negative".to_string()),
                table: Some("account_options".to_string()),
                message: format!("quota {quota:?} is negative"),
            });
        }
        if !self.store.inner.options.contains_key(&owner) {
            return Err(DbError::NotFound);
        }

        self.pending_quotas.insert(owner, quota);
        self.current_options(owner).ok_or(DbError::NotFound)
    }

    async fn commit(mut self) -> Result<()> {
        for resource in self.pending_resources.drain(..) {
            self.store.inner.resources.insert(resource.id, resource);
        }
        for (owner, quota) in self.pending_quotas.drain() {
            if let Some(mut options) = self.store.inner.options.get_mut(&owner) {
                options.quota = quota;
            }
        }
        // Guards are released when `self` drops, after the writes above are visible
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back_and_unlocks() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(Some(3));

        let mut uow = store.begin();
        uow.lock_options(owner).await.unwrap();
        uow.insert_resource(owner, "discarded").await.unwrap();
        uow.update_quota(owner, Some(10)).await.unwrap();
        assert_eq!(uow.get_resource_count(owner).await.unwrap(), 1);
        drop(uow);

        assert_eq!(store.resource_count(owner), 0);
        assert_eq!(store.quota(owner), Some(Some(3)));

        let mut next = store.begin();
        let locked = tokio::time::timeout(Duration::from_secs(1), next.lock_options(owner)).await;
        assert!(locked.is_ok(), "lock must be released on drop");
    }

    #[tokio::test]
    async fn test_commit_applies_writes() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(None);

        let mut uow = store.begin();
        uow.lock_options(owner).await.unwrap();
        uow.insert_resource(owner, "kept").await.unwrap();
        let options = uow.update_quota(owner, Some(4)).await.unwrap();
        assert_eq!(options.quota, Some(4));
        uow.commit().await.unwrap();

        assert_eq!(store.resource_count(owner), 1);
        assert_eq!(store.quota(owner), Some(Some(4)));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let store = MemoryQuotaStore::new();
        let ghost = Uuid::new_v4();
        let mut uow = store.begin();

        assert!(uow.lock_options(ghost).await.unwrap().is_none());
        assert!(matches!(
            uow.insert_resource(ghost, "x").await,
            Err(DbError::ForeignKeyViolation { .. })
        ));
        assert!(matches!(uow.update_quota(ghost, Some(1)).await, Err(DbError::NotFound)));
        assert_eq!(store.quota(ghost), None);
    }

    #[tokio::test]
    async fn test_relocking_same_owner_is_reentrant() {
        let store = MemoryQuotaStore::new();
        let owner = store.add_account(None);
        let mut uow = store.begin();

        uow.lock_options(owner).await.unwrap();
        let again = tokio::time::timeout(Duration::from_secs(1), uow.lock_options(owner)).await;
        assert!(again.is_ok());
    }
}
