//! Per-entity lock registry
//!
//! At most one in-flight transition per table, order and payment request.
//! Multi-entity operations lock through [`EntityLocks::acquire`], which always
//! takes keys in the same global order (tables, orders, requests; ascending
//! ids) so two operations over overlapping sets cannot deadlock.
//!
//! An entry lives only while some task holds or waits for it: releasing the
//! last [`LockSet`] referencing a key removes it from the registry.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lockable entity; the derived `Ord` is the acquisition order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKey {
    Table(i64),
    Order(i64),
    PaymentRequest(String),
}

type Registry = DashMap<EntityKey, Arc<Mutex<()>>>;

/// Held locks, released on drop
pub struct LockSet {
    keys: Vec<EntityKey>,
    guards: Vec<OwnedMutexGuard<()>>,
    registry: Arc<Registry>,
}

impl LockSet {
    pub fn keys(&self) -> &[EntityKey] {
        &self.keys
    }
}

impl fmt::Debug for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockSet").field("keys", &self.keys).finish()
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        self.guards.clear();
        // 只剩注册表自身引用时移除（无持有者、无等待者）
        for key in &self.keys {
            self.registry
                .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityLocks {
    locks: Arc<Registry>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: EntityKey) -> LockSet {
        self.acquire(vec![key]).await
    }

    /// Lock every key, sorted and de-duplicated
    pub async fn acquire(&self, mut keys: Vec<EntityKey>) -> LockSet {
        keys.sort();
        keys.dedup();

        // 逐个登记：中途取消时已拿到的锁随 set 一起释放并清理
        let mut set = LockSet {
            keys: Vec::with_capacity(keys.len()),
            guards: Vec::with_capacity(keys.len()),
            registry: self.locks.clone(),
        };
        for key in keys {
            // clone the Arc first so no DashMap shard is held across the await
            let mutex = self.locks.entry(key.clone()).or_default().clone();
            let guard = mutex.lock_owned().await;
            set.keys.push(key);
            set.guards.push(guard);
        }
        set
    }

    /// Entities currently held or awaited
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
