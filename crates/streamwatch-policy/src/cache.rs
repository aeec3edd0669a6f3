//! Policy cache using moka
//!
//! Policies are read on every reconciliation but change rarely. The cache
//! coalesces concurrent loads for the same guild and expires entries after a
//! TTL so edits made elsewhere are picked up without explicit invalidation.

use crate::error::PolicyError;
use crate::policy::Policy;
use crate::store::PolicyStore;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use streamwatch_types::GuildId;

/// Caching wrapper around any [`PolicyStore`]
#[derive(Debug)]
pub struct CachedPolicyStore<S> {
    inner: S,
    cache: Cache<GuildId, Arc<Policy>>,
}

impl<S: PolicyStore> CachedPolicyStore<S> {
    /// Wrap `inner` with a cache of `max_capacity` guilds and the given TTL
    #[must_use]
    pub fn new(inner: S, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Drop the cached policy for `guild`
    #[inline]
    pub async fn invalidate(&self, guild: GuildId) {
        self.cache.invalidate(&guild).await;
    }

    /// Wrapped store
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<S: PolicyStore> PolicyStore for CachedPolicyStore<S> {
    async fn policy(&self, guild: GuildId) -> Result<Policy, PolicyError> {
        let policy = self
            .cache
            .try_get_with(guild, async { self.inner.policy(guild).await.map(Arc::new) })
            .await
            .map_err(|err| PolicyError::unavailable(guild, err.to_string()))?;
        Ok(Policy::clone(&policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPolicyStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use streamwatch_types::RoleId;

    struct CountingStore {
        loads: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl PolicyStore for CountingStore {
        async fn policy(&self, guild: GuildId) -> Result<Policy, PolicyError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PolicyError::unavailable(guild, "down"));
            }
            Ok(Policy::enabled())
        }
    }

    #[tokio::test]
    async fn second_load_hits_cache() {
        let cached = CachedPolicyStore::new(
            CountingStore {
                loads: AtomicUsize::new(0),
                fail: false,
            },
            100,
            Duration::from_secs(60),
        );

        assert!(cached.policy(GuildId::new(1)).await.unwrap().enabled);
        assert!(cached.policy(GuildId::new(1)).await.unwrap().enabled);
        assert_eq!(cached.inner().loads.load(Ordering::SeqCst), 1);

        cached.invalidate(GuildId::new(1)).await;
        cached.policy(GuildId::new(1)).await.unwrap();
        assert_eq!(cached.inner().loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cached = CachedPolicyStore::new(
            CountingStore {
                loads: AtomicUsize::new(0),
                fail: true,
            },
            100,
            Duration::from_secs(60),
        );

        let err = cached.policy(GuildId::new(2)).await.unwrap_err();
        assert!(err.is_retryable());
        cached.policy(GuildId::new(2)).await.unwrap_err();
        assert_eq!(cached.inner().loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn wraps_shared_memory_store() {
        let store = Arc::new(MemoryPolicyStore::new());
        let cached = CachedPolicyStore::new(Arc::clone(&store), 10, Duration::from_secs(60));

        store
            .set_policy(GuildId::new(3), Policy::enabled().with_give_role(RoleId::new(1)))
            .unwrap();
        let loaded = cached.policy(GuildId::new(3)).await.unwrap();
        assert_eq!(loaded.give_role, Some(RoleId::new(1)));
    }
}
