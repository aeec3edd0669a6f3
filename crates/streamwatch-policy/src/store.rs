//! Policy store interface and in-memory implementation

use crate::error::PolicyError;
use crate::policy::Policy;
use dashmap::DashMap;
use streamwatch_types::GuildId;

/// Source of per-guild policies
///
/// Guilds without a stored policy get `Policy::default()` (tracking
/// disabled), never an error.
#[async_trait::async_trait]
pub trait PolicyStore: Send + Sync {
    /// Load the policy for `guild`
    async fn policy(&self, guild: GuildId) -> Result<Policy, PolicyError>;
}

/// In-memory policy store
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    policies: DashMap<GuildId, Policy>,
}

impl MemoryPolicyStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a validated policy
    ///
    /// # Errors
    /// - `PolicyError::InvalidRegex` if a filter pattern does not compile
    pub fn set_policy(&self, guild: GuildId, policy: Policy) -> Result<(), PolicyError> {
        policy.validate()?;
        self.policies.insert(guild, policy);
        Ok(())
    }

    /// Store a policy without validation
    ///
    /// Mirrors policies written by older tooling that did not validate.
    pub fn set_policy_unchecked(&self, guild: GuildId, policy: Policy) {
        self.policies.insert(guild, policy);
    }

    /// Remove a guild's policy
    pub fn remove(&self, guild: GuildId) -> Option<Policy> {
        self.policies.remove(&guild).map(|(_, p)| p)
    }

    /// Number of stored policies
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[async_trait::async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn policy(&self, guild: GuildId) -> Result<Policy, PolicyError> {
        Ok(self
            .policies
            .get(&guild)
            .map(|p| p.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl<S: PolicyStore + ?Sized> PolicyStore for std::sync::Arc<S> {
    async fn policy(&self, guild: GuildId) -> Result<Policy, PolicyError> {
        (**self).policy(guild).await
    }
}
