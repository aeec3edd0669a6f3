//! In-memory ledger
//!
//! One `HashSet` per guild inside a `DashMap`. Insert and remove run under
//! the shard's write lock, so the previous-membership result is atomic with
//! the mutation.

use crate::error::LedgerError;
use crate::ledger::Ledger;
use dashmap::DashMap;
use std::collections::HashSet;
use streamwatch_types::{GuildId, MemberId};

/// In-memory streaming set
#[derive(Debug, Default)]
pub struct MemoryLedger {
    sets: DashMap<GuildId, HashSet<MemberId>>,
}

impl MemoryLedger {
    /// Create empty ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `member` is tracked (inspection only, never an edge signal)
    #[must_use]
    pub fn contains(&self, guild: GuildId, member: MemberId) -> bool {
        self.sets
            .get(&guild)
            .is_some_and(|set| set.contains(&member))
    }

    /// Number of tracked members in `guild`
    #[must_use]
    pub fn len(&self, guild: GuildId) -> usize {
        self.sets.get(&guild).map_or(0, |set| set.len())
    }

    /// Seed an entry without going through an edge (restores, tests)
    pub fn seed(&self, guild: GuildId, member: MemberId) {
        self.sets.entry(guild).or_default().insert(member);
    }
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    async fn add_if_absent(&self, guild: GuildId, member: MemberId) -> Result<bool, LedgerError> {
        Ok(self.sets.entry(guild).or_default().insert(member))
    }

    async fn remove_if_present(
        &self,
        guild: GuildId,
        member: MemberId,
    ) -> Result<bool, LedgerError> {
        Ok(self
            .sets
            .get_mut(&guild)
            .is_some_and(|mut set| set.remove(&member)))
    }

    async fn members(&self, guild: GuildId) -> Result<Vec<MemberId>, LedgerError> {
        let mut members: Vec<MemberId> = self
            .sets
            .get(&guild)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        Ok(members)
    }
}
