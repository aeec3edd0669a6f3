//! Ledger interface
//!
//! The ledger is the set of members currently considered streaming, per
//! guild. Its add/remove primitives are atomic and report the previous
//! membership; that report is the edge signal. Callers must never emulate
//! them with a read followed by a write.

use crate::error::LedgerError;
use streamwatch_types::{GuildId, MemberId};

/// Streaming-set ledger
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Add `member` to the guild's set
    ///
    /// Returns `true` if the member was absent (this call created the entry).
    async fn add_if_absent(&self, guild: GuildId, member: MemberId) -> Result<bool, LedgerError>;

    /// Remove `member` from the guild's set
    ///
    /// Returns `true` if the member was present (this call removed the entry).
    async fn remove_if_present(
        &self,
        guild: GuildId,
        member: MemberId,
    ) -> Result<bool, LedgerError>;

    /// Current members of the guild's set, sorted
    async fn members(&self, guild: GuildId) -> Result<Vec<MemberId>, LedgerError>;
}

#[async_trait::async_trait]
impl<L: Ledger + ?Sized> Ledger for std::sync::Arc<L> {
    async fn add_if_absent(&self, guild: GuildId, member: MemberId) -> Result<bool, LedgerError> {
        (**self).add_if_absent(guild, member).await
    }

    async fn remove_if_present(
        &self,
        guild: GuildId,
        member: MemberId,
    ) -> Result<bool, LedgerError> {
        (**self).remove_if_present(guild, member).await
    }

    async fn members(&self, guild: GuildId) -> Result<Vec<MemberId>, LedgerError> {
        (**self).members(guild).await
    }
}
