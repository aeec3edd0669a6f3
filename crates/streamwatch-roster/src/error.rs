//! Error types for roster access

use streamwatch_types::{GuildId, MemberId};

/// Roster store errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RosterError {
    /// Guild is not in the snapshot
    #[error("guild {0} not found in roster")]
    GuildNotFound(GuildId),

    /// Member does not exist upstream
    #[error("member {member} not found in guild {guild}")]
    MemberNotFound {
        /// Guild
        guild: GuildId,
        /// Member
        member: MemberId,
    },

    /// Network fetch failed
    #[error("fetching member {member} of guild {guild} failed: {message}")]
    FetchFailed {
        /// Guild
        guild: GuildId,
        /// Member
        member: MemberId,
        /// Transport message
        message: String,
    },
}

impl RosterError {
    /// Create fetch failure
    #[inline]
    pub fn fetch_failed(guild: GuildId, member: MemberId, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            guild,
            member,
            message: message.into(),
        }
    }

    /// Check if a later event may succeed where this failed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }
}
