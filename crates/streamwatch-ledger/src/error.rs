//! Error types for ledger access

use streamwatch_types::GuildId;

/// Ledger errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Backend could not be reached or rejected the command
    #[error("ledger backend error for guild {guild}: {message}")]
    Backend {
        /// Guild being updated
        guild: GuildId,
        /// Backend message
        message: String,
    },

    /// Backend returned something that is not a set membership count
    #[error("unexpected ledger reply: {0}")]
    UnexpectedReply(String),
}

impl LedgerError {
    /// Create backend error
    #[inline]
    pub fn backend(guild: GuildId, message: impl Into<String>) -> Self {
        Self::Backend {
            guild,
            message: message.into(),
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}
