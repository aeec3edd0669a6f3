//! Error types for policy handling

use streamwatch_types::GuildId;

/// Policy errors
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// A filter pattern does not compile
    #[error("invalid {field} pattern '{pattern}': {source}")]
    InvalidRegex {
        /// Which policy field holds the pattern
        field: &'static str,
        /// The offending pattern
        pattern: String,
        /// Compiler error
        #[source]
        source: regex::Error,
    },

    /// Backing store failed
    #[error("policy store unavailable for guild {guild}: {message}")]
    Unavailable {
        /// Guild being loaded
        guild: GuildId,
        /// Store-specific message
        message: String,
    },
}

impl PolicyError {
    /// Create unavailable error
    #[inline]
    pub fn unavailable(guild: GuildId, message: impl Into<String>) -> Self {
        Self::Unavailable {
            guild,
            message: message.into(),
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
