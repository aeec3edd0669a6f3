//! Error types for the streamwatch engine
//!
//! Only infrastructure failures surface as [`EngineError`]:
//! - policy store unreachable
//! - ledger backend failure
//! - roster lookups for unknown guilds, failed slow-path fetches
//! - configuration problems
//!
//! Expected transport outcomes (missing permissions, deleted roles or
//! channels) and incomplete member data are handled inside the engine and
//! never reach the caller.

use std::path::PathBuf;
use streamwatch_ledger::LedgerError;
use streamwatch_policy::PolicyError;
use streamwatch_roster::RosterError;
use streamwatch_types::GuildId;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Policy could not be loaded
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Ledger transition could not be confirmed
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Roster fetch failed
    #[error("roster error: {0}")]
    Roster(#[from] RosterError),

    /// Guild is not present in the roster snapshot
    #[error("guild {0} not found in roster")]
    GuildNotFound(GuildId),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Check if the next triggering event may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Policy(e) => e.is_retryable(),
            Self::Ledger(e) => e.is_retryable(),
            Self::Roster(e) => e.is_retryable(),
            Self::GuildNotFound(_) => true,
            Self::Config(_) => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config is not valid TOML for [`crate::EngineConfig`]
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}
