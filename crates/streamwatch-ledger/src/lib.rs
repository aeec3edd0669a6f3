//! streamwatch ledger
//!
//! The persistent "currently streaming" set used for edge detection.
//!
//! # Backends
//!
//! - [`MemoryLedger`]: process-local, used by tests and the replay tool
//! - `RedisLedger` (feature `redis`): Redis sets, survives restarts
//!
//! # Example
//!
//! ```rust
//! use streamwatch_ledger::{Ledger, MemoryLedger};
//! use streamwatch_types::{GuildId, MemberId};
//!
//! # async fn example() -> Result<(), streamwatch_ledger::LedgerError> {
//! let ledger = MemoryLedger::new();
//! assert!(ledger.add_if_absent(GuildId::new(1), MemberId::new(2)).await?);
//! assert!(!ledger.add_if_absent(GuildId::new(1), MemberId::new(2)).await?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod ledger;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

// Re-exports
pub use error::LedgerError;
pub use ledger::Ledger;
pub use memory::MemoryLedger;
#[cfg(feature = "redis")]
pub use redis_store::RedisLedger;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
