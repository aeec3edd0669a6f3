//! streamwatch roster
//!
//! The shared member/presence snapshot, seen through read-locked views.
//!
//! The engine depends only on [`RosterStore`] and [`RosterView`];
//! [`MemoryRoster`] is the in-memory snapshot store used by tests and the
//! replay tool.

#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod view;

// Re-exports
pub use error::RosterError;
pub use memory::{GuildSnapshot, MemoryRoster, MemoryRosterView};
pub use view::{GuildFacts, RosterStore, RosterView};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
