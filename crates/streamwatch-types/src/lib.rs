//! streamwatch shared types
//!
//! Identifiers, member snapshots and transition edges used by every other
//! streamwatch crate.
//!
//! # Example
//!
//! ```rust
//! use streamwatch_types::{Activity, MemberFact, MemberId, PresenceStatus};
//!
//! let fact = MemberFact::new(MemberId::new(1))
//!     .with_presence(PresenceStatus::Online, Some(Activity::streaming("https://example.tv/a", "Live")));
//! assert!(fact.is_live());
//! ```

#![warn(missing_docs)]

pub mod ids;
pub mod member;
pub mod transition;

// Re-exports
pub use ids::{ChannelId, GuildId, Id, MemberId, RoleId};
pub use member::{Activity, MemberFact, PresenceStatus};
pub use transition::{StreamState, Transition};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
