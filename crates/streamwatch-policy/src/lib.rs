//! streamwatch policy
//!
//! Per-guild streaming configuration and the filters that decide whether a
//! live member is tracked.
//!
//! # Overview
//!
//! - **Policy**: enabled flag, role requirements, pattern filters, actions
//! - **meets_policy**: strict role checks, fail-open pattern checks
//! - **PolicyStore**: async source of policies, with an in-memory store and a
//!   moka-backed caching wrapper
//!
//! # Example
//!
//! ```rust
//! use streamwatch_policy::{meets_policy, FilterCache, Policy};
//! use streamwatch_types::{Activity, MemberFact, MemberId, PresenceStatus};
//!
//! let filters = FilterCache::new();
//! let policy = Policy::enabled().with_title_regex("(?i)speedrun");
//! let member = MemberFact::new(MemberId::new(1))
//!     .with_presence(PresenceStatus::Online, Some(Activity::streaming("https://x.tv", "Speedrun night")));
//!
//! assert!(meets_policy(&policy, &member, &filters));
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod filter;
pub mod policy;
pub mod store;

// Re-exports
pub use cache::CachedPolicyStore;
pub use error::PolicyError;
pub use filter::{evaluate, meets_policy, FilterCache, Verdict, DEFAULT_FILTER_CAPACITY};
pub use policy::Policy;
pub use store::{MemoryPolicyStore, PolicyStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
