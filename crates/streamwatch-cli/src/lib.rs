//! streamwatch command line support
//!
//! Scenario loading and replay behind the `streamwatch` binary.

#![warn(missing_docs)]

pub mod replay;
pub mod scenario;

pub use replay::{replay, ReplayOptions, ReplayReport, StepResult};
pub use scenario::{read_document, EventStep, GuildSpec, MemberSpec, PresenceSpec, Scenario};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
