//! streamwatch core
//!
//! Presence-to-action reconciliation: watches member presence, keeps a
//! "currently streaming" ledger in sync with it and fires role grants,
//! revocations and announcements on start/stop edges only.
//!
//! # Architecture
//!
//! ```text
//! GatewayEvent ──► StreamingEngine ──► Scanner ──► Ledger (edge signal)
//!                      │                  │
//!                  PolicyStore        Dispatcher ──► RoleTransport
//!                  RosterStore                   └─► MessageTransport
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use streamwatch_core::prelude::*;
//! use streamwatch_ledger::MemoryLedger;
//! use streamwatch_policy::{MemoryPolicyStore, Policy};
//! use streamwatch_roster::MemoryRoster;
//! use streamwatch_types::GuildId;
//!
//! # async fn example() -> Result<(), EngineError> {
//! let policies = Arc::new(MemoryPolicyStore::new());
//! policies.set_policy(GuildId::new(1), Policy::enabled())?;
//!
//! let dispatcher = Dispatcher::new(
//!     Arc::new(MemoryRoleTransport::new()),
//!     Arc::new(MemoryMessageTransport::new()),
//!     Arc::new(FieldTemplateRenderer::new()),
//! );
//! let engine = StreamingEngine::new(
//!     policies,
//!     Arc::new(MemoryRoster::new()),
//!     Arc::new(MemoryLedger::new()),
//!     dispatcher,
//!     EngineConfig::default(),
//! );
//!
//! engine.handle(GatewayEvent::GuildAvailable { guild: GuildId::new(1) }).await.ok();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod scanner;
pub mod template;
pub mod transport;

// Re-exports
pub use config::EngineConfig;
pub use dispatcher::{ActionOutcome, Dispatcher, SkipReason};
pub use error::{ConfigError, EngineError};
pub use events::{EventOutcome, EventPump, GatewayEvent, IgnoreReason, PumpStats, StreamingEngine};
pub use scanner::{MemberSnapshot, ScanMode, ScanReport, Scanner};
pub use template::{
    escape_special_mentions, FieldTemplateRenderer, TemplateContext, TemplateError,
    TemplateRenderer,
};
pub use transport::{
    MemoryMessageTransport, MemoryRoleTransport, MessageTransport, RoleCall, RoleTransport,
    SentMessage, TransportError,
};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::dispatcher::{ActionOutcome, Dispatcher};
    pub use crate::error::EngineError;
    pub use crate::events::{EventOutcome, EventPump, GatewayEvent, StreamingEngine};
    pub use crate::scanner::{ScanMode, ScanReport, Scanner};
    pub use crate::template::{FieldTemplateRenderer, TemplateRenderer};
    pub use crate::transport::{
        MemoryMessageTransport, MemoryRoleTransport, MessageTransport, RoleTransport,
        TransportError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
