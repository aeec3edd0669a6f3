//! Testing utilities for the streamwatch workspace
//!
//! Fixtures, failure-injecting collaborators and a wired-up engine harness.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use streamwatch_core::{
    Dispatcher, EngineConfig, EventOutcome, FieldTemplateRenderer, GatewayEvent,
    MemoryMessageTransport, MemoryRoleTransport, StreamingEngine,
};
use streamwatch_ledger::{Ledger, LedgerError, MemoryLedger};
use streamwatch_policy::{MemoryPolicyStore, Policy, PolicyError, PolicyStore};
use streamwatch_roster::MemoryRoster;
use streamwatch_types::{Activity, GuildId, MemberFact, MemberId, PresenceStatus};

pub const GUILD: GuildId = GuildId::new(1);

pub fn live_activity(url: &str, title: &str) -> Activity {
    Activity::streaming(url, title)
}

/// Complete member, online and streaming
pub fn streaming_member(id: u64, title: &str) -> MemberFact {
    MemberFact::new(MemberId::new(id)).with_presence(
        PresenceStatus::Online,
        Some(live_activity("http://x", title)),
    )
}

/// Complete member, online without activity
pub fn idle_member(id: u64) -> MemberFact {
    MemberFact::new(MemberId::new(id)).with_presence(PresenceStatus::Online, None)
}

/// Policy store that is always unreachable
#[derive(Debug, Default)]
pub struct FailingPolicyStore;

#[async_trait::async_trait]
impl PolicyStore for FailingPolicyStore {
    async fn policy(&self, guild: GuildId) -> Result<Policy, PolicyError> {
        Err(PolicyError::unavailable(guild, "policy store offline"))
    }
}

/// Memory ledger that can be switched into failure
#[derive(Debug, Default)]
pub struct FlakyLedger {
    inner: MemoryLedger,
    failing: AtomicBool,
}

impl FlakyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryLedger {
        &self.inner
    }

    fn check(&self, guild: GuildId) -> Result<(), LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::backend(guild, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Ledger for FlakyLedger {
    async fn add_if_absent(&self, guild: GuildId, member: MemberId) -> Result<bool, LedgerError> {
        self.check(guild)?;
        self.inner.add_if_absent(guild, member).await
    }

    async fn remove_if_present(&self, guild: GuildId, member: MemberId) -> Result<bool, LedgerError> {
        self.check(guild)?;
        self.inner.remove_if_present(guild, member).await
    }

    async fn members(&self, guild: GuildId) -> Result<Vec<MemberId>, LedgerError> {
        self.check(guild)?;
        self.inner.members(guild).await
    }
}

/// Engine wired to in-memory collaborators for [`GUILD`]
pub struct Harness {
    pub roster: Arc<MemoryRoster>,
    pub ledger: Arc<FlakyLedger>,
    pub policies: Arc<MemoryPolicyStore>,
    pub roles: Arc<MemoryRoleTransport>,
    pub messages: Arc<MemoryMessageTransport>,
    pub engine: Arc<StreamingEngine>,
}

impl Harness {
    /// Harness with `policy` for [`GUILD`]; its role and channel exist
    pub fn new(policy: Policy) -> Self {
        Self::with_parts(policy, MemoryRoster::new(), EngineConfig::default())
    }

    pub fn with_parts(policy: Policy, roster: MemoryRoster, config: EngineConfig) -> Self {
        let roster = Arc::new(roster);
        roster.insert_guild(GUILD);
        if let Some(role) = policy.give_role {
            roster.add_role(GUILD, role);
        }
        if let Some(channel) = policy.announce_channel {
            roster.add_channel(GUILD, channel);
        }

        let policies = Arc::new(MemoryPolicyStore::new());
        policies.set_policy_unchecked(GUILD, policy);

        let ledger = Arc::new(FlakyLedger::new());
        let roles = Arc::new(MemoryRoleTransport::new());
        let messages = Arc::new(MemoryMessageTransport::new());
        let dispatcher = Dispatcher::new(
            roles.clone(),
            messages.clone(),
            Arc::new(FieldTemplateRenderer::new()),
        );
        let engine = Arc::new(StreamingEngine::new(
            policies.clone(),
            roster.clone(),
            ledger.clone(),
            dispatcher,
            config,
        ));

        Self {
            roster,
            ledger,
            policies,
            roles,
            messages,
            engine,
        }
    }

    pub fn set_policy(&self, policy: Policy) {
        self.policies.set_policy_unchecked(GUILD, policy);
    }

    /// Store `member` in the roster and deliver a presence event for it
    pub async fn observe(&self, member: MemberFact) -> EventOutcome {
        let id = member.member_id;
        self.roster.upsert_member(GUILD, member);
        self.handle(GatewayEvent::PresenceChanged { guild: GUILD, member: id })
            .await
    }

    pub async fn handle(&self, event: GatewayEvent) -> EventOutcome {
        self.engine.handle(event).await.unwrap()
    }

    pub fn is_tracked(&self, member: u64) -> bool {
        self.ledger.inner().contains(GUILD, MemberId::new(member))
    }
}
