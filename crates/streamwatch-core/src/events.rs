//! Gateway event handling
//!
//! [`StreamingEngine`] resolves the guild policy and roster state for an
//! event and hands the member(s) to the [`Scanner`]. [`EventPump`] feeds a
//! bounded queue of events through the engine, one task per event.

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::scanner::{MemberSnapshot, ScanMode, ScanReport, Scanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use streamwatch_ledger::Ledger;
use streamwatch_policy::{Policy, PolicyStore};
use streamwatch_roster::{GuildFacts, RosterStore};
use streamwatch_types::{GuildId, MemberFact, MemberId, Transition};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

/// Inbound events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Guild became available (startup, member chunk)
    GuildAvailable {
        /// Guild
        guild: GuildId,
    },
    /// A member's presence changed
    PresenceChanged {
        /// Guild
        guild: GuildId,
        /// Member
        member: MemberId,
    },
    /// A member's roles or profile changed
    MemberUpdated {
        /// Guild
        guild: GuildId,
        /// Member
        member: MemberId,
    },
    /// A member left the guild
    MemberRemoved {
        /// Guild
        guild: GuildId,
        /// Member
        member: MemberId,
    },
    /// Operator asked for a full re-check (policy edited)
    ManualRecheck {
        /// Guild
        guild: GuildId,
    },
    /// Guild moved onto this process
    GuildMigrated {
        /// Guild
        guild: GuildId,
    },
}

impl GatewayEvent {
    /// Guild the event belongs to
    #[must_use]
    pub fn guild(&self) -> GuildId {
        match *self {
            Self::GuildAvailable { guild }
            | Self::PresenceChanged { guild, .. }
            | Self::MemberUpdated { guild, .. }
            | Self::MemberRemoved { guild, .. }
            | Self::ManualRecheck { guild }
            | Self::GuildMigrated { guild } => guild,
        }
    }

    /// Short event name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GuildAvailable { .. } => "guild_available",
            Self::PresenceChanged { .. } => "presence_changed",
            Self::MemberUpdated { .. } => "member_updated",
            Self::MemberRemoved { .. } => "member_removed",
            Self::ManualRecheck { .. } => "manual_recheck",
            Self::GuildMigrated { .. } => "guild_migrated",
        }
    }
}

/// What handling an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A guild scan ran
    Scanned(ScanReport),
    /// A single member was reconciled
    Reconciled(Option<Transition>),
    /// Nothing to do
    Ignored(IgnoreReason),
}

/// Why an event was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Feature disabled for the guild
    Disabled,
    /// Member is not in the roster
    MemberUnknown,
    /// Member has no presence data yet
    PresenceUnknown,
    /// Member data still incomplete after fetching
    MemberIncomplete,
}

/// Streaming engine
///
/// Owns the collaborators and routes [`GatewayEvent`]s to the scanner.
pub struct StreamingEngine {
    policies: Arc<dyn PolicyStore>,
    scanner: Scanner,
}

impl std::fmt::Debug for StreamingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingEngine")
            .field("scanner", &self.scanner)
            .finish_non_exhaustive()
    }
}

impl StreamingEngine {
    /// Create engine
    pub fn new(
        policies: Arc<dyn PolicyStore>,
        roster: Arc<dyn RosterStore>,
        ledger: Arc<dyn Ledger>,
        dispatcher: Dispatcher,
        config: EngineConfig,
    ) -> Self {
        Self {
            policies,
            scanner: Scanner::new(ledger, roster, dispatcher, config),
        }
    }

    /// Underlying scanner
    #[inline]
    #[must_use]
    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Handle one event
    ///
    /// # Errors
    /// Infrastructure failures for this event only; the next event for the
    /// same guild or member starts from scratch.
    pub async fn handle(&self, event: GatewayEvent) -> Result<EventOutcome, EngineError> {
        let guild = event.guild();
        let policy = self.policies.policy(guild).await?;

        match event {
            GatewayEvent::GuildAvailable { .. } => self.scan(&policy, guild, ScanMode::FastOnly).await,
            GatewayEvent::ManualRecheck { .. } | GatewayEvent::GuildMigrated { .. } => {
                self.scan(&policy, guild, ScanMode::Full).await
            }
            GatewayEvent::PresenceChanged { member, .. } => {
                self.presence_changed(&policy, guild, member).await
            }
            GatewayEvent::MemberUpdated { member, .. } => {
                self.member_updated(&policy, guild, member).await
            }
            GatewayEvent::MemberRemoved { member, .. } => {
                self.member_removed(&policy, guild, member).await
            }
        }
    }

    /// Handle one event, logging instead of returning errors
    pub async fn handle_logged(&self, event: GatewayEvent) -> bool {
        match self.handle(event).await {
            Ok(outcome) => {
                debug!(?outcome, "event handled");
                true
            }
            Err(e) => {
                error!(guild = %event.guild(), event = event.kind(), error = %e, "failed handling event");
                false
            }
        }
    }

    async fn scan(
        &self,
        policy: &Policy,
        guild: GuildId,
        mode: ScanMode,
    ) -> Result<EventOutcome, EngineError> {
        let report = self.scanner.scan_guild(policy, guild, mode).await?;
        Ok(EventOutcome::Scanned(report))
    }

    async fn presence_changed(
        &self,
        policy: &Policy,
        guild: GuildId,
        member: MemberId,
    ) -> Result<EventOutcome, EngineError> {
        if !policy.enabled {
            return Ok(EventOutcome::Ignored(IgnoreReason::Disabled));
        }

        let snapshot = match self.scanner.snapshot_member(policy, guild, member)? {
            Some(snapshot) if snapshot.member.is_complete() => snapshot,
            _ => {
                let fetched = self.scanner.roster().fetch_member(guild, member).await?;
                match self.resolve_after_fetch(policy, guild, fetched)? {
                    Some(snapshot) => snapshot,
                    None => return Ok(EventOutcome::Ignored(IgnoreReason::MemberIncomplete)),
                }
            }
        };

        self.reconcile(policy, guild, snapshot).await
    }

    fn resolve_after_fetch(
        &self,
        policy: &Policy,
        guild: GuildId,
        fetched: MemberFact,
    ) -> Result<Option<MemberSnapshot>, EngineError> {
        let current = self.scanner.snapshot_member(policy, guild, fetched.member_id)?;
        Ok(match current {
            Some(snapshot) if snapshot.member.is_complete() => Some(snapshot),
            Some(snapshot) if fetched.is_complete() => Some(MemberSnapshot {
                member: fetched,
                facts: snapshot.facts,
            }),
            _ => None,
        })
    }

    async fn member_updated(
        &self,
        policy: &Policy,
        guild: GuildId,
        member: MemberId,
    ) -> Result<EventOutcome, EngineError> {
        let Some(snapshot) = self.scanner.snapshot_member(policy, guild, member)? else {
            warn!(guild = %guild, member = %member, "member not found in roster");
            return Ok(EventOutcome::Ignored(IgnoreReason::MemberUnknown));
        };
        if !snapshot.member.presence_data_complete {
            warn!(guild = %guild, member = %member, "presence not found in roster");
            return Ok(EventOutcome::Ignored(IgnoreReason::PresenceUnknown));
        }

        self.reconcile(policy, guild, snapshot).await
    }

    async fn member_removed(
        &self,
        policy: &Policy,
        guild: GuildId,
        member: MemberId,
    ) -> Result<EventOutcome, EngineError> {
        if !policy.enabled {
            return Ok(EventOutcome::Ignored(IgnoreReason::Disabled));
        }

        // The member object is gone; reconcile as "left the roster"
        let mut departed = MemberFact::presence_only(member);
        departed.presence_data_complete = false;
        let snapshot = MemberSnapshot {
            member: departed,
            facts: GuildFacts::default(),
        };
        self.reconcile(policy, guild, snapshot).await
    }

    async fn reconcile(
        &self,
        policy: &Policy,
        guild: GuildId,
        snapshot: MemberSnapshot,
    ) -> Result<EventOutcome, EngineError> {
        let transition = self
            .scanner
            .reconcile(policy, guild, &snapshot.member, snapshot.facts)
            .await?;
        Ok(EventOutcome::Reconciled(transition))
    }
}

/// Totals from an [`EventPump`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PumpStats {
    /// Events handled without error
    pub handled: usize,
    /// Events that returned an error
    pub failed: usize,
    /// Event tasks that panicked
    pub panicked: usize,
}

impl PumpStats {
    fn record(&mut self, result: Result<bool, tokio::task::JoinError>) {
        match result {
            Ok(true) => self.handled += 1,
            Ok(false) => self.failed += 1,
            Err(e) => {
                error!(error = %e, "event task panicked");
                self.panicked += 1;
            }
        }
    }
}

/// Bounded event queue driving a [`StreamingEngine`]
///
/// At most `max_in_flight` events are handled at once. While every slot is
/// taken the pump stops receiving, so the queue fills and senders wait.
#[derive(Debug)]
pub struct EventPump {
    engine: Arc<StreamingEngine>,
    rx: mpsc::Receiver<GatewayEvent>,
    max_in_flight: usize,
}

impl EventPump {
    /// Create pump and its sender
    ///
    /// Senders wait when `capacity` events are queued. The in-flight limit
    /// comes from the engine's `max_in_flight_events`.
    #[must_use]
    pub fn channel(engine: Arc<StreamingEngine>, capacity: usize) -> (mpsc::Sender<GatewayEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let max_in_flight = engine.scanner().config().max_in_flight_events;
        (
            tx,
            Self {
                engine,
                rx,
                max_in_flight,
            },
        )
    }

    /// With in-flight event limit
    #[inline]
    #[must_use]
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Run until every sender is dropped, then drain in-flight events
    pub async fn run(mut self) -> PumpStats {
        let mut stats = PumpStats::default();
        let mut tasks = JoinSet::new();
        let slots = Arc::new(Semaphore::new(self.max_in_flight.max(1)));

        loop {
            // Never closed, so acquiring only waits for a finished event
            let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
                break;
            };
            let Some(event) = self.rx.recv().await else {
                break;
            };

            let engine = Arc::clone(&self.engine);
            let span = tracing::info_span!("event", guild = %event.guild(), kind = event.kind());
            tasks.spawn(
                async move {
                    let _permit = permit;
                    engine.handle_logged(event).await
                }
                .instrument(span),
            );

            while let Some(result) = tasks.try_join_next() {
                stats.record(result);
            }
        }

        while let Some(result) = tasks.join_next().await {
            stats.record(result);
        }
        info!(handled = stats.handled, failed = stats.failed, "event pump stopped");
        stats
    }
}
