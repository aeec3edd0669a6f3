//! Reconciliation scanner
//!
//! Decides, per member, whether the "currently streaming" ledger entry and
//! the streaming role should exist, and drives the dispatcher on edges only.
//!
//! # Locking
//!
//! Every read of the roster happens inside a synchronous helper that takes a
//! [`RosterView`](streamwatch_roster::RosterView), clones what the decision
//! needs into a [`MemberSnapshot`] and drops the view before returning. All
//! ledger and transport I/O happens afterwards, so no network call ever runs
//! under the guild's read lock.
//!
//! # Edges
//!
//! The ledger's `add_if_absent` / `remove_if_present` result is the edge
//! signal. A repeated observation of the same state finds the ledger already
//! in the desired shape and does nothing.

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use streamwatch_ledger::Ledger;
use streamwatch_policy::{evaluate, FilterCache, Policy};
use streamwatch_roster::{GuildFacts, RosterStore, RosterView};
use streamwatch_types::{GuildId, MemberFact, MemberId, StreamState, Transition};
use tracing::{debug, error, info, warn};

/// How much of a guild a scan covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Only members whose snapshot is already complete
    FastOnly,
    /// Also fetch presence-only members from upstream
    Full,
}

/// Decision inputs cloned out of a roster view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSnapshot {
    /// Member fact at the time of the view
    pub member: MemberFact,
    /// Guild facts at the time of the view
    pub facts: GuildFacts,
}

/// Outcome of a guild scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Scanned guild
    pub guild: GuildId,
    /// Members present in the first view
    pub members_seen: usize,
    /// Members run through reconciliation
    pub reconciled: usize,
    /// Edges taken
    pub transitions: Vec<Transition>,
    /// Presence-only members sent to the slow path
    pub deferred: usize,
    /// Slow-path fetches that failed
    pub fetch_failures: usize,
    /// Members with nothing actionable
    pub skipped: usize,
    /// Members whose reconciliation hit an infrastructure error
    pub errors: usize,
}

impl ScanReport {
    fn new(guild: GuildId) -> Self {
        Self {
            guild,
            ..Self::default()
        }
    }

    /// Number of start edges
    #[must_use]
    pub fn started(&self) -> usize {
        self.transitions.iter().filter(|t| t.is_start()).count()
    }

    /// Number of stop edges
    #[must_use]
    pub fn stopped(&self) -> usize {
        self.transitions.len() - self.started()
    }

    fn absorb(&mut self, batch: Batch) {
        self.reconciled += batch.reconciled;
        self.errors += batch.errors;
        self.transitions.extend(batch.transitions);
    }
}

#[derive(Debug, Default)]
struct Batch {
    reconciled: usize,
    errors: usize,
    transitions: Vec<Transition>,
}

#[derive(Debug)]
struct Partition {
    facts: GuildFacts,
    ready: Vec<MemberFact>,
    deferred: Vec<MemberId>,
    seen: usize,
    skipped: usize,
}

/// Per-member reconciliation and guild scans
pub struct Scanner {
    ledger: Arc<dyn Ledger>,
    roster: Arc<dyn RosterStore>,
    dispatcher: Dispatcher,
    filters: FilterCache,
    config: EngineConfig,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("filters", &self.filters.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Create scanner
    pub fn new(
        ledger: Arc<dyn Ledger>,
        roster: Arc<dyn RosterStore>,
        dispatcher: Dispatcher,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger,
            roster,
            dispatcher,
            filters: FilterCache::with_capacity(config.filter_cache_capacity),
            config,
        }
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Roster store
    #[inline]
    #[must_use]
    pub fn roster(&self) -> &Arc<dyn RosterStore> {
        &self.roster
    }

    /// Desired state for `member` under `policy`
    #[must_use]
    pub fn desired_state(&self, policy: &Policy, member: &MemberFact) -> StreamState {
        if !member.member_data_complete || !member.is_live() {
            return StreamState::NotStreaming;
        }
        let verdict = evaluate(policy, member, &self.filters);
        if !verdict.is_eligible() {
            debug!(member = %member.member_id, ?verdict, "live but filtered out");
        }
        StreamState::from_live(verdict.is_eligible())
    }

    /// Snapshot one member under a short-lived view
    ///
    /// # Errors
    /// - `EngineError::GuildNotFound` if the guild is not in the roster
    pub fn snapshot_member(
        &self,
        policy: &Policy,
        guild: GuildId,
        member: MemberId,
    ) -> Result<Option<MemberSnapshot>, EngineError> {
        let view = self
            .roster
            .guild_view(guild)
            .ok_or(EngineError::GuildNotFound(guild))?;
        let facts = capture_facts(view.as_ref(), policy);
        Ok(view.member(member).map(|fact| MemberSnapshot {
            member: fact.clone(),
            facts,
        }))
    }

    /// Reconcile one member
    ///
    /// Returns the edge taken, if any.
    ///
    /// # Errors
    /// - `EngineError::Ledger` if the ledger transition could not be confirmed;
    ///   no side effect has been issued in that case
    pub async fn reconcile(
        &self,
        policy: &Policy,
        guild: GuildId,
        member: &MemberFact,
        facts: GuildFacts,
    ) -> Result<Option<Transition>, EngineError> {
        if !policy.enabled {
            return Ok(None);
        }

        match self.desired_state(policy, member) {
            StreamState::Streaming => self.enter_streaming(policy, guild, member, facts).await,
            StreamState::NotStreaming => self.leave_streaming(policy, guild, member).await,
        }
    }

    async fn enter_streaming(
        &self,
        policy: &Policy,
        guild: GuildId,
        member: &MemberFact,
        facts: GuildFacts,
    ) -> Result<Option<Transition>, EngineError> {
        let id = member.member_id;
        if !self.ledger.add_if_absent(guild, id).await? {
            return Ok(None);
        }

        if let Some(role) = policy.give_role {
            let outcome = self
                .dispatcher
                .grant_role(guild, member, role, facts.give_role_present)
                .await;
            if outcome.is_failure() {
                // Forget the edge so the next event retries the grant
                if let Err(e) = self.ledger.remove_if_present(guild, id).await {
                    error!(guild = %guild, member = %id, error = %e, "failed rolling back ledger entry");
                }
                return Ok(None);
            }
        }

        if policy.wants_announcement() {
            self.dispatcher
                .announce(policy, guild, member, facts.announce_channel_present)
                .await;
        }

        info!(guild = %guild, member = %id, "member started streaming");
        Ok(Some(Transition::started(id)))
    }

    async fn leave_streaming(
        &self,
        policy: &Policy,
        guild: GuildId,
        member: &MemberFact,
    ) -> Result<Option<Transition>, EngineError> {
        let id = member.member_id;
        let was_present = self.ledger.remove_if_present(guild, id).await?;

        if let Some(role) = policy.give_role {
            if was_present {
                self.dispatcher.revoke_role(guild, id, role).await;
            } else if member.member_data_complete && member.has_role(role) {
                // Role held without a ledger entry: granted before tracking
                // existed, or the entry was lost. Heuristic cleanup.
                debug!(guild = %guild, member = %id, role = %role, "revoking untracked streaming role");
                self.dispatcher.revoke_role(guild, id, role).await;
            }
        }

        if !was_present {
            return Ok(None);
        }
        info!(guild = %guild, member = %id, "member stopped streaming");
        Ok(Some(Transition::stopped(id)))
    }

    /// Reconcile every member of a guild
    ///
    /// Complete members are reconciled straight away. In
    /// [`ScanMode::Full`], presence-only members are fetched upstream
    /// concurrently and reconciled after all fetches finished.
    ///
    /// # Errors
    /// - `EngineError::GuildNotFound` if the guild is not in the roster
    pub async fn scan_guild(
        &self,
        policy: &Policy,
        guild: GuildId,
        mode: ScanMode,
    ) -> Result<ScanReport, EngineError> {
        let mut report = ScanReport::new(guild);
        if !policy.enabled {
            return Ok(report);
        }

        let partition = self.partition(policy, guild, mode)?;
        info!(
            guild = %guild,
            members = partition.seen,
            deferred = partition.deferred.len(),
            ?mode,
            "checking guild"
        );
        report.members_seen = partition.seen;
        report.skipped = partition.skipped;
        report.deferred = partition.deferred.len();

        let (fast, (fetched, fetch_failures)) = tokio::join!(
            self.reconcile_batch(policy, guild, partition.ready, partition.facts),
            self.fetch_deferred(guild, partition.deferred),
        );
        report.absorb(fast);
        report.fetch_failures = fetch_failures;

        if !fetched.is_empty() {
            info!(guild = %guild, fetched = fetched.len(), "starting slow check");
            match self.resolve_fetched(policy, guild, fetched) {
                Some((members, facts, skipped)) => {
                    report.skipped += skipped;
                    let slow = self.reconcile_batch(policy, guild, members, facts).await;
                    report.absorb(slow);
                }
                None => warn!(guild = %guild, "guild vanished before slow check"),
            }
        }

        info!(
            guild = %guild,
            reconciled = report.reconciled,
            started = report.started(),
            stopped = report.stopped(),
            errors = report.errors,
            "guild check done"
        );
        Ok(report)
    }

    fn partition(
        &self,
        policy: &Policy,
        guild: GuildId,
        mode: ScanMode,
    ) -> Result<Partition, EngineError> {
        let view = self
            .roster
            .guild_view(guild)
            .ok_or(EngineError::GuildNotFound(guild))?;

        let mut partition = Partition {
            facts: capture_facts(view.as_ref(), policy),
            ready: Vec::new(),
            deferred: Vec::new(),
            seen: 0,
            skipped: 0,
        };
        for member in view.members() {
            partition.seen += 1;
            if member.is_complete() {
                partition.ready.push(member.clone());
            } else if mode == ScanMode::Full && member.needs_member_fetch() {
                partition.deferred.push(member.member_id);
            } else {
                partition.skipped += 1;
            }
        }
        Ok(partition)
    }

    async fn fetch_deferred(&self, guild: GuildId, members: Vec<MemberId>) -> (Vec<MemberFact>, usize) {
        if members.is_empty() {
            return (Vec::new(), 0);
        }

        let results: Vec<_> = stream::iter(members)
            .map(|member| async move { (member, self.roster.fetch_member(guild, member).await) })
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut fetched = Vec::with_capacity(results.len());
        let mut failures = 0;
        for (member, result) in results {
            match result {
                Ok(fact) => fetched.push(fact),
                Err(e) => {
                    warn!(guild = %guild, member = %member, error = %e, "failed fetching member");
                    failures += 1;
                }
            }
        }
        (fetched, failures)
    }

    /// Second view: prefer the roster's fact if it is now complete, else the
    /// fetched one if complete, else skip.
    fn resolve_fetched(
        &self,
        policy: &Policy,
        guild: GuildId,
        fetched: Vec<MemberFact>,
    ) -> Option<(Vec<MemberFact>, GuildFacts, usize)> {
        let view = self.roster.guild_view(guild)?;
        let facts = capture_facts(view.as_ref(), policy);

        let mut members = Vec::with_capacity(fetched.len());
        let mut skipped = 0;
        for fact in fetched {
            match view.member(fact.member_id) {
                Some(current) if current.is_complete() => members.push(current.clone()),
                _ if fact.is_complete() => members.push(fact),
                _ => {
                    debug!(guild = %guild, member = %fact.member_id, "still incomplete after fetch");
                    skipped += 1;
                }
            }
        }
        Some((members, facts, skipped))
    }

    async fn reconcile_batch(
        &self,
        policy: &Policy,
        guild: GuildId,
        members: Vec<MemberFact>,
        facts: GuildFacts,
    ) -> Batch {
        let results: Vec<_> = stream::iter(members)
            .map(|member| async move {
                let result = self.reconcile(policy, guild, &member, facts).await;
                (member.member_id, result)
            })
            .buffer_unordered(self.config.max_concurrent_actions.max(1))
            .collect()
            .await;

        let mut batch = Batch::default();
        for (member, result) in results {
            batch.reconciled += 1;
            match result {
                Ok(Some(transition)) => batch.transitions.push(transition),
                Ok(None) => {}
                Err(e) => {
                    error!(guild = %guild, member = %member, error = %e, "failed checking presence");
                    batch.errors += 1;
                }
            }
        }
        batch
    }
}

fn capture_facts(view: &dyn RosterView, policy: &Policy) -> GuildFacts {
    GuildFacts::capture(view, policy.announce_channel, policy.give_role)
}
