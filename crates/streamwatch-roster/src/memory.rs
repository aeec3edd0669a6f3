//! In-memory roster store
//!
//! Each guild snapshot sits behind its own `parking_lot::RwLock`, shared
//! through a `DashMap`. Views hold an owned read guard so they outlive the
//! map lookup that produced them.
//!
//! The mutating methods are the snapshot store's side of the contract and
//! are driven by the gateway layer (or tests); the engine only reads.

use crate::error::RosterError;
use crate::view::{RosterStore, RosterView};
use dashmap::DashMap;
use parking_lot::lock_api::ArcRwLockReadGuard;
use parking_lot::{RawRwLock, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamwatch_types::{
    Activity, ChannelId, GuildId, MemberFact, MemberId, PresenceStatus, RoleId,
};

/// Snapshot of one guild
#[derive(Debug, Clone, Default)]
pub struct GuildSnapshot {
    /// Guild ID
    pub guild_id: GuildId,
    /// Known members
    pub members: HashMap<MemberId, MemberFact>,
    /// Known channels
    pub channels: HashSet<ChannelId>,
    /// Known roles
    pub roles: HashSet<RoleId>,
}

impl GuildSnapshot {
    /// Empty snapshot for `guild_id`
    #[must_use]
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            ..Self::default()
        }
    }
}

/// Read view over a [`GuildSnapshot`]
pub struct MemoryRosterView {
    guard: ArcRwLockReadGuard<RawRwLock, GuildSnapshot>,
}

impl RosterView for MemoryRosterView {
    fn member(&self, member: MemberId) -> Option<&MemberFact> {
        self.guard.members.get(&member)
    }

    fn members(&self) -> Box<dyn Iterator<Item = &MemberFact> + '_> {
        Box::new(self.guard.members.values())
    }

    fn has_channel(&self, channel: ChannelId) -> bool {
        self.guard.channels.contains(&channel)
    }

    fn has_role(&self, role: RoleId) -> bool {
        self.guard.roles.contains(&role)
    }

    fn member_count(&self) -> usize {
        self.guard.members.len()
    }
}

/// In-memory roster with an upstream member directory for the slow path
#[derive(Debug, Default)]
pub struct MemoryRoster {
    guilds: DashMap<GuildId, Arc<RwLock<GuildSnapshot>>>,
    /// What an upstream member fetch would return
    directory: DashMap<(GuildId, MemberId), MemberFact>,
    fetch_latency: Option<Duration>,
    fetches: AtomicUsize,
}

impl MemoryRoster {
    /// Create empty roster
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate upstream latency on every fetch
    #[inline]
    #[must_use]
    pub fn with_fetch_latency(mut self, latency: Duration) -> Self {
        self.fetch_latency = Some(latency);
        self
    }

    fn guild(&self, guild: GuildId) -> Arc<RwLock<GuildSnapshot>> {
        Arc::clone(
            self.guilds
                .entry(guild)
                .or_insert_with(|| Arc::new(RwLock::new(GuildSnapshot::new(guild))))
                .value(),
        )
    }

    /// Make `guild` known (empty)
    pub fn insert_guild(&self, guild: GuildId) {
        self.guild(guild);
    }

    /// Register a channel
    pub fn add_channel(&self, guild: GuildId, channel: ChannelId) {
        self.guild(guild).write().channels.insert(channel);
    }

    /// Remove a channel
    pub fn remove_channel(&self, guild: GuildId, channel: ChannelId) {
        self.guild(guild).write().channels.remove(&channel);
    }

    /// Register a role
    pub fn add_role(&self, guild: GuildId, role: RoleId) {
        self.guild(guild).write().roles.insert(role);
    }

    /// Insert or replace a member snapshot
    pub fn upsert_member(&self, guild: GuildId, fact: MemberFact) {
        self.guild(guild).write().members.insert(fact.member_id, fact);
    }

    /// Apply a presence update; unknown members become presence-only facts
    pub fn update_presence(
        &self,
        guild: GuildId,
        member: MemberId,
        status: PresenceStatus,
        activity: Option<Activity>,
    ) {
        let snapshot = self.guild(guild);
        let mut snapshot = snapshot.write();
        let fact = snapshot
            .members
            .entry(member)
            .or_insert_with(|| MemberFact::presence_only(member));
        fact.presence_status = status;
        fact.activity = activity;
        fact.presence_data_complete = true;
    }

    /// Apply a member update (roles); unknown members get member data only
    pub fn update_roles(
        &self,
        guild: GuildId,
        member: MemberId,
        roles: impl IntoIterator<Item = RoleId>,
    ) {
        let snapshot = self.guild(guild);
        let mut snapshot = snapshot.write();
        let fact = snapshot.members.entry(member).or_insert_with(|| MemberFact {
            presence_data_complete: false,
            ..MemberFact::new(member)
        });
        fact.roles = roles.into_iter().collect();
        fact.member_data_complete = true;
    }

    /// Member left the guild: drop the member object, keep nothing
    pub fn remove_member(&self, guild: GuildId, member: MemberId) {
        self.guild(guild).write().members.remove(&member);
    }

    /// Set what an upstream fetch returns for a member
    pub fn set_directory_member(&self, guild: GuildId, fact: MemberFact) {
        self.directory.insert((guild, fact.member_id), fact);
    }

    /// Number of upstream fetches performed
    #[inline]
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Clone of the current member snapshot (test and CLI inspection)
    #[must_use]
    pub fn member_snapshot(&self, guild: GuildId, member: MemberId) -> Option<MemberFact> {
        let snapshot = self.guilds.get(&guild)?.value().clone();
        let snapshot = snapshot.read();
        snapshot.members.get(&member).cloned()
    }
}

#[async_trait::async_trait]
impl RosterStore for MemoryRoster {
    fn guild_view(&self, guild: GuildId) -> Option<Box<dyn RosterView + '_>> {
        let snapshot = Arc::clone(self.guilds.get(&guild)?.value());
        Some(Box::new(MemoryRosterView {
            guard: snapshot.read_arc(),
        }))
    }

    async fn fetch_member(
        &self,
        guild: GuildId,
        member: MemberId,
    ) -> Result<MemberFact, RosterError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.fetch_latency {
            tokio::time::sleep(latency).await;
        }

        let fetched = self
            .directory
            .get(&(guild, member))
            .map(|f| f.value().clone())
            .ok_or(RosterError::MemberNotFound { guild, member })?;

        let snapshot = Arc::clone(
            self.guilds
                .get(&guild)
                .ok_or(RosterError::GuildNotFound(guild))?
                .value(),
        );
        let mut snapshot = snapshot.write();
        let merged = match snapshot.members.get_mut(&member) {
            Some(existing) => {
                existing.merge_member_data(&fetched);
                existing.clone()
            }
            None => {
                snapshot.members.insert(member, fetched.clone());
                fetched
            }
        };
        tracing::trace!(guild = %guild, member = %member, "Merged fetched member into roster");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: GuildId = GuildId::new(1);
    const M: MemberId = MemberId::new(10);

    #[test]
    fn view_reflects_snapshot() {
        let roster = MemoryRoster::new();
        roster.add_channel(G, ChannelId::new(5));
        roster.add_role(G, RoleId::new(77));
        roster.upsert_member(G, MemberFact::new(M));

        let view = roster.guild_view(G).unwrap();
        assert!(view.has_channel(ChannelId::new(5)));
        assert!(!view.has_channel(ChannelId::new(6)));
        assert!(view.has_role(RoleId::new(77)));
        assert_eq!(view.member_count(), 1);
        assert!(view.member(M).is_some());
    }

    #[test]
    fn unknown_guild_has_no_view() {
        assert!(MemoryRoster::new().guild_view(G).is_none());
    }

    #[test]
    fn presence_before_member_is_partial() {
        let roster = MemoryRoster::new();
        roster.update_presence(G, M, PresenceStatus::Online, None);

        let fact = roster.member_snapshot(G, M).unwrap();
        assert!(fact.needs_member_fetch());

        roster.update_roles(G, M, [RoleId::new(3)]);
        let fact = roster.member_snapshot(G, M).unwrap();
        assert!(fact.is_complete());
        assert!(fact.has_role(RoleId::new(3)));
    }

    #[tokio::test]
    async fn fetch_merges_member_data() {
        let roster = MemoryRoster::new();
        roster.update_presence(
            G,
            M,
            PresenceStatus::Online,
            Some(Activity::streaming("http://x", "t")),
        );
        roster.set_directory_member(
            G,
            MemberFact {
                presence_data_complete: false,
                ..MemberFact::new(M).with_roles([RoleId::new(4)])
            },
        );

        let fetched = roster.fetch_member(G, M).await.unwrap();
        assert!(fetched.is_complete());
        assert!(fetched.is_live());
        assert!(fetched.has_role(RoleId::new(4)));
        assert_eq!(roster.fetch_count(), 1);

        let view = roster.guild_view(G).unwrap();
        assert!(view.member(M).unwrap().is_complete());
    }

    #[tokio::test]
    async fn fetch_unknown_member_fails() {
        let roster = MemoryRoster::new();
        roster.insert_guild(G);

        let err = roster.fetch_member(G, M).await.unwrap_err();
        assert!(matches!(err, RosterError::MemberNotFound { .. }));
    }
}
