//! Roster capability traits
//!
//! The roster is owned by the snapshot store and written from gateway
//! events. Readers get a [`RosterView`], which holds the guild's read lock
//! until it is dropped. Views are deliberately not `Send`: holding one across
//! an `.await` inside a spawned task does not compile, which keeps network
//! I/O out of the locked section.

use crate::error::RosterError;
use streamwatch_types::{ChannelId, GuildId, MemberFact, MemberId, RoleId};

/// Read-locked view of one guild
pub trait RosterView {
    /// Member snapshot, if known at all
    fn member(&self, member: MemberId) -> Option<&MemberFact>;

    /// Every known member
    fn members(&self) -> Box<dyn Iterator<Item = &MemberFact> + '_>;

    /// Channel exists in the snapshot
    fn has_channel(&self, channel: ChannelId) -> bool;

    /// Role exists in the snapshot
    fn has_role(&self, role: RoleId) -> bool;

    /// Number of known members
    fn member_count(&self) -> usize {
        self.members().count()
    }
}

/// Roster snapshot store
#[async_trait::async_trait]
pub trait RosterStore: Send + Sync {
    /// Acquire a read-scoped view of `guild`
    ///
    /// Returns `None` when the guild is not in the snapshot.
    fn guild_view(&self, guild: GuildId) -> Option<Box<dyn RosterView + '_>>;

    /// Fetch a member from upstream (slow path)
    ///
    /// Unbounded latency; never call while holding a view. The store merges
    /// the fetched member data into its snapshot before returning.
    async fn fetch_member(&self, guild: GuildId, member: MemberId)
        -> Result<MemberFact, RosterError>;
}

/// Facts about a guild that decisions need after the view is released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuildFacts {
    /// Announcement channel still exists
    pub announce_channel_present: bool,
    /// Streaming role still exists
    pub give_role_present: bool,
}

impl GuildFacts {
    /// Capture the relevant facts from a held view
    #[must_use]
    pub fn capture(
        view: &dyn RosterView,
        announce_channel: Option<ChannelId>,
        give_role: Option<RoleId>,
    ) -> Self {
        Self {
            announce_channel_present: announce_channel.is_some_and(|c| view.has_channel(c)),
            give_role_present: give_role.is_some_and(|r| view.has_role(r)),
        }
    }
}
