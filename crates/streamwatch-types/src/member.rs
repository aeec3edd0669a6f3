//! Member snapshot types
//!
//! A [`MemberFact`] is what the roster store knows about one member of one
//! guild at a point in time: roles from the member object, status and
//! activity from the last presence. The two halves arrive through different
//! gateway events, so either may be missing.

use crate::ids::{MemberId, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Presence status as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// Online
    Online,
    /// Idle / away
    Idle,
    /// Do not disturb
    #[serde(alias = "dnd")]
    DoNotDisturb,
    /// Invisible (shown to others as offline, reported to bots as such)
    Invisible,
    /// Offline or unknown
    #[default]
    Offline,
}

impl PresenceStatus {
    /// Whether the member counts as connected
    #[inline]
    #[must_use]
    pub fn is_online(self) -> bool {
        !matches!(self, Self::Offline)
    }
}

/// Rich presence activity; only streaming activities carry a URL
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Activity {
    /// Stream URL (empty for non-streaming activities)
    #[serde(default)]
    pub url: String,
    /// Activity details; for streams this is the game being played
    #[serde(default)]
    pub details: String,
    /// Activity name; for streams this is the stream title
    #[serde(default)]
    pub name: String,
}

impl Activity {
    /// Streaming activity with URL and title
    #[must_use]
    pub fn streaming(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            details: String::new(),
            name: name.into(),
        }
    }

    /// With details (game)
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Whether this activity is a live stream
    #[inline]
    #[must_use]
    pub fn is_stream(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Per (guild, member) snapshot owned by the roster store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFact {
    /// Member identifier
    pub member_id: MemberId,
    /// Roles currently held
    #[serde(default)]
    pub roles: BTreeSet<RoleId>,
    /// Last known presence status
    #[serde(default)]
    pub presence_status: PresenceStatus,
    /// Last known activity
    #[serde(default)]
    pub activity: Option<Activity>,
    /// Member object (roles, name) has been received
    #[serde(default)]
    pub member_data_complete: bool,
    /// Presence has been received
    #[serde(default)]
    pub presence_data_complete: bool,
    /// Display name, when the member object is known
    #[serde(default)]
    pub display_name: Option<String>,
}

impl MemberFact {
    /// Fact with both member and presence data present, offline, no roles
    #[must_use]
    pub fn new(member_id: MemberId) -> Self {
        Self {
            member_id,
            roles: BTreeSet::new(),
            presence_status: PresenceStatus::Offline,
            activity: None,
            member_data_complete: true,
            presence_data_complete: true,
            display_name: None,
        }
    }

    /// Fact known only from a presence update (member object missing)
    #[must_use]
    pub fn presence_only(member_id: MemberId) -> Self {
        Self {
            member_data_complete: false,
            ..Self::new(member_id)
        }
    }

    /// With roles
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    /// With presence status and activity
    #[must_use]
    pub fn with_presence(mut self, status: PresenceStatus, activity: Option<Activity>) -> Self {
        self.presence_status = status;
        self.activity = activity;
        self.presence_data_complete = true;
        self
    }

    /// With display name
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Both halves of the snapshot are present
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.member_data_complete && self.presence_data_complete
    }

    /// Presence is known but the member object is not
    #[inline]
    #[must_use]
    pub fn needs_member_fetch(&self) -> bool {
        self.presence_data_complete && !self.member_data_complete
    }

    /// Whether the member holds `role`
    #[inline]
    #[must_use]
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }

    /// Online with a streaming activity, before any policy filtering
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.presence_status.is_online() && self.activity.as_ref().is_some_and(Activity::is_stream)
    }

    /// Overlay the member half (roles, name) of `other` onto this fact,
    /// keeping this fact's presence.
    pub fn merge_member_data(&mut self, other: &MemberFact) {
        self.roles = other.roles.clone();
        self.display_name = other.display_name.clone();
        self.member_data_complete = other.member_data_complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_requires_online_and_url() {
        let live = MemberFact::new(MemberId::new(1))
            .with_presence(PresenceStatus::Idle, Some(Activity::streaming("http://x", "t")));
        assert!(live.is_live());

        let offline = live.clone().with_presence(
            PresenceStatus::Offline,
            Some(Activity::streaming("http://x", "t")),
        );
        assert!(!offline.is_live());

        let no_url = live
            .clone()
            .with_presence(PresenceStatus::Online, Some(Activity::streaming("  ", "t")));
        assert!(!no_url.is_live());

        let no_activity = live.with_presence(PresenceStatus::Online, None);
        assert!(!no_activity.is_live());
    }

    #[test]
    fn completeness_flags() {
        let full = MemberFact::new(MemberId::new(1));
        assert!(full.is_complete());
        assert!(!full.needs_member_fetch());

        let partial = MemberFact::presence_only(MemberId::new(2));
        assert!(!partial.is_complete());
        assert!(partial.needs_member_fetch());
    }

    #[test]
    fn merge_member_data_keeps_presence() {
        let mut partial = MemberFact::presence_only(MemberId::new(3))
            .with_presence(PresenceStatus::Online, Some(Activity::streaming("u", "n")));
        let fetched = MemberFact::new(MemberId::new(3))
            .with_roles([RoleId::new(9)])
            .with_display_name("ada");

        partial.merge_member_data(&fetched);

        assert!(partial.is_complete());
        assert!(partial.has_role(RoleId::new(9)));
        assert!(partial.is_live());
        assert_eq!(partial.display_name.as_deref(), Some("ada"));
    }

    #[test]
    fn status_accepts_dnd_alias() {
        let status: PresenceStatus = serde_json::from_str("\"dnd\"").unwrap();
        assert_eq!(status, PresenceStatus::DoNotDisturb);
    }
}
