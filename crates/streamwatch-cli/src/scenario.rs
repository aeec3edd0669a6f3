//! Replay scenario documents
//!
//! A scenario seeds in-memory guilds and lists the events to replay:
//!
//! ```yaml
//! guilds:
//!   - id: 1
//!     roles: [77]
//!     channels: [5]
//!     policy:
//!       enabled: true
//!       give_role: 77
//!       announce_channel: 5
//!       announce_message: "{{.StreamTitle}}"
//!     members:
//!       - id: 42
//!         presence: { status: online, activity: { url: "http://x", name: "Title1" } }
//! events:
//!   - { type: guild_available, guild: 1 }
//!   - type: presence_changed
//!     guild: 1
//!     member: 42
//!     presence: { status: online }
//! ```

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use streamwatch_core::GatewayEvent;
use streamwatch_policy::Policy;
use streamwatch_roster::MemoryRoster;
use streamwatch_types::{Activity, ChannelId, GuildId, MemberFact, MemberId, PresenceStatus, RoleId};

/// Whole scenario
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    /// Seeded guilds
    #[serde(default)]
    pub guilds: Vec<GuildSpec>,
    /// Events in delivery order
    #[serde(default)]
    pub events: Vec<EventStep>,
}

/// One seeded guild
#[derive(Debug, Clone, Deserialize)]
pub struct GuildSpec {
    /// Guild id
    pub id: GuildId,
    /// Roles that exist
    #[serde(default)]
    pub roles: Vec<RoleId>,
    /// Channels that exist
    #[serde(default)]
    pub channels: Vec<ChannelId>,
    /// Streaming policy (disabled when absent)
    #[serde(default)]
    pub policy: Policy,
    /// Members already in the roster
    #[serde(default)]
    pub members: Vec<MemberSpec>,
    /// Members only an upstream fetch knows about
    #[serde(default)]
    pub remote_members: Vec<MemberSpec>,
}

/// A member as seeded or fetched
#[derive(Debug, Clone, Deserialize)]
pub struct MemberSpec {
    /// Member id
    pub id: MemberId,
    /// Held roles
    #[serde(default)]
    pub roles: Vec<RoleId>,
    /// Display name for announcements
    #[serde(default)]
    pub display_name: Option<String>,
    /// Presence; absent means no presence data yet
    #[serde(default)]
    pub presence: Option<PresenceSpec>,
    /// Whether the member object is known; `false` seeds presence only
    #[serde(default = "known_by_default")]
    pub member_data: bool,
}

fn known_by_default() -> bool {
    true
}

/// Presence update
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceSpec {
    /// Status
    pub status: PresenceStatus,
    /// Activity, if any
    #[serde(default)]
    pub activity: Option<Activity>,
}

/// One replayed event plus the roster change that caused it
#[derive(Debug, Clone, Deserialize)]
pub struct EventStep {
    /// The event
    #[serde(flatten)]
    pub event: GatewayEvent,
    /// Presence to apply before delivery
    #[serde(default)]
    pub presence: Option<PresenceSpec>,
    /// Roles to apply before delivery
    #[serde(default)]
    pub roles: Option<Vec<RoleId>>,
    /// Replacement policy for the guild
    #[serde(default)]
    pub policy: Option<Policy>,
}

impl MemberSpec {
    /// Roster fact for this member
    #[must_use]
    pub fn to_fact(&self) -> MemberFact {
        let mut fact = MemberFact::new(self.id).with_roles(self.roles.iter().copied());
        if let Some(name) = &self.display_name {
            fact = fact.with_display_name(name.clone());
        }
        match &self.presence {
            Some(p) => fact = fact.with_presence(p.status, p.activity.clone()),
            None => fact.presence_data_complete = false,
        }
        fact.member_data_complete = self.member_data;
        fact
    }
}

impl Scenario {
    /// Load from YAML, JSON or TOML, chosen by extension
    ///
    /// # Errors
    /// Unreadable file or malformed document.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        read_document(path)
    }

    /// Guild ids must be unique
    ///
    /// # Errors
    /// Names the first duplicated guild.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for guild in &self.guilds {
            if !seen.insert(guild.id) {
                bail!("guild {} declared twice", guild.id);
            }
        }
        Ok(())
    }

    /// Populate `roster` with every guild
    pub fn seed(&self, roster: &MemoryRoster) {
        for guild in &self.guilds {
            roster.insert_guild(guild.id);
            for role in &guild.roles {
                roster.add_role(guild.id, *role);
            }
            for channel in &guild.channels {
                roster.add_channel(guild.id, *channel);
            }
            for member in &guild.members {
                roster.upsert_member(guild.id, member.to_fact());
            }
            for member in &guild.remote_members {
                roster.set_directory_member(guild.id, member.to_fact());
            }
        }
    }
}

impl EventStep {
    /// Apply this step's roster changes
    pub fn apply(&self, roster: &MemoryRoster) {
        let guild = self.event.guild();
        let member = match self.event {
            GatewayEvent::MemberRemoved { member, .. } => {
                roster.remove_member(guild, member);
                return;
            }
            GatewayEvent::PresenceChanged { member, .. }
            | GatewayEvent::MemberUpdated { member, .. } => member,
            _ => return,
        };

        if let Some(presence) = &self.presence {
            roster.update_presence(guild, member, presence.status, presence.activity.clone());
        }
        if let Some(roles) = &self.roles {
            roster.update_roles(guild, member, roles.iter().copied());
        }
    }
}

/// Parse a document by file extension (`json`, `toml`, anything else YAML)
///
/// # Errors
/// Unreadable file or malformed document.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

    let parsed = match extension {
        "json" => serde_json::from_str(&source).context("invalid JSON")?,
        "toml" => toml::from_str(&source).context("invalid TOML")?,
        _ => serde_yaml::from_str(&source).context("invalid YAML")?,
    };
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use streamwatch_roster::{RosterStore, RosterView};

    const SCENARIO: &str = r#"
guilds:
  - id: 1
    roles: [77]
    channels: [5]
    policy:
      enabled: true
      give_role: 77
    members:
      - id: 42
        display_name: alice
        presence: { status: online, activity: { url: "http://x", name: "Title1" } }
      - id: 43
        member_data: false
        presence: { status: dnd }
    remote_members:
      - id: 43
        roles: [3]
events:
  - { type: guild_available, guild: 1 }
  - type: presence_changed
    guild: 1
    member: 42
    presence: { status: offline }
"#;

    fn write_scenario(extension: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_yaml_scenario() {
        let file = write_scenario("yaml", SCENARIO);
        let scenario = Scenario::from_file(file.path()).unwrap();

        assert_eq!(scenario.guilds.len(), 1);
        assert_eq!(scenario.events.len(), 2);
        assert!(scenario.guilds[0].policy.enabled);
        assert!(scenario.events[1].presence.is_some());
        scenario.validate().unwrap();
    }

    #[test]
    fn loads_json_scenario() {
        let file = write_scenario(
            "json",
            r#"{"guilds":[{"id":7}],"events":[{"type":"manual_recheck","guild":7}]}"#,
        );
        let scenario = Scenario::from_file(file.path()).unwrap();
        assert_eq!(
            scenario.events[0].event,
            GatewayEvent::ManualRecheck {
                guild: GuildId::new(7)
            }
        );
    }

    #[test]
    fn duplicate_guilds_rejected() {
        let scenario: Scenario =
            serde_yaml::from_str("guilds: [{ id: 1 }, { id: 1 }]").unwrap();
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn seeds_roster() {
        let scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        let roster = MemoryRoster::new();
        scenario.seed(&roster);

        let view = roster.guild_view(GuildId::new(1)).unwrap();
        assert!(view.has_role(RoleId::new(77)));
        assert!(view.has_channel(ChannelId::new(5)));
        assert!(view.member(MemberId::new(42)).unwrap().is_complete());
        assert!(view.member(MemberId::new(43)).unwrap().needs_member_fetch());
    }

    #[test]
    fn step_applies_presence() {
        let scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        let roster = MemoryRoster::new();
        scenario.seed(&roster);

        scenario.events[1].apply(&roster);
        let member = roster
            .member_snapshot(GuildId::new(1), MemberId::new(42))
            .unwrap();
        assert_eq!(member.presence_status, PresenceStatus::Offline);
        assert!(!member.is_live());
    }
}
