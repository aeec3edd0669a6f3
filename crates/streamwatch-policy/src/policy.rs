//! Per-guild streaming policy
//!
//! A [`Policy`] is loaded once per reconciliation pass and treated as
//! read-only for the rest of it.

use crate::error::PolicyError;
use serde::{Deserialize, Deserializer, Serialize};
use streamwatch_types::{ChannelId, Id, RoleId};

/// Streaming policy for one guild
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Policy {
    /// Tracking enabled
    #[serde(default)]
    pub enabled: bool,

    /// Only members with this role are tracked
    #[serde(default, deserialize_with = "unset_zero")]
    pub require_role: Option<RoleId>,

    /// Members with this role are never tracked
    #[serde(default, deserialize_with = "unset_zero")]
    pub ignore_role: Option<RoleId>,

    /// Pattern the activity details (game) must match
    #[serde(default)]
    pub game_regex: Option<String>,

    /// Pattern the activity name (stream title) must match
    #[serde(default)]
    pub title_regex: Option<String>,

    /// Role granted while streaming
    #[serde(default, deserialize_with = "unset_zero")]
    pub give_role: Option<RoleId>,

    /// Channel announcements are posted to
    #[serde(default, deserialize_with = "unset_zero")]
    pub announce_channel: Option<ChannelId>,

    /// Announcement template
    #[serde(default)]
    pub announce_message: String,
}

impl Policy {
    /// Enabled policy with no filters and no actions
    #[inline]
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// With required role
    #[inline]
    #[must_use]
    pub fn with_require_role(mut self, role: RoleId) -> Self {
        self.require_role = Some(role);
        self
    }

    /// With ignored role
    #[inline]
    #[must_use]
    pub fn with_ignore_role(mut self, role: RoleId) -> Self {
        self.ignore_role = Some(role);
        self
    }

    /// With game pattern
    #[inline]
    #[must_use]
    pub fn with_game_regex(mut self, pattern: impl Into<String>) -> Self {
        self.game_regex = Some(pattern.into());
        self
    }

    /// With title pattern
    #[inline]
    #[must_use]
    pub fn with_title_regex(mut self, pattern: impl Into<String>) -> Self {
        self.title_regex = Some(pattern.into());
        self
    }

    /// With streaming role
    #[inline]
    #[must_use]
    pub fn with_give_role(mut self, role: RoleId) -> Self {
        self.give_role = Some(role);
        self
    }

    /// With announcement channel and template
    #[inline]
    #[must_use]
    pub fn with_announcement(mut self, channel: ChannelId, message: impl Into<String>) -> Self {
        self.announce_channel = Some(channel);
        self.announce_message = message.into();
        self
    }

    /// Announcement is configured (channel set and template non-blank)
    #[inline]
    #[must_use]
    pub fn wants_announcement(&self) -> bool {
        self.announce_channel.is_some() && !self.announce_message.trim().is_empty()
    }

    /// Trimmed game pattern, `None` when blank
    #[must_use]
    pub fn game_pattern(&self) -> Option<&str> {
        non_blank(self.game_regex.as_deref())
    }

    /// Trimmed title pattern, `None` when blank
    #[must_use]
    pub fn title_pattern(&self) -> Option<&str> {
        non_blank(self.title_regex.as_deref())
    }

    /// Check that every filter pattern compiles
    ///
    /// Run when a policy is written. Evaluation never calls this and treats
    /// a broken pattern as no filter.
    ///
    /// # Errors
    /// - `PolicyError::InvalidRegex` naming the first broken field
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (field, pattern) in [
            ("game_regex", self.game_pattern()),
            ("title_regex", self.title_pattern()),
        ] {
            if let Some(pattern) = pattern {
                regex::Regex::new(pattern).map_err(|source| PolicyError::InvalidRegex {
                    field,
                    pattern: pattern.to_string(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accept a raw snowflake where `0` (or null) means unset
fn unset_zero<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Id + From<u64>,
{
    let raw = Option::<u64>::deserialize(deserializer)?;
    Ok(raw.filter(|v| *v != 0).map(T::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_disabled() {
        let policy = Policy::default();
        assert!(!policy.enabled);
        assert!(!policy.wants_announcement());
        assert!(policy.give_role.is_none());
    }

    #[test]
    fn zero_ids_deserialize_as_unset() {
        let policy: Policy = serde_json::from_str(
            r#"{"enabled":true,"require_role":0,"ignore_role":0,"give_role":77,
                "announce_channel":5,"announce_message":"{{.StreamTitle}}"}"#,
        )
        .unwrap();

        assert!(policy.enabled);
        assert_eq!(policy.require_role, None);
        assert_eq!(policy.ignore_role, None);
        assert_eq!(policy.give_role, Some(RoleId::new(77)));
        assert_eq!(policy.announce_channel, Some(ChannelId::new(5)));
        assert!(policy.wants_announcement());
    }

    #[test]
    fn blank_template_disables_announcement() {
        let policy = Policy::enabled().with_announcement(ChannelId::new(5), "   ");
        assert!(!policy.wants_announcement());
    }

    #[test]
    fn patterns_are_trimmed() {
        let policy = Policy::enabled()
            .with_game_regex("  ^Chess$ ")
            .with_title_regex("   ");
        assert_eq!(policy.game_pattern(), Some("^Chess$"));
        assert_eq!(policy.title_pattern(), None);
    }

    #[test]
    fn validate_reports_broken_field() {
        assert!(Policy::enabled().with_game_regex("speed.*run").validate().is_ok());

        let err = Policy::enabled().with_title_regex("([a-z]").validate().unwrap_err();
        assert!(matches!(err, PolicyError::InvalidRegex { field: "title_regex", .. }));
    }
}
