//! Policy filter evaluation
//!
//! Role requirements are strict; pattern filters fail open. A pattern that
//! does not compile is skipped, and the compile failure is reported once per
//! distinct pattern through [`FilterCache`].

use crate::policy::Policy;
use moka::sync::Cache;
use regex::Regex;
use streamwatch_types::MemberFact;

/// Outcome of evaluating a policy against one member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Member passes every filter
    Eligible,
    /// Required role is missing
    MissingRequiredRole,
    /// Member holds the ignored role
    HasIgnoredRole,
    /// Activity details do not match the game pattern
    GameMismatch,
    /// Activity name does not match the title pattern
    TitleMismatch,
}

impl Verdict {
    /// `true` for [`Verdict::Eligible`]
    #[inline]
    #[must_use]
    pub fn is_eligible(self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Patterns kept by [`FilterCache::new`]
pub const DEFAULT_FILTER_CAPACITY: u64 = 4096;

/// Compiled pattern cache shared across reconciliations
///
/// Failures are cached as `None` so a broken pattern is compiled and
/// reported once while it stays cached. Bounded; least useful patterns are
/// evicted first.
#[derive(Debug, Clone)]
pub struct FilterCache {
    compiled: Cache<String, Option<Regex>>,
}

impl Default for FilterCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_FILTER_CAPACITY)
    }
}

impl FilterCache {
    /// Create cache with the default capacity
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create cache holding at most `max_capacity` patterns
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            compiled: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Compiled pattern, or `None` if it does not compile
    pub fn regex(&self, pattern: &str) -> Option<Regex> {
        if let Some(hit) = self.compiled.get(pattern) {
            return hit;
        }

        self.compiled
            .get_with(pattern.to_string(), || match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(error) => {
                    tracing::warn!(%pattern, %error, "Invalid streaming filter pattern, ignoring filter");
                    None
                }
            })
    }

    /// Number of cached patterns (valid and invalid)
    ///
    /// Applies pending evictions first.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.compiled.run_pending_tasks();
        self.compiled.entry_count()
    }

    /// Cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evaluate `policy` filters against `member`
#[must_use]
pub fn evaluate(policy: &Policy, member: &MemberFact, filters: &FilterCache) -> Verdict {
    if let Some(role) = policy.require_role {
        if !member.has_role(role) {
            return Verdict::MissingRequiredRole;
        }
    }

    if let Some(role) = policy.ignore_role {
        if member.has_role(role) {
            return Verdict::HasIgnoredRole;
        }
    }

    let activity = member.activity.as_ref();

    if let Some(pattern) = policy.game_pattern() {
        let game = activity.map_or("", |a| a.details.as_str());
        if let Some(re) = filters.regex(pattern) {
            if !re.is_match(game) {
                return Verdict::GameMismatch;
            }
        }
    }

    if let Some(pattern) = policy.title_pattern() {
        let title = activity.map_or("", |a| a.name.as_str());
        if let Some(re) = filters.regex(pattern) {
            if !re.is_match(title) {
                return Verdict::TitleMismatch;
            }
        }
    }

    Verdict::Eligible
}

/// Whether `member` passes `policy` filters
#[inline]
#[must_use]
pub fn meets_policy(policy: &Policy, member: &MemberFact, filters: &FilterCache) -> bool {
    evaluate(policy, member, filters).is_eligible()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use streamwatch_types::{Activity, MemberId, PresenceStatus, RoleId};

    fn streamer(details: &str, name: &str) -> MemberFact {
        MemberFact::new(MemberId::new(1)).with_presence(
            PresenceStatus::Online,
            Some(Activity::streaming("http://x", name).with_details(details)),
        )
    }

    #[test]
    fn require_role() {
        let filters = FilterCache::new();
        let policy = Policy::enabled().with_require_role(RoleId::new(10));

        let without = streamer("g", "t");
        assert_eq!(evaluate(&policy, &without, &filters), Verdict::MissingRequiredRole);

        let with = without.with_roles([RoleId::new(10)]);
        assert!(meets_policy(&policy, &with, &filters));
    }

    #[test]
    fn ignore_role() {
        let filters = FilterCache::new();
        let policy = Policy::enabled().with_ignore_role(RoleId::new(11));

        let ignored = streamer("g", "t").with_roles([RoleId::new(11)]);
        assert_eq!(evaluate(&policy, &ignored, &filters), Verdict::HasIgnoredRole);
        assert!(meets_policy(&policy, &streamer("g", "t"), &filters));
    }

    #[test]
    fn game_pattern_matches_details() {
        let filters = FilterCache::new();
        let policy = Policy::enabled().with_game_regex("(?i)^chess$");

        assert!(meets_policy(&policy, &streamer("Chess", "anything"), &filters));
        assert_eq!(
            evaluate(&policy, &streamer("Go", "Chess"), &filters),
            Verdict::GameMismatch
        );
    }

    #[test]
    fn title_pattern_matches_name() {
        let filters = FilterCache::new();
        let policy = Policy::enabled().with_title_regex("speedrun");

        assert!(meets_policy(&policy, &streamer("", "any% speedrun"), &filters));
        assert_eq!(
            evaluate(&policy, &streamer("speedrun", "chill"), &filters),
            Verdict::TitleMismatch
        );
    }

    #[test]
    fn broken_pattern_fails_open_and_is_cached() {
        let filters = FilterCache::new();
        let policy = Policy::enabled().with_game_regex("([unclosed");

        assert!(meets_policy(&policy, &streamer("whatever", "t"), &filters));
        assert!(meets_policy(&policy, &streamer("other", "t"), &filters));
        assert_eq!(filters.len(), 1);
        assert!(filters.regex("([unclosed").is_none());
    }

    #[test]
    fn missing_activity_matches_as_empty_string() {
        let filters = FilterCache::new();
        let member = MemberFact::new(MemberId::new(1));

        assert!(meets_policy(&Policy::enabled().with_game_regex("^$"), &member, &filters));
        assert!(!meets_policy(&Policy::enabled().with_game_regex("."), &member, &filters));
    }

    #[test]
    fn cache_respects_capacity() {
        let filters = FilterCache::with_capacity(4);
        let member = streamer("game", "title");

        for n in 0..64 {
            let policy = Policy::enabled().with_title_regex(format!("title|{n}"));
            assert!(meets_policy(&policy, &member, &filters));
        }
        assert!(filters.len() <= 4);
    }

    proptest! {
        #[test]
        fn unfiltered_policy_accepts_everyone(details in ".*", name in ".*") {
            let filters = FilterCache::new();
            prop_assert!(meets_policy(&Policy::enabled(), &streamer(&details, &name), &filters));
        }

        #[test]
        fn broken_game_pattern_never_excludes(details in "[a-z ]{0,20}") {
            let filters = FilterCache::new();
            let policy = Policy::enabled().with_game_regex("(");
            prop_assert!(meets_policy(&policy, &streamer(&details, "t"), &filters));
        }
    }
}
