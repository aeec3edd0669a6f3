//! Reconciliation behaviour through the event surface
//!
//! Each test drives a wired-up engine with presence events and inspects
//! the recorded transport calls and the ledger.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use streamwatch_core::prelude::*;
use streamwatch_core::{EventOutcome, IgnoreReason, RoleCall};
use streamwatch_ledger::MemoryLedger;
use streamwatch_policy::Policy;
use streamwatch_roster::MemoryRoster;
use streamwatch_test_utils::{idle_member, streaming_member, FailingPolicyStore, Harness, GUILD};
use streamwatch_types::{Activity, ChannelId, MemberFact, MemberId, PresenceStatus, RoleId, Transition};

const ROLE: RoleId = RoleId::new(77);
const CHANNEL: ChannelId = ChannelId::new(5);

fn full_policy() -> Policy {
    Policy::enabled()
        .with_give_role(ROLE)
        .with_announcement(CHANNEL, "{{.StreamTitle}}")
}

#[tokio::test]
async fn test_repeated_streaming_events_act_once() {
    let h = Harness::new(full_policy());

    for _ in 0..3 {
        h.observe(streaming_member(10, "Title1")).await;
    }

    assert!(h.is_tracked(10));
    assert_eq!(h.roles.grant_count(), 1);
    assert_eq!(h.messages.count(), 1);
}

#[tokio::test]
async fn test_repeated_stop_events_act_once() {
    let h = Harness::new(full_policy());
    h.observe(streaming_member(10, "Title1")).await;

    for _ in 0..3 {
        h.observe(idle_member(10)).await;
    }

    assert!(!h.is_tracked(10));
    assert_eq!(h.roles.revoke_count(), 1);
}

#[tokio::test]
async fn test_disabled_policy_never_removes() {
    let h = Harness::new(full_policy());
    h.observe(streaming_member(10, "Title1")).await;
    assert!(h.is_tracked(10));

    let mut disabled = full_policy();
    disabled.enabled = false;
    h.set_policy(disabled);

    let outcome = h.observe(idle_member(10)).await;
    assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::Disabled));

    let outcome = h
        .handle(GatewayEvent::MemberUpdated {
            guild: GUILD,
            member: MemberId::new(10),
        })
        .await;
    assert_eq!(outcome, EventOutcome::Reconciled(None));

    let report = h.handle(GatewayEvent::ManualRecheck { guild: GUILD }).await;
    assert_eq!(report, EventOutcome::Scanned(ScanReport { guild: GUILD, ..ScanReport::default() }));

    assert!(h.is_tracked(10));
    assert_eq!(h.roles.revoke_count(), 0);
}

#[tokio::test]
async fn test_broken_game_regex_fails_open() {
    let h = Harness::new(full_policy().with_game_regex("(["));

    let member = MemberFact::new(MemberId::new(10)).with_presence(
        PresenceStatus::Online,
        Some(Activity::streaming("http://x", "Title1").with_details("Anything")),
    );
    let outcome = h.observe(member).await;

    assert_eq!(outcome, EventOutcome::Reconciled(Some(Transition::started(MemberId::new(10)))));
    assert!(h.is_tracked(10));
}

#[tokio::test]
async fn test_valid_title_regex_filters() {
    let h = Harness::new(full_policy().with_title_regex("^speedrun"));

    h.observe(streaming_member(10, "casual chess")).await;
    h.observe(streaming_member(11, "speedrun any%")).await;

    assert!(!h.is_tracked(10));
    assert!(h.is_tracked(11));
}

#[tokio::test]
async fn test_announcements_only_on_start_edges() {
    let h = Harness::new(full_policy());

    h.observe(idle_member(10)).await;
    h.observe(streaming_member(10, "first")).await;
    h.observe(streaming_member(10, "first")).await;
    h.observe(idle_member(10)).await;
    h.observe(streaming_member(10, "second")).await;

    let texts: Vec<String> = h.messages.sent().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["first".to_string(), "second".to_string()]);
    assert_eq!(h.roles.grant_count(), 2);
    assert_eq!(h.roles.revoke_count(), 1);
}

#[tokio::test]
async fn test_untracked_role_is_cleaned_up() {
    let h = Harness::new(full_policy());

    let holder = idle_member(10).with_roles([ROLE]);
    let outcome = h.observe(holder).await;

    assert_eq!(outcome, EventOutcome::Reconciled(None));
    assert_eq!(
        h.roles.calls(),
        vec![RoleCall::Revoke {
            guild: GUILD,
            member: MemberId::new(10),
            role: ROLE,
        }]
    );
}

#[tokio::test]
async fn test_drift_cleanup_skips_members_without_role() {
    let h = Harness::new(full_policy());

    h.observe(idle_member(10)).await;
    h.handle(GatewayEvent::MemberRemoved {
        guild: GUILD,
        member: MemberId::new(11),
    })
    .await;

    assert!(h.roles.calls().is_empty());
}

#[tokio::test]
async fn test_member_removed_revokes_tracked_role() {
    let h = Harness::new(full_policy());
    h.observe(streaming_member(10, "Title1")).await;
    h.roster.remove_member(GUILD, MemberId::new(10));

    let outcome = h
        .handle(GatewayEvent::MemberRemoved {
            guild: GUILD,
            member: MemberId::new(10),
        })
        .await;

    assert_eq!(outcome, EventOutcome::Reconciled(Some(Transition::stopped(MemberId::new(10)))));
    assert_eq!(h.roles.revoke_count(), 1);
}

#[tokio::test]
async fn test_ledger_failure_has_no_side_effects() {
    let h = Harness::new(full_policy());
    h.ledger.set_failing(true);
    h.roster.upsert_member(GUILD, streaming_member(10, "Title1"));

    let err = h
        .engine
        .handle(GatewayEvent::PresenceChanged {
            guild: GUILD,
            member: MemberId::new(10),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Ledger(_)));
    assert!(err.is_retryable());
    assert!(h.roles.calls().is_empty());
    assert_eq!(h.messages.count(), 0);

    h.ledger.set_failing(false);
    h.observe(streaming_member(10, "Title1")).await;
    assert_eq!(h.roles.grant_count(), 1);
}

#[tokio::test]
async fn test_policy_store_failure_aborts_event() {
    let roster = Arc::new(MemoryRoster::new());
    roster.upsert_member(GUILD, streaming_member(10, "Title1"));
    let roles = Arc::new(MemoryRoleTransport::new());
    let engine = StreamingEngine::new(
        Arc::new(FailingPolicyStore),
        roster,
        Arc::new(MemoryLedger::new()),
        Dispatcher::new(
            roles.clone(),
            Arc::new(MemoryMessageTransport::new()),
            Arc::new(FieldTemplateRenderer::new()),
        ),
        EngineConfig::default(),
    );

    let err = engine
        .handle(GatewayEvent::PresenceChanged {
            guild: GUILD,
            member: MemberId::new(10),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Policy(_)));
    assert!(roles.calls().is_empty());
}

#[tokio::test]
async fn test_missing_channel_skips_announcement_only() {
    let h = Harness::new(full_policy());
    h.roster.remove_channel(GUILD, CHANNEL);

    h.observe(streaming_member(10, "Title1")).await;

    assert!(h.is_tracked(10));
    assert_eq!(h.roles.grant_count(), 1);
    assert_eq!(h.messages.count(), 0);
}

#[tokio::test]
async fn test_refused_revoke_is_suppressed() {
    let h = Harness::new(full_policy());
    h.observe(streaming_member(10, "Title1")).await;
    h.roles.fail_role(ROLE, TransportError::MissingPermissions);

    let outcome = h.observe(idle_member(10)).await;

    assert_eq!(outcome, EventOutcome::Reconciled(Some(Transition::stopped(MemberId::new(10)))));
    assert!(!h.is_tracked(10));
}

#[tokio::test]
async fn test_mentions_in_titles_are_neutralised() {
    let h = Harness::new(full_policy());

    h.observe(streaming_member(10, "come @everyone")).await;

    let sent = h.messages.sent();
    assert_eq!(sent.len(), 1);
    assert!(!sent[0].text.contains("@everyone"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_events_for_one_member_act_once() {
    let h = Harness::new(full_policy());
    h.roster.upsert_member(GUILD, streaming_member(10, "Title1"));
    let event = GatewayEvent::PresenceChanged {
        guild: GUILD,
        member: MemberId::new(10),
    };

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let engine = Arc::clone(&h.engine);
            tokio::spawn(async move { engine.handle(event).await.unwrap() })
        })
        .collect();
    let outcomes = futures::future::join_all(handles).await;

    let started = outcomes
        .into_iter()
        .map(Result::unwrap)
        .filter(|o| *o == EventOutcome::Reconciled(Some(Transition::started(MemberId::new(10)))))
        .count();
    assert_eq!(started, 1);
    assert!(h.is_tracked(10));
    assert_eq!(h.roles.grant_count(), 1);
    assert_eq!(h.messages.count(), 1);
}
