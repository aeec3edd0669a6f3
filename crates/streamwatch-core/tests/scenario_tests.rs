//! End-to-end scenario: one member starts and stops streaming

use pretty_assertions::assert_eq;
use streamwatch_core::{EventOutcome, RoleCall, SentMessage};
use streamwatch_ledger::Ledger;
use streamwatch_policy::Policy;
use streamwatch_test_utils::{idle_member, Harness, GUILD};
use streamwatch_types::{Activity, ChannelId, MemberFact, MemberId, PresenceStatus, RoleId, Transition};

#[tokio::test]
async fn test_stream_start_then_stop() {
    let member = MemberId::new(42);
    let role = RoleId::new(77);
    let channel = ChannelId::new(5);
    let h = Harness::new(
        Policy::enabled()
            .with_give_role(role)
            .with_announcement(channel, "{{.StreamTitle}}"),
    );

    let live = MemberFact::new(member).with_presence(
        PresenceStatus::Online,
        Some(Activity::streaming("http://x", "Title1")),
    );
    let started = h.observe(live).await;

    assert_eq!(started, EventOutcome::Reconciled(Some(Transition::started(member))));
    assert_eq!(h.ledger.members(GUILD).await.unwrap(), vec![member]);
    assert_eq!(
        h.roles.calls(),
        vec![RoleCall::Grant {
            guild: GUILD,
            member,
            role,
        }]
    );
    assert_eq!(
        h.messages.sent(),
        vec![SentMessage {
            channel,
            text: "Title1".to_string(),
        }]
    );

    let stopped = h.observe(idle_member(42)).await;

    assert_eq!(stopped, EventOutcome::Reconciled(Some(Transition::stopped(member))));
    assert!(h.ledger.members(GUILD).await.unwrap().is_empty());
    assert_eq!(h.roles.revoke_count(), 1);
    assert_eq!(h.roles.grant_count(), 1);
    assert_eq!(h.messages.count(), 1);
}
