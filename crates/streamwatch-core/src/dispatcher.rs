//! Action dispatcher
//!
//! Turns reconciliation decisions into transport calls and classifies the
//! result. Dispatch never returns an error: expected platform refusals are
//! suppressed, anything else is logged and reported as
//! [`ActionOutcome::Failed`] so the scanner can decide whether to roll the
//! ledger back.

use crate::template::{TemplateContext, TemplateRenderer};
use crate::transport::{MessageTransport, RoleTransport, TransportError};
use std::sync::Arc;
use streamwatch_policy::Policy;
use streamwatch_types::{GuildId, MemberFact, MemberId, RoleId};
use tracing::{debug, error, warn};

/// Why an action was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Member already holds the role
    RoleAlreadyHeld,
    /// Role is not in the roster snapshot
    RoleNotInGuild,
    /// Announcement channel is not in the roster snapshot
    ChannelNotInGuild,
    /// No announcement configured
    NotConfigured,
    /// Template failed to render
    RenderFailed,
}

/// Result of one dispatched action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Transport accepted the call
    Applied,
    /// Transport refused with an expected error
    Suppressed(TransportError),
    /// Not attempted
    Skipped(SkipReason),
    /// Transport failed unexpectedly
    Failed(TransportError),
}

impl ActionOutcome {
    /// Unexpected transport failure
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Dispatches role and announcement actions
#[derive(Clone)]
pub struct Dispatcher {
    roles: Arc<dyn RoleTransport>,
    messages: Arc<dyn MessageTransport>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create dispatcher
    pub fn new(
        roles: Arc<dyn RoleTransport>,
        messages: Arc<dyn MessageTransport>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            roles,
            messages,
            renderer,
        }
    }

    /// Grant the streaming role
    ///
    /// `role_present` comes from the roster snapshot taken with the decision.
    pub async fn grant_role(
        &self,
        guild: GuildId,
        member: &MemberFact,
        role: RoleId,
        role_present: bool,
    ) -> ActionOutcome {
        if !role_present {
            debug!(guild = %guild, member = %member.member_id, role = %role, "role not in guild, skipping grant");
            return ActionOutcome::Skipped(SkipReason::RoleNotInGuild);
        }
        if member.has_role(role) {
            return ActionOutcome::Skipped(SkipReason::RoleAlreadyHeld);
        }

        let result = self.roles.grant_role(guild, member.member_id, role).await;
        classify(result, "grant role", guild, member.member_id, role)
    }

    /// Revoke the streaming role
    pub async fn revoke_role(&self, guild: GuildId, member: MemberId, role: RoleId) -> ActionOutcome {
        let result = self.roles.revoke_role(guild, member, role).await;
        classify(result, "revoke role", guild, member, role)
    }

    /// Render and send the stream announcement
    pub async fn announce(
        &self,
        policy: &Policy,
        guild: GuildId,
        member: &MemberFact,
        channel_present: bool,
    ) -> ActionOutcome {
        let Some(channel) = policy.announce_channel.filter(|_| policy.wants_announcement()) else {
            return ActionOutcome::Skipped(SkipReason::NotConfigured);
        };
        if !channel_present {
            warn!(guild = %guild, channel = %channel, "channel not found in roster, not sending announcement");
            return ActionOutcome::Skipped(SkipReason::ChannelNotInGuild);
        }

        let ctx = TemplateContext::for_member(member);
        let text = match self.renderer.render(&ctx, &policy.announce_message) {
            Ok(text) => text,
            Err(e) => {
                warn!(guild = %guild, member = %member.member_id, error = %e, "failed rendering announcement");
                return ActionOutcome::Skipped(SkipReason::RenderFailed);
            }
        };

        match self.messages.send_message(channel, &text).await {
            Ok(()) => ActionOutcome::Applied,
            Err(e) if e.is_expected() => {
                debug!(guild = %guild, channel = %channel, error = %e, "announcement refused");
                ActionOutcome::Suppressed(e)
            }
            Err(e) => {
                error!(guild = %guild, channel = %channel, error = %e, "failed sending announcement");
                ActionOutcome::Failed(e)
            }
        }
    }
}

fn classify(
    result: Result<(), TransportError>,
    action: &'static str,
    guild: GuildId,
    member: MemberId,
    role: RoleId,
) -> ActionOutcome {
    match result {
        Ok(()) => ActionOutcome::Applied,
        Err(e) if e.is_expected() => {
            debug!(guild = %guild, member = %member, role = %role, error = %e, "{action} refused");
            ActionOutcome::Suppressed(e)
        }
        Err(e) => {
            error!(guild = %guild, member = %member, role = %role, error = %e, "failed to {action}");
            ActionOutcome::Failed(e)
        }
    }
}
