//! Outbound transport interfaces
//!
//! Role mutations and messages go through [`RoleTransport`] and
//! [`MessageTransport`]. Implementations map platform failures onto
//! [`TransportError`] so the dispatcher can tell expected outcomes from real
//! faults.
//!
//! [`MemoryRoleTransport`] and [`MemoryMessageTransport`] record every call
//! and can be told to fail; the replay tool and tests use them.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use streamwatch_types::{ChannelId, GuildId, MemberId, RoleId};

/// Transport failure classification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Bot lacks the permission for this action
    #[error("missing permissions")]
    MissingPermissions,

    /// Bot cannot see the target
    #[error("missing access")]
    MissingAccess,

    /// Role no longer exists
    #[error("unknown role")]
    UnknownRole,

    /// Channel no longer exists
    #[error("unknown channel")]
    UnknownChannel,

    /// Member left the guild
    #[error("unknown member")]
    UnknownMember,

    /// Anything else
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Map a platform JSON error code
    #[must_use]
    pub fn from_code(code: u32, message: impl Into<String>) -> Self {
        match code {
            50013 => Self::MissingPermissions,
            50001 => Self::MissingAccess,
            10011 => Self::UnknownRole,
            10003 => Self::UnknownChannel,
            10007 => Self::UnknownMember,
            _ => Self::Other(message.into()),
        }
    }

    /// Steady-state outcome in deployments with inconsistent permissions;
    /// terminal for the action, not alert-worthy.
    #[inline]
    #[must_use]
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Role mutation transport
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RoleTransport: Send + Sync {
    /// Add `role` to `member`
    async fn grant_role(
        &self,
        guild: GuildId,
        member: MemberId,
        role: RoleId,
    ) -> Result<(), TransportError>;

    /// Remove `role` from `member`
    async fn revoke_role(
        &self,
        guild: GuildId,
        member: MemberId,
        role: RoleId,
    ) -> Result<(), TransportError>;
}

/// Message transport
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync {
    /// Post `text` to `channel`
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), TransportError>;
}

/// A recorded role call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RoleCall {
    /// `grant_role` was called
    Grant {
        /// Guild
        guild: GuildId,
        /// Member
        member: MemberId,
        /// Role
        role: RoleId,
    },
    /// `revoke_role` was called
    Revoke {
        /// Guild
        guild: GuildId,
        /// Member
        member: MemberId,
        /// Role
        role: RoleId,
    },
}

/// Recording role transport
#[derive(Debug, Default)]
pub struct MemoryRoleTransport {
    calls: Mutex<Vec<RoleCall>>,
    failures: DashMap<RoleId, TransportError>,
}

impl MemoryRoleTransport {
    /// Create transport that accepts every call
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call for `role` fail with `error`
    pub fn fail_role(&self, role: RoleId, error: TransportError) {
        self.failures.insert(role, error);
    }

    /// Stop failing calls for `role`
    pub fn heal_role(&self, role: RoleId) {
        self.failures.remove(&role);
    }

    /// Every call so far, in order (failed calls included)
    #[must_use]
    pub fn calls(&self) -> Vec<RoleCall> {
        self.calls.lock().clone()
    }

    /// Number of grant calls
    #[must_use]
    pub fn grant_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, RoleCall::Grant { .. }))
            .count()
    }

    /// Number of revoke calls
    #[must_use]
    pub fn revoke_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, RoleCall::Revoke { .. }))
            .count()
    }

    fn record(&self, call: RoleCall, role: RoleId) -> Result<(), TransportError> {
        self.calls.lock().push(call);
        match self.failures.get(&role) {
            Some(err) => Err(err.value().clone()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl RoleTransport for MemoryRoleTransport {
    async fn grant_role(
        &self,
        guild: GuildId,
        member: MemberId,
        role: RoleId,
    ) -> Result<(), TransportError> {
        self.record(RoleCall::Grant { guild, member, role }, role)
    }

    async fn revoke_role(
        &self,
        guild: GuildId,
        member: MemberId,
        role: RoleId,
    ) -> Result<(), TransportError> {
        self.record(RoleCall::Revoke { guild, member, role }, role)
    }
}

/// A recorded message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    /// Target channel
    pub channel: ChannelId,
    /// Rendered text
    pub text: String,
}

/// Recording message transport
#[derive(Debug, Default)]
pub struct MemoryMessageTransport {
    sent: Mutex<Vec<SentMessage>>,
    failures: DashMap<ChannelId, TransportError>,
}

impl MemoryMessageTransport {
    /// Create transport that accepts every message
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `channel` fail with `error`
    pub fn fail_channel(&self, channel: ChannelId, error: TransportError) {
        self.failures.insert(channel, error);
    }

    /// Every send attempt so far, in order
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Number of send attempts
    #[must_use]
    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait::async_trait]
impl MessageTransport for MemoryMessageTransport {
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<(), TransportError> {
        self.sent.lock().push(SentMessage {
            channel,
            text: text.to_string(),
        });
        match self.failures.get(&channel) {
            Some(err) => Err(err.value().clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_expected_variants() {
        assert_eq!(TransportError::from_code(50013, "x"), TransportError::MissingPermissions);
        assert_eq!(TransportError::from_code(10011, "x"), TransportError::UnknownRole);
        assert!(TransportError::from_code(10003, "x").is_expected());

        let other = TransportError::from_code(500, "internal");
        assert_eq!(other, TransportError::Other("internal".to_string()));
        assert!(!other.is_expected());
    }

    #[tokio::test]
    async fn memory_role_transport_records_failed_calls() {
        let transport = MemoryRoleTransport::new();
        transport.fail_role(RoleId::new(1), TransportError::MissingPermissions);

        let result = transport
            .grant_role(GuildId::new(1), MemberId::new(2), RoleId::new(1))
            .await;
        assert_eq!(result, Err(TransportError::MissingPermissions));
        assert_eq!(transport.grant_count(), 1);

        transport.heal_role(RoleId::new(1));
        transport
            .revoke_role(GuildId::new(1), MemberId::new(2), RoleId::new(1))
            .await
            .unwrap();
        assert_eq!(transport.revoke_count(), 1);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn memory_message_transport_records_text() {
        let transport = MemoryMessageTransport::new();
        transport.send_message(ChannelId::new(5), "hello").await.unwrap();

        assert_eq!(
            transport.sent(),
            vec![SentMessage {
                channel: ChannelId::new(5),
                text: "hello".to_string(),
            }]
        );
    }
}
