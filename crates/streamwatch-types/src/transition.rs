//! Streaming state and transition edges

use crate::ids::MemberId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a member is considered live for a guild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Tracked as streaming (present in the ledger)
    Streaming,
    /// Not tracked
    NotStreaming,
}

impl StreamState {
    /// State from a boolean "is streaming"
    #[inline]
    #[must_use]
    pub fn from_live(live: bool) -> Self {
        if live {
            Self::Streaming
        } else {
            Self::NotStreaming
        }
    }

    /// `true` for [`StreamState::Streaming`]
    #[inline]
    #[must_use]
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Streaming)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Streaming => f.write_str("streaming"),
            Self::NotStreaming => f.write_str("not-streaming"),
        }
    }
}

/// A committed change of a member's streaming state
///
/// Only produced when the ledger confirmed the change; repeated events with
/// the same desired state produce no transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    /// Member the transition applies to
    pub member_id: MemberId,
    /// State before
    pub from: StreamState,
    /// State after
    pub to: StreamState,
}

impl Transition {
    /// not-streaming -> streaming
    #[inline]
    #[must_use]
    pub fn started(member_id: MemberId) -> Self {
        Self {
            member_id,
            from: StreamState::NotStreaming,
            to: StreamState::Streaming,
        }
    }

    /// streaming -> not-streaming
    #[inline]
    #[must_use]
    pub fn stopped(member_id: MemberId) -> Self {
        Self {
            member_id,
            from: StreamState::Streaming,
            to: StreamState::NotStreaming,
        }
    }

    /// Entry edge into streaming
    #[inline]
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.to.is_streaming() && !self.from.is_streaming()
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.member_id, self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_direction() {
        let start = Transition::started(MemberId::new(1));
        assert!(start.is_start());
        assert_eq!(start.to_string(), "1: not-streaming -> streaming");

        let stop = Transition::stopped(MemberId::new(1));
        assert!(!stop.is_start());
    }

    #[test]
    fn state_from_live() {
        assert!(StreamState::from_live(true).is_streaming());
        assert!(!StreamState::from_live(false).is_streaming());
    }
}
