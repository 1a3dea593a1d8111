//! Follow/subscription edge state

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription state of a session towards a community, as reported by the
/// follower's instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubscribedType {
    #[default]
    NotSubscribed,
    /// Follow sent to a remote community and not yet accepted.
    Pending,
    /// Follow sent to a private community and awaiting moderator approval.
    ApprovalRequired,
    Subscribed,
}

impl SubscribedType {
    /// Waiting on the community's home instance.
    pub fn is_awaiting(self) -> bool {
        matches!(self, SubscribedType::Pending | SubscribedType::ApprovalRequired)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_awaiting()
    }

    /// Transitions observable without the follower sending a new request.
    ///
    /// Leaving `NotSubscribed` always needs a new follow request, see
    /// [`FollowTracker::request`].
    pub fn can_transition_to(self, next: SubscribedType) -> bool {
        use SubscribedType::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Pending, ApprovalRequired) | (ApprovalRequired, Pending) => true,
            (Pending | ApprovalRequired, Subscribed | NotSubscribed) => true,
            (Subscribed, NotSubscribed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SubscribedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscribedType::NotSubscribed => "NotSubscribed",
            SubscribedType::Pending => "Pending",
            SubscribedType::ApprovalRequired => "ApprovalRequired",
            SubscribedType::Subscribed => "Subscribed",
        };
        f.write_str(s)
    }
}

/// Follow state as stored in `community_actions` on newer servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityFollowerState {
    Accepted,
    Pending,
    ApprovalRequired,
    Denied,
}

impl From<CommunityFollowerState> for SubscribedType {
    fn from(state: CommunityFollowerState) -> Self {
        match state {
            CommunityFollowerState::Accepted => SubscribedType::Subscribed,
            CommunityFollowerState::Pending => SubscribedType::Pending,
            CommunityFollowerState::ApprovalRequired => SubscribedType::ApprovalRequired,
            CommunityFollowerState::Denied => SubscribedType::NotSubscribed,
        }
    }
}

/// Records observed states of one follow edge and rejects observations that
/// break monotonicity.
#[derive(Debug, Clone, Default)]
pub struct FollowTracker {
    current: SubscribedType,
    requested: bool,
    history: Vec<SubscribedType>,
}

impl FollowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> SubscribedType {
        self.current
    }

    pub fn history(&self) -> &[SubscribedType] {
        &self.history
    }

    /// Note that a new follow request was sent.
    pub fn request(&mut self) {
        self.requested = true;
    }

    /// Record a freshly fetched state.
    pub fn observe(&mut self, next: SubscribedType) -> Result<()> {
        let allowed = if self.current == SubscribedType::NotSubscribed && self.requested {
            true
        } else {
            self.current.can_transition_to(next)
        };

        if !allowed {
            return Err(Error::state_transition(format!(
                "follow state moved from {} to {} without a new follow request",
                self.current, next
            )));
        }

        if next != self.current {
            self.history.push(next);
        }
        if next != SubscribedType::NotSubscribed {
            self.requested = false;
        }
        self.current = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_awaiting_states() {
        assert!(SubscribedType::Pending.is_awaiting());
        assert!(SubscribedType::ApprovalRequired.is_awaiting());
        assert!(SubscribedType::Subscribed.is_terminal());
        assert!(SubscribedType::NotSubscribed.is_terminal());
    }

    #[test]
    fn test_serde_uses_server_spelling() {
        let s: SubscribedType = serde_json::from_str("\"ApprovalRequired\"").unwrap();
        assert_eq!(s, SubscribedType::ApprovalRequired);
        let f: CommunityFollowerState = serde_json::from_str("\"approval_required\"").unwrap();
        assert_eq!(SubscribedType::from(f), SubscribedType::ApprovalRequired);
    }

    #[test]
    fn test_approval_flow() {
        let mut tracker = FollowTracker::new();
        tracker.request();
        tracker.observe(SubscribedType::ApprovalRequired).unwrap();
        tracker.observe(SubscribedType::ApprovalRequired).unwrap();
        tracker.observe(SubscribedType::Subscribed).unwrap();
        assert_eq!(
            tracker.history(),
            &[SubscribedType::ApprovalRequired, SubscribedType::Subscribed]
        );
    }

    #[test]
    fn test_rejection_returns_to_not_subscribed() {
        let mut tracker = FollowTracker::new();
        tracker.request();
        tracker.observe(SubscribedType::ApprovalRequired).unwrap();
        tracker.observe(SubscribedType::NotSubscribed).unwrap();
        assert_eq!(tracker.current(), SubscribedType::NotSubscribed);
    }

    #[test]
    fn test_awaiting_does_not_reappear_without_request() {
        let mut tracker = FollowTracker::new();
        tracker.request();
        tracker.observe(SubscribedType::ApprovalRequired).unwrap();
        tracker.observe(SubscribedType::Subscribed).unwrap();

        let err = tracker.observe(SubscribedType::ApprovalRequired).unwrap_err();
        assert_eq!(err.category(), "state_transition");

        tracker.observe(SubscribedType::NotSubscribed).unwrap();
        assert!(tracker.observe(SubscribedType::ApprovalRequired).is_err());

        tracker.request();
        tracker.observe(SubscribedType::ApprovalRequired).unwrap();
    }
}
