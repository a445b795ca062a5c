//! Group memberships.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{TransitionError, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Joined,
    Rejected,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Joined => "joined",
            MembershipStatus::Rejected => "rejected",
        }
    }

    /// Only a pending membership can be decided.
    pub fn transition(self, to: MembershipStatus) -> Result<MembershipStatus, TransitionError> {
        match (self, to) {
            (MembershipStatus::Pending, MembershipStatus::Joined)
            | (MembershipStatus::Pending, MembershipStatus::Rejected) => Ok(to),
            _ => Err(TransitionError {
                entity: "membership",
                from: self.as_str(),
                to: to.as_str(),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "Pending approval",
            MembershipStatus::Joined => "Approved",
            MembershipStatus::Rejected => "Rejected",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "Admin will review your request soon.",
            MembershipStatus::Joined => "You're in. Watch for the group's payment instructions.",
            MembershipStatus::Rejected => "If you think this is a mistake, contact support.",
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MembershipStatus::Pending),
            "joined" => Ok(MembershipStatus::Joined),
            "rejected" => Ok(MembershipStatus::Rejected),
            other => Err(UnknownVariant {
                kind: "membership status",
                value: other.to_string(),
            }),
        }
    }
}

/// Admin decision on a pending join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipDecision {
    Approve,
    Reject,
}

impl MembershipDecision {
    pub fn target(&self) -> MembershipStatus {
        match self {
            MembershipDecision::Approve => MembershipStatus::Joined,
            MembershipDecision::Reject => MembershipStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub group_id: Uuid,
    pub member_id: Uuid,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_memberships_are_decided() {
        assert!(MembershipStatus::Pending
            .transition(MembershipStatus::Joined)
            .is_ok());
        assert!(MembershipStatus::Pending
            .transition(MembershipStatus::Rejected)
            .is_ok());
        assert!(MembershipStatus::Joined
            .transition(MembershipStatus::Rejected)
            .is_err());
        assert!(MembershipStatus::Rejected
            .transition(MembershipStatus::Joined)
            .is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(MembershipStatus::Pending.label(), "Pending approval");
        assert_eq!(MembershipStatus::Joined.label(), "Approved");
        assert_eq!(MembershipDecision::Reject.target(), MembershipStatus::Rejected);
    }
}
