//! Early payout requests and their security-deposit sub-workflow.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{TransitionError, UnknownVariant};

/// Request status:
/// `pending_deposit -> under_review -> approved | rejected`, with
/// `pending_deposit -> rejected` allowed for requests that never get a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutRequestStatus {
    PendingDeposit,
    UnderReview,
    Approved,
    Rejected,
}

impl PayoutRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutRequestStatus::PendingDeposit => "pending_deposit",
            PayoutRequestStatus::UnderReview => "under_review",
            PayoutRequestStatus::Approved => "approved",
            PayoutRequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PayoutRequestStatus::Approved | PayoutRequestStatus::Rejected
        )
    }

    pub fn transition(self, to: PayoutRequestStatus) -> Result<PayoutRequestStatus, TransitionError> {
        use PayoutRequestStatus::*;
        match (self, to) {
            (PendingDeposit, UnderReview)
            | (PendingDeposit, Rejected)
            | (UnderReview, Approved)
            | (UnderReview, Rejected) => Ok(to),
            _ => Err(TransitionError {
                entity: "early payout request",
                from: self.as_str(),
                to: to.as_str(),
            }),
        }
    }
}

impl FromStr for PayoutRequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_deposit" => Ok(PayoutRequestStatus::PendingDeposit),
            "under_review" => Ok(PayoutRequestStatus::UnderReview),
            "approved" => Ok(PayoutRequestStatus::Approved),
            "rejected" => Ok(PayoutRequestStatus::Rejected),
            other => Err(UnknownVariant {
                kind: "early payout status",
                value: other.to_string(),
            }),
        }
    }
}

/// Security deposit status: `not_paid -> submitted -> verified`.
/// A submitted deposit may be resubmitted to correct the UTR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    NotPaid,
    Submitted,
    Verified,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::NotPaid => "not_paid",
            DepositStatus::Submitted => "submitted",
            DepositStatus::Verified => "verified",
        }
    }

    pub fn transition(self, to: DepositStatus) -> Result<DepositStatus, TransitionError> {
        use DepositStatus::*;
        match (self, to) {
            (NotPaid, Submitted) | (Submitted, Submitted) | (Submitted, Verified) => Ok(to),
            _ => Err(TransitionError {
                entity: "security deposit",
                from: self.as_str(),
                to: to.as_str(),
            }),
        }
    }
}

impl FromStr for DepositStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_paid" => Ok(DepositStatus::NotPaid),
            "submitted" => Ok(DepositStatus::Submitted),
            "verified" => Ok(DepositStatus::Verified),
            other => Err(UnknownVariant {
                kind: "deposit status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarlyPayoutRequest {
    pub id: Uuid,
    pub member_id: Uuid,
    pub group_id: Uuid,
    pub monthly_amount: i64,
    pub trust_score: i32,
    pub deposit_amount: i64,
    pub status: PayoutRequestStatus,
    pub deposit_status: DepositStatus,
    pub utr: Option<String>,
    pub reason: String,
    pub decision_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deposit_submitted_at: Option<DateTime<Utc>>,
    pub deposit_verified_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl EarlyPayoutRequest {
    pub fn is_unresolved(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_transitions() {
        use PayoutRequestStatus::*;
        assert!(PendingDeposit.transition(UnderReview).is_ok());
        assert!(PendingDeposit.transition(Rejected).is_ok());
        assert!(PendingDeposit.transition(Approved).is_err());
        assert!(UnderReview.transition(Approved).is_ok());
        assert!(Approved.transition(Rejected).is_err());
        assert!(Rejected.transition(Approved).is_err());
    }

    #[test]
    fn test_deposit_transitions() {
        use DepositStatus::*;
        assert!(NotPaid.transition(Submitted).is_ok());
        assert!(Submitted.transition(Submitted).is_ok());
        assert!(Submitted.transition(Verified).is_ok());
        assert!(NotPaid.transition(Verified).is_err());
        assert!(Verified.transition(Submitted).is_err());
    }
}
