//! Trust events: the append-only log the trust score is folded from.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustEventType {
    ContributionVerified,
    ContributionRejected,
    PaymentMissed,
    DefaultAfterPayout,
    DepositVerified,
    GroupCompleted,
}

impl TrustEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustEventType::ContributionVerified => "contribution_verified",
            TrustEventType::ContributionRejected => "contribution_rejected",
            TrustEventType::PaymentMissed => "payment_missed",
            TrustEventType::DefaultAfterPayout => "default_after_payout",
            TrustEventType::DepositVerified => "deposit_verified",
            TrustEventType::GroupCompleted => "group_completed",
        }
    }

    /// Events that permanently bar a member from early payout.
    pub fn is_delinquency(&self) -> bool {
        matches!(
            self,
            TrustEventType::PaymentMissed | TrustEventType::DefaultAfterPayout
        )
    }
}

impl FromStr for TrustEventType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contribution_verified" => Ok(TrustEventType::ContributionVerified),
            "contribution_rejected" => Ok(TrustEventType::ContributionRejected),
            "payment_missed" => Ok(TrustEventType::PaymentMissed),
            "default_after_payout" => Ok(TrustEventType::DefaultAfterPayout),
            "deposit_verified" => Ok(TrustEventType::DepositVerified),
            "group_completed" => Ok(TrustEventType::GroupCompleted),
            other => Err(UnknownVariant {
                kind: "trust event type",
                value: other.to_string(),
            }),
        }
    }
}

/// One immutable entry in a member's trust history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustEvent {
    pub member_id: Uuid,
    pub sequence: u32,
    pub event_type: TrustEventType,
    pub group_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub note: String,
}

impl TrustEvent {
    /// Build an unsequenced event; the store assigns the sequence on append.
    pub fn new(member_id: Uuid, event_type: TrustEventType, created_at: DateTime<Utc>) -> Self {
        Self {
            member_id,
            sequence: 0,
            event_type,
            group_id: None,
            due_date: None,
            verified_at: None,
            created_at,
            note: String::new(),
        }
    }

    pub fn in_group(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn due_on(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn verified_at(mut self, verified_at: DateTime<Utc>) -> Self {
        self.verified_at = Some(verified_at);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}
