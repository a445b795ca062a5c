//! Referral records and the fee credits they mint.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{MonthKey, TransitionError, UnknownVariant};

/// `PENDING -> ELIGIBLE -> CREDITED`. Crediting is always an explicit admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReferralStatus {
    Pending,
    Eligible,
    Credited,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "PENDING",
            ReferralStatus::Eligible => "ELIGIBLE",
            ReferralStatus::Credited => "CREDITED",
        }
    }

    pub fn transition(self, to: ReferralStatus) -> Result<ReferralStatus, TransitionError> {
        match (self, to) {
            (ReferralStatus::Pending, ReferralStatus::Eligible)
            | (ReferralStatus::Eligible, ReferralStatus::Credited) => Ok(to),
            _ => Err(TransitionError {
                entity: "referral",
                from: self.as_str(),
                to: to.as_str(),
            }),
        }
    }
}

impl FromStr for ReferralStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReferralStatus::Pending),
            "ELIGIBLE" => Ok(ReferralStatus::Eligible),
            "CREDITED" => Ok(ReferralStatus::Credited),
            other => Err(UnknownVariant {
                kind: "referral status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
    pub eligible_at: Option<DateTime<Utc>>,
    pub credited_at: Option<DateTime<Utc>>,
    pub credit_amount: i64,
    pub credit_expires_at: Option<DateTime<Utc>>,
    pub credit_used: bool,
    pub credit_used_month: Option<MonthKey>,
}

impl Referral {
    /// A credited, unused credit whose expiry lies after `now`.
    pub fn is_spendable(&self, now: DateTime<Utc>) -> bool {
        self.status == ReferralStatus::Credited
            && !self.credit_used
            && self.credit_expires_at.is_some_and(|expires| expires > now)
    }

    pub fn is_expired_unused(&self, now: DateTime<Utc>) -> bool {
        self.status == ReferralStatus::Credited
            && !self.credit_used
            && self.credit_expires_at.is_some_and(|expires| expires <= now)
    }
}

/// Per-referrer view of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferralSummary {
    pub pending: u32,
    pub eligible: u32,
    pub credited: u32,
    pub available_credit: i64,
    pub used_credit: i64,
    pub expired_credit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn credited(expires_at: DateTime<Utc>) -> Referral {
        let now = Utc::now();
        Referral {
            id: Uuid::new_v4(),
            referrer_id: Uuid::new_v4(),
            referred_id: Uuid::new_v4(),
            status: ReferralStatus::Credited,
            created_at: now,
            eligible_at: Some(now),
            credited_at: Some(now),
            credit_amount: 10,
            credit_expires_at: Some(expires_at),
            credit_used: false,
            credit_used_month: None,
        }
    }

    #[test]
    fn test_referral_transitions_are_one_way() {
        use ReferralStatus::*;
        assert!(Pending.transition(Eligible).is_ok());
        assert!(Eligible.transition(Credited).is_ok());
        assert!(Pending.transition(Credited).is_err());
        assert!(Credited.transition(Credited).is_err());
        assert!(Eligible.transition(Pending).is_err());
    }

    #[test]
    fn test_spendable_respects_expiry_and_use() {
        let now = Utc::now();
        let live = credited(now + Duration::days(1));
        assert!(live.is_spendable(now));
        assert!(!live.is_expired_unused(now));

        let expired = credited(now - Duration::seconds(1));
        assert!(!expired.is_spendable(now));
        assert!(expired.is_expired_unused(now));

        let used = Referral {
            credit_used: true,
            ..live
        };
        assert!(!used.is_spendable(now));
    }
}
