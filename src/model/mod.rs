//! Domain records and their state machines.
//!
//! Each lifecycle column of the relational store is modelled as a closed enum
//! with an explicit `transition` function. Moves outside a machine's table are
//! rejected with [`TransitionError`].

pub mod early_payout;
pub mod fee;
pub mod group;
pub mod member;
pub mod membership;
pub mod referral;
pub mod trust;

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

pub use early_payout::{DepositStatus, EarlyPayoutRequest, PayoutDecision, PayoutRequestStatus};
pub use fee::{FeePayment, FeeStatus};
pub use group::{CycleSchedule, Group, GroupStatus, GroupUpdate, NewGroup, PayoutReceiver};
pub use member::{KycDocument, KycDocuments, Member, MemberRole, NewMember};
pub use membership::{Membership, MembershipDecision, MembershipStatus};
pub use referral::{Referral, ReferralStatus, ReferralSummary};
pub use trust::{TrustEvent, TrustEventType};

/// A state change that is not in a machine's transition table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move {entity} from {from} to {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

/// A stored enum column held a value outside its closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Calendar month used to key fee payments and credit redemption (`YYYY-MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || UnknownVariant {
            kind: "month key",
            value: s.to_string(),
        };
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(Self { year, month })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_key_format_and_parse() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let key = MonthKey::from_date(date);
        assert_eq!(key.to_string(), "2026-03");
        assert_eq!("2026-03".parse::<MonthKey>().unwrap(), key);
    }

    #[test]
    fn test_month_key_rejects_garbage() {
        assert!("2026-13".parse::<MonthKey>().is_err());
        assert!("202603".parse::<MonthKey>().is_err());
        assert!("abcd-01".parse::<MonthKey>().is_err());
    }
}
