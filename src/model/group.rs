//! Savings groups and their cycle schedule.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{TransitionError, UnknownVariant};

/// Lifecycle status of a group. Pausing is a separate flag, not a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Formation,
    Active,
    Completed,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Formation => "formation",
            GroupStatus::Active => "active",
            GroupStatus::Completed => "completed",
        }
    }

    /// `formation -> active -> completed`, nothing else.
    pub fn transition(self, to: GroupStatus) -> Result<GroupStatus, TransitionError> {
        match (self, to) {
            (GroupStatus::Formation, GroupStatus::Active)
            | (GroupStatus::Active, GroupStatus::Completed) => Ok(to),
            _ => Err(TransitionError {
                entity: "group",
                from: self.as_str(),
                to: to.as_str(),
            }),
        }
    }
}

impl FromStr for GroupStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "formation" => Ok(GroupStatus::Formation),
            "active" => Ok(GroupStatus::Active),
            "completed" => Ok(GroupStatus::Completed),
            other => Err(UnknownVariant {
                kind: "group status",
                value: other.to_string(),
            }),
        }
    }
}

/// Dates stamped once when the group fills. Activation date and due date are
/// always present together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleSchedule {
    pub activated_on: NaiveDate,
    pub next_due_date: NaiveDate,
    pub payout_cutoff: NaiveTime,
}

impl CycleSchedule {
    /// Receiver selection opens on the due date.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        today >= self.next_due_date
    }
}

/// Snapshot of the member designated to receive this cycle's payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutReceiver {
    pub member_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub upi_id: String,
    pub selected_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub monthly_amount: i64,
    pub max_members: u32,
    pub status: GroupStatus,
    pub paused: bool,
    pub schedule: Option<CycleSchedule>,
    pub receiver: Option<PayoutReceiver>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    /// New memberships are frozen while paused and after completion.
    pub fn accepts_joins(&self) -> bool {
        !self.paused && self.status != GroupStatus::Completed
    }
}

/// Group creation input.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub monthly_amount: i64,
    pub max_members: Option<u32>,
}

impl NewGroup {
    pub fn new(name: impl Into<String>, monthly_amount: i64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            monthly_amount,
            max_members: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_max_members(mut self, max_members: u32) -> Self {
        self.max_members = Some(max_members);
        self
    }
}

/// Admin edit of a group. Unset fields stay as they are.
#[derive(Debug, Clone, Default)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub monthly_amount: Option<i64>,
}

impl GroupUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn monthly_amount(mut self, monthly_amount: i64) -> Self {
        self.monthly_amount = Some(monthly_amount);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.monthly_amount.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_status_transitions() {
        assert_eq!(
            GroupStatus::Formation.transition(GroupStatus::Active),
            Ok(GroupStatus::Active)
        );
        assert_eq!(
            GroupStatus::Active.transition(GroupStatus::Completed),
            Ok(GroupStatus::Completed)
        );
        assert!(GroupStatus::Formation
            .transition(GroupStatus::Completed)
            .is_err());
        assert!(GroupStatus::Completed.transition(GroupStatus::Active).is_err());
        assert!(GroupStatus::Active.transition(GroupStatus::Active).is_err());
    }

    #[test]
    fn test_schedule_due_on_or_after_due_date() {
        let due = NaiveDate::from_ymd_opt(2026, 5, 31).unwrap();
        let schedule = CycleSchedule {
            activated_on: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            next_due_date: due,
            payout_cutoff: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        };
        assert!(!schedule.is_due(due.pred_opt().unwrap()));
        assert!(schedule.is_due(due));
        assert!(schedule.is_due(due.succ_opt().unwrap()));
    }
}
