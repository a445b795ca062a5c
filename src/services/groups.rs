//! Group lifecycle and cycle controller.
//!
//! `formation -> active -> completed`, with `paused` as an orthogonal flag that
//! freezes new joins and payout progression. Activation is evaluated lazily on
//! every join confirmation and on resume.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use super::trust::TrustScoreCalculator;
use crate::config::GroupPolicy;
use crate::error::{EngineError, Result};
use crate::model::{
    CycleSchedule, Group, GroupStatus, Member, Membership, MembershipDecision, MembershipStatus,
    GroupUpdate, NewGroup, PayoutReceiver, TrustEvent, TrustEventType,
};
use crate::storage::sqlite::{early_payouts, groups, members, memberships, trust_events};

/// Smallest group that can rotate a payout.
pub const MIN_GROUP_SIZE: u32 = 2;

/// Result of confirming or deciding a membership.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinOutcome {
    pub status: MembershipStatus,
    /// True only on the call that moved the group into `active`.
    pub activated: bool,
    pub group: Group,
}

#[derive(Debug, Clone)]
pub struct GroupCycleController {
    policy: GroupPolicy,
}

impl GroupCycleController {
    pub fn new(policy: &GroupPolicy) -> Self {
        Self {
            policy: policy.clone(),
        }
    }

    /// Dates stamped when a group fills on `today`.
    pub fn schedule_for(&self, today: NaiveDate) -> CycleSchedule {
        CycleSchedule {
            activated_on: today,
            next_due_date: today + Duration::days(i64::from(self.policy.cycle_days)),
            payout_cutoff: self.policy.payout_cutoff,
        }
    }

    pub async fn create_group(
        &self,
        conn: &mut SqliteConnection,
        new_group: NewGroup,
        now: DateTime<Utc>,
    ) -> Result<Group> {
        let name = new_group.name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("Group name is required"));
        }
        if new_group.monthly_amount <= 0 {
            return Err(EngineError::validation(
                "Monthly amount must be greater than 0",
            ));
        }
        let max_members = new_group
            .max_members
            .unwrap_or(self.policy.default_max_members);
        if max_members < MIN_GROUP_SIZE {
            return Err(EngineError::validation(format!(
                "A group needs at least {MIN_GROUP_SIZE} members"
            )));
        }

        let group = Group {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: new_group.description.trim().to_string(),
            monthly_amount: new_group.monthly_amount,
            max_members,
            status: GroupStatus::Formation,
            paused: false,
            schedule: None,
            receiver: None,
            created_at: now,
        };
        groups::insert(conn, &group).await?;

        info!(
            group_id = %group.id,
            monthly_amount = group.monthly_amount,
            max_members = group.max_members,
            "Group created"
        );
        Ok(group)
    }

    /// A customer opens a group and becomes its first joined member.
    ///
    /// The creator needs a UPI ID on file and must be allowed to join groups.
    /// Creation and the join share the caller's transaction, so a refused join
    /// leaves no group behind.
    pub async fn create_member_group(
        &self,
        conn: &mut SqliteConnection,
        creator_id: Uuid,
        new_group: NewGroup,
        now: DateTime<Utc>,
    ) -> Result<JoinOutcome> {
        let creator = load_member(conn, creator_id).await?;
        if creator.payment_handle().is_none() {
            return Err(EngineError::rejected(
                "Add your UPI ID before creating a group",
            ));
        }

        let group = self.create_group(conn, new_group, now).await?;
        let outcome = self
            .on_membership_joined(conn, group.id, creator_id, now)
            .await?;

        info!(group_id = %group.id, creator_id = %creator_id, "Member group created");
        Ok(outcome)
    }

    /// Admin edit of name, description and monthly amount.
    ///
    /// Completed groups are frozen. The amount can only change while the group
    /// is still forming, since active members already contribute at it.
    pub async fn update_group(
        &self,
        conn: &mut SqliteConnection,
        group_id: Uuid,
        update: GroupUpdate,
    ) -> Result<Group> {
        let mut group = load_group(conn, group_id).await?;
        if update.is_empty() {
            return Ok(group);
        }
        if group.status == GroupStatus::Completed {
            return Err(EngineError::rejected("Completed groups cannot be edited"));
        }

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(EngineError::validation("Group name is required"));
            }
            group.name = name.to_string();
        }
        if let Some(description) = update.description {
            group.description = description.trim().to_string();
        }
        if let Some(amount) = update.monthly_amount {
            if amount <= 0 {
                return Err(EngineError::validation(
                    "Monthly amount must be greater than 0",
                ));
            }
            if amount != group.monthly_amount && group.status != GroupStatus::Formation {
                return Err(EngineError::rejected(
                    "Monthly amount can only change while the group is forming",
                ));
            }
            group.monthly_amount = amount;
        }
        groups::save(conn, &group).await?;

        info!(group_id = %group_id, monthly_amount = group.monthly_amount, "Group updated");
        Ok(group)
    }

    /// Delete a forming group together with its memberships.
    ///
    /// Groups that went active, or that trust events or early payout requests
    /// point at, are kept.
    pub async fn delete_group(
        &self,
        conn: &mut SqliteConnection,
        group_id: Uuid,
    ) -> Result<Group> {
        let group = load_group(conn, group_id).await?;
        if group.status != GroupStatus::Formation {
            return Err(EngineError::rejected(format!(
                "Group is {}, only forming groups can be deleted",
                group.status.as_str()
            )));
        }
        if trust_events::exists_for_group(conn, group_id).await?
            || early_payouts::exists_for_group(conn, group_id).await?
        {
            return Err(EngineError::rejected(
                "Group has recorded history and cannot be deleted",
            ));
        }

        let removed = memberships::delete_for_group(conn, group_id).await?;
        groups::delete(conn, group_id).await?;

        info!(group_id = %group_id, memberships = removed, "Group deleted");
        Ok(group)
    }

    /// Record a pending join request for admin review.
    pub async fn request_join(
        &self,
        conn: &mut SqliteConnection,
        group_id: Uuid,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Membership> {
        let group = load_group(conn, group_id).await?;
        let member = load_member(conn, member_id).await?;

        if let Some(existing) = memberships::find(conn, group_id, member_id).await? {
            debug!(
                group_id = %group_id,
                member_id = %member_id,
                status = existing.status.as_str(),
                "Join request already on file"
            );
            return Ok(existing);
        }

        self.check_can_join(conn, &group, &member).await?;

        let membership = Membership {
            group_id,
            member_id,
            status: MembershipStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        memberships::insert(conn, &membership).await?;

        info!(group_id = %group_id, member_id = %member_id, "Join requested");
        Ok(membership)
    }

    /// Insert or confirm a joined membership, then run the activation check.
    ///
    /// Re-invoking for a member who already joined changes nothing. A
    /// rejected membership is reported back unchanged.
    pub async fn on_membership_joined(
        &self,
        conn: &mut SqliteConnection,
        group_id: Uuid,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<JoinOutcome> {
        let mut group = load_group(conn, group_id).await?;
        let member = load_member(conn, member_id).await?;

        let status = match memberships::find(conn, group_id, member_id).await? {
            Some(existing) => match existing.status {
                MembershipStatus::Joined => MembershipStatus::Joined,
                MembershipStatus::Rejected => {
                    return Ok(JoinOutcome {
                        status: MembershipStatus::Rejected,
                        activated: false,
                        group,
                    });
                }
                MembershipStatus::Pending => {
                    self.check_can_join(conn, &group, &member).await?;
                    let status = existing.status.transition(MembershipStatus::Joined)?;
                    memberships::set_status(conn, group_id, member_id, status, now).await?;
                    status
                }
            },
            None => {
                self.check_can_join(conn, &group, &member).await?;
                memberships::insert(
                    conn,
                    &Membership {
                        group_id,
                        member_id,
                        status: MembershipStatus::Joined,
                        created_at: now,
                        updated_at: now,
                    },
                )
                .await?;
                MembershipStatus::Joined
            }
        };

        info!(group_id = %group_id, member_id = %member_id, "Membership joined");

        let activated = self
            .activate_if_full(conn, &mut group, now.date_naive())
            .await?;
        Ok(JoinOutcome {
            status,
            activated,
            group,
        })
    }

    /// Admin decision on a pending membership. Approval joins and runs the
    /// activation check.
    pub async fn decide_membership(
        &self,
        conn: &mut SqliteConnection,
        group_id: Uuid,
        member_id: Uuid,
        decision: MembershipDecision,
        now: DateTime<Utc>,
    ) -> Result<JoinOutcome> {
        let existing = memberships::find(conn, group_id, member_id)
            .await?
            .ok_or_else(|| EngineError::not_found("membership", format!("{group_id}/{member_id}")))?;
        let status = existing.status.transition(decision.target())?;

        if status == MembershipStatus::Joined {
            return self.on_membership_joined(conn, group_id, member_id, now).await;
        }

        memberships::set_status(conn, group_id, member_id, status, now).await?;
        info!(
            group_id = %group_id,
            member_id = %member_id,
            status = status.as_str(),
            "Membership decided"
        );
        Ok(JoinOutcome {
            status,
            activated: false,
            group: load_group(conn, group_id).await?,
        })
    }

    /// Move a full formation group to `active` and stamp its schedule.
    ///
    /// Skipped for paused, completed and already scheduled groups, which makes
    /// repeated calls a no-op.
    pub async fn activate_if_full(
        &self,
        conn: &mut SqliteConnection,
        group: &mut Group,
        today: NaiveDate,
    ) -> Result<bool> {
        if group.paused || group.status == GroupStatus::Completed || group.is_scheduled() {
            return Ok(false);
        }

        let joined = memberships::count_joined(conn, group.id).await?;
        if joined < group.max_members {
            debug!(
                group_id = %group.id,
                joined,
                max_members = group.max_members,
                "Group still forming"
            );
            return Ok(false);
        }

        if group.status == GroupStatus::Formation {
            group.status = group.status.transition(GroupStatus::Active)?;
        }
        let schedule = self.schedule_for(today);
        group.schedule = Some(schedule);
        group.receiver = None;
        groups::save(conn, group).await?;

        info!(
            group_id = %group.id,
            activated_on = %schedule.activated_on,
            next_due_date = %schedule.next_due_date,
            "Group activated"
        );
        Ok(true)
    }

    /// Designate this cycle's payout receiver.
    pub async fn select_receiver(
        &self,
        conn: &mut SqliteConnection,
        group_id: Uuid,
        member_id: Uuid,
        today: NaiveDate,
    ) -> Result<Group> {
        let mut group = load_group(conn, group_id).await?;

        if group.status != GroupStatus::Active {
            return Err(EngineError::rejected(format!(
                "Group is {}, payout receivers are chosen only for active groups",
                group.status.as_str()
            )));
        }
        if group.paused {
            return Err(EngineError::rejected("Group is paused"));
        }
        let schedule = group
            .schedule
            .ok_or_else(|| EngineError::rejected("Group has no payout schedule"))?;
        if !schedule.is_due(today) {
            return Err(EngineError::rejected(format!(
                "Payout receiver can be selected from {} onwards",
                schedule.next_due_date
            )));
        }

        let joined = memberships::find(conn, group_id, member_id)
            .await?
            .is_some_and(|m| m.status == MembershipStatus::Joined);
        if !joined {
            return Err(EngineError::rejected(
                "Receiver must be a joined member of the group",
            ));
        }
        let member = load_member(conn, member_id).await?;
        let upi_id = member
            .payment_handle()
            .ok_or_else(|| EngineError::rejected("Receiver has no UPI ID on file"))?
            .to_string();

        group.receiver = Some(PayoutReceiver {
            member_id,
            username: member.username.clone(),
            display_name: member.display_name().to_string(),
            upi_id,
            selected_on: today,
        });
        groups::save(conn, &group).await?;

        info!(
            group_id = %group_id,
            member_id = %member_id,
            due_date = %schedule.next_due_date,
            "Payout receiver selected"
        );
        Ok(group)
    }

    pub async fn pause(&self, conn: &mut SqliteConnection, group_id: Uuid) -> Result<Group> {
        let mut group = load_group(conn, group_id).await?;
        if group.status == GroupStatus::Completed {
            return Err(EngineError::rejected("Completed groups cannot be paused"));
        }
        if !group.paused {
            group.paused = true;
            groups::save(conn, &group).await?;
            info!(group_id = %group_id, "Group paused");
        }
        Ok(group)
    }

    /// Lift the pause and catch up on an activation missed while paused.
    pub async fn resume(
        &self,
        conn: &mut SqliteConnection,
        group_id: Uuid,
        today: NaiveDate,
    ) -> Result<Group> {
        let mut group = load_group(conn, group_id).await?;
        if group.paused {
            group.paused = false;
            groups::save(conn, &group).await?;
            info!(group_id = %group_id, "Group resumed");
        }
        self.activate_if_full(conn, &mut group, today).await?;
        Ok(group)
    }

    /// Close an active group and credit every joined member with a completion.
    pub async fn complete(
        &self,
        conn: &mut SqliteConnection,
        trust: &TrustScoreCalculator,
        group_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Group> {
        let mut group = load_group(conn, group_id).await?;
        group.status = group.status.transition(GroupStatus::Completed)?;
        groups::save(conn, &group).await?;

        let joined: Vec<Uuid> = memberships::list_for_group(conn, group_id)
            .await?
            .into_iter()
            .filter(|m| m.status == MembershipStatus::Joined)
            .map(|m| m.member_id)
            .collect();
        for member_id in &joined {
            let event = TrustEvent::new(*member_id, TrustEventType::GroupCompleted, now)
                .in_group(group_id);
            trust.record(conn, event).await?;
        }

        info!(group_id = %group_id, members = joined.len(), "Group completed");
        Ok(group)
    }

    async fn check_can_join(
        &self,
        conn: &mut SqliteConnection,
        group: &Group,
        member: &Member,
    ) -> Result<()> {
        if member.is_admin() {
            return Err(EngineError::rejected("Admins cannot join groups"));
        }
        if member.join_blocked {
            return Err(EngineError::rejected(
                "Your account is blocked from joining groups",
            ));
        }
        if group.status == GroupStatus::Completed {
            return Err(EngineError::rejected("Group is completed"));
        }
        if group.paused {
            return Err(EngineError::rejected("Group is paused"));
        }
        let joined = memberships::count_joined(conn, group.id).await?;
        if joined >= group.max_members {
            return Err(EngineError::rejected("Group is full"));
        }
        Ok(())
    }
}

pub(crate) async fn load_group(conn: &mut SqliteConnection, group_id: Uuid) -> Result<Group> {
    groups::find(conn, group_id)
        .await?
        .ok_or_else(|| EngineError::not_found("group", group_id))
}

pub(crate) async fn load_member(conn: &mut SqliteConnection, member_id: Uuid) -> Result<Member> {
    members::find(conn, member_id)
        .await?
        .ok_or_else(|| EngineError::not_found("member", member_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn test_schedule_uses_policy() {
        let controller = GroupCycleController::new(&GroupPolicy {
            cycle_days: 28,
            payout_cutoff: NaiveTime::from_hms_opt(17, 30, 0).unwrap(),
            default_max_members: 10,
        });
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let schedule = controller.schedule_for(today);
        assert_eq!(schedule.activated_on, today);
        assert_eq!(
            schedule.next_due_date,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
        assert_eq!(
            schedule.payout_cutoff,
            NaiveTime::from_hms_opt(17, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_default_schedule_is_thirty_days() {
        let controller = GroupCycleController::new(&GroupPolicy::default());
        let today = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(
            controller.schedule_for(today).next_due_date,
            NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()
        );
    }
}
