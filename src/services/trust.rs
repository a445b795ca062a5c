//! Trust score calculation.
//!
//! The score is a linear fold over the member's trust events. The member row
//! only caches the last result; [`TrustScoreCalculator::refresh`] recomputes it
//! from the log and writes it back.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::config::TrustPolicy;
use crate::model::member::NEUTRAL_TRUST_SCORE;
use crate::model::{TrustEvent, TrustEventType};
use crate::storage::sqlite::{members, trust_events};
use crate::storage::Result;

pub const ON_TIME_POINTS: i32 = 3;
pub const LATE_POINTS: i32 = 1;
pub const COMPLETED_GROUP_POINTS: i32 = 5;
pub const DEPOSIT_VERIFIED_POINTS: i32 = 2;
pub const MISSED_POINTS: i32 = -8;
pub const DEFAULT_AFTER_PAYOUT_POINTS: i32 = -15;
pub const REJECTED_POINTS: i32 = -3;

pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

/// Event counts per scoring category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrustBreakdown {
    pub on_time: u32,
    pub late: u32,
    pub missed: u32,
    pub rejected: u32,
    pub completed_groups: u32,
    pub deposit_verified: u32,
    pub default_after_payout: u32,
}

/// One row of the explanation shown to a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownLine {
    pub category: &'static str,
    pub count: u32,
    pub points: i32,
}

impl TrustBreakdown {
    /// Score before clamping.
    pub fn raw_score(&self) -> i32 {
        self.lines()
            .iter()
            .fold(NEUTRAL_TRUST_SCORE, |score, line| score + line.points)
    }

    /// Non-empty categories with the points each contributed.
    pub fn lines(&self) -> Vec<BreakdownLine> {
        [
            ("on_time", self.on_time, ON_TIME_POINTS),
            ("late", self.late, LATE_POINTS),
            ("completed_groups", self.completed_groups, COMPLETED_GROUP_POINTS),
            ("deposit_verified", self.deposit_verified, DEPOSIT_VERIFIED_POINTS),
            ("missed", self.missed, MISSED_POINTS),
            (
                "default_after_payout",
                self.default_after_payout,
                DEFAULT_AFTER_PAYOUT_POINTS,
            ),
            ("rejected", self.rejected, REJECTED_POINTS),
        ]
        .into_iter()
        .filter(|(_, count, _)| *count > 0)
        .map(|(category, count, weight)| BreakdownLine {
            category,
            count,
            points: weight.saturating_mul(count as i32),
        })
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        *self == TrustBreakdown::default()
    }
}

/// Result of one computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustScore {
    pub score: i32,
    pub breakdown: TrustBreakdown,
    pub events: Vec<TrustEvent>,
}

impl TrustScore {
    pub fn neutral() -> Self {
        Self {
            score: NEUTRAL_TRUST_SCORE,
            breakdown: TrustBreakdown::default(),
            events: Vec::new(),
        }
    }
}

/// How a verified contribution landed relative to its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuality {
    OnTime,
    Late,
    /// Late by more than the grace period. Counts as both late and missed.
    BeyondGrace,
}

#[derive(Debug, Clone)]
pub struct TrustScoreCalculator {
    grace_days: i64,
}

impl TrustScoreCalculator {
    pub fn new(policy: &TrustPolicy) -> Self {
        Self {
            grace_days: policy.effective_grace_days(),
        }
    }

    pub fn grace_days(&self) -> i64 {
        self.grace_days
    }

    /// Classify a contribution. Missing dates are treated as late.
    pub fn punctuality(&self, due: Option<NaiveDate>, verified: Option<NaiveDate>) -> Punctuality {
        let (Some(due), Some(verified)) = (due, verified) else {
            return Punctuality::Late;
        };
        if verified <= due {
            return Punctuality::OnTime;
        }
        if (verified - due).num_days() > self.grace_days {
            Punctuality::BeyondGrace
        } else {
            Punctuality::Late
        }
    }

    pub fn tally(&self, events: &[TrustEvent]) -> TrustBreakdown {
        let mut breakdown = TrustBreakdown::default();
        for event in events {
            match event.event_type {
                TrustEventType::ContributionVerified => {
                    let verified = event.verified_at.map(|at| at.date_naive());
                    match self.punctuality(event.due_date, verified) {
                        Punctuality::OnTime => breakdown.on_time += 1,
                        Punctuality::Late => breakdown.late += 1,
                        Punctuality::BeyondGrace => {
                            breakdown.late += 1;
                            breakdown.missed += 1;
                        }
                    }
                }
                TrustEventType::ContributionRejected => breakdown.rejected += 1,
                TrustEventType::PaymentMissed => breakdown.missed += 1,
                TrustEventType::DefaultAfterPayout => breakdown.default_after_payout += 1,
                TrustEventType::DepositVerified => breakdown.deposit_verified += 1,
                TrustEventType::GroupCompleted => breakdown.completed_groups += 1,
            }
        }
        breakdown
    }

    /// Pure fold over an event history.
    pub fn compute(&self, events: Vec<TrustEvent>) -> TrustScore {
        let breakdown = self.tally(&events);
        TrustScore {
            score: breakdown.raw_score().clamp(MIN_SCORE, MAX_SCORE),
            breakdown,
            events,
        }
    }

    /// Recompute from the log and overwrite the member's cached score.
    ///
    /// An unknown member gets the neutral score and nothing is written.
    pub async fn refresh(&self, conn: &mut SqliteConnection, member_id: Uuid) -> Result<TrustScore> {
        let Some(member) = members::find(conn, member_id).await? else {
            return Ok(TrustScore::neutral());
        };

        let events = trust_events::list_for_member(conn, member_id).await?;
        let result = self.compute(events);

        if result.score != member.trust_score {
            members::set_trust_score(conn, member_id, result.score).await?;
            debug!(
                member_id = %member_id,
                previous = member.trust_score,
                score = result.score,
                "Trust score refreshed"
            );
        }
        Ok(result)
    }

    /// Append an event and refresh the cache in the same transaction.
    pub async fn record(&self, conn: &mut SqliteConnection, event: TrustEvent) -> Result<TrustEvent> {
        let member_id = event.member_id;
        let event = trust_events::append(conn, event).await?;
        self.refresh(conn, member_id).await?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn calculator() -> TrustScoreCalculator {
        TrustScoreCalculator::new(&TrustPolicy::default())
    }

    fn at(date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_hms_opt(10, 0, 0).unwrap())
    }

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn event(event_type: TrustEventType) -> TrustEvent {
        TrustEvent::new(Uuid::nil(), event_type, Utc::now())
    }

    fn contribution(verified_on: NaiveDate) -> TrustEvent {
        event(TrustEventType::ContributionVerified)
            .due_on(due())
            .verified_at(at(verified_on))
    }

    #[test]
    fn test_empty_history_is_neutral() {
        let result = calculator().compute(vec![]);
        assert_eq!(result.score, 50);
        assert!(result.breakdown.is_empty());
        assert!(result.breakdown.lines().is_empty());
    }

    #[test]
    fn test_two_on_time_and_one_missed_scores_48() {
        let events = vec![
            contribution(due()),
            contribution(due() - Duration::days(3)),
            event(TrustEventType::PaymentMissed),
        ];
        let result = calculator().compute(events);
        assert_eq!(result.breakdown.on_time, 2);
        assert_eq!(result.breakdown.missed, 1);
        assert_eq!(result.score, 48);
    }

    #[test]
    fn test_lateness_within_grace_is_only_late() {
        let calc = calculator();
        assert_eq!(
            calc.punctuality(Some(due()), Some(due() + Duration::days(2))),
            Punctuality::Late
        );
        assert_eq!(
            calc.punctuality(Some(due()), Some(due() + Duration::days(3))),
            Punctuality::BeyondGrace
        );
        assert_eq!(calc.punctuality(None, Some(due())), Punctuality::Late);
        assert_eq!(calc.punctuality(Some(due()), None), Punctuality::Late);
    }

    #[test]
    fn test_beyond_grace_counts_late_and_missed() {
        let result = calculator().compute(vec![contribution(due() + Duration::days(5))]);
        assert_eq!(result.breakdown.late, 1);
        assert_eq!(result.breakdown.missed, 1);
        assert_eq!(result.score, 50 + 1 - 8);
    }

    #[test]
    fn test_zero_grace_policy() {
        let calc = TrustScoreCalculator::new(&TrustPolicy {
            grace_period_days: 0,
        });
        assert_eq!(
            calc.punctuality(Some(due()), Some(due() + Duration::days(1))),
            Punctuality::BeyondGrace
        );
    }

    #[test]
    fn test_score_is_clamped() {
        let floor = calculator().compute(
            (0..10)
                .map(|_| event(TrustEventType::DefaultAfterPayout))
                .collect(),
        );
        assert_eq!(floor.score, 0);

        let ceiling = calculator().compute(
            (0..30)
                .map(|_| event(TrustEventType::GroupCompleted))
                .collect(),
        );
        assert_eq!(ceiling.score, 100);
    }

    #[test]
    fn test_every_event_type_has_a_weight() {
        let events = vec![
            contribution(due()),
            contribution(due() + Duration::days(1)),
            event(TrustEventType::GroupCompleted),
            event(TrustEventType::DepositVerified),
            event(TrustEventType::PaymentMissed),
            event(TrustEventType::DefaultAfterPayout),
            event(TrustEventType::ContributionRejected),
        ];
        let result = calculator().compute(events);
        assert_eq!(result.score, 50 + 3 + 1 + 5 + 2 - 8 - 15 - 3);
        assert_eq!(result.breakdown.lines().len(), 7);
    }

    #[test]
    fn test_breakdown_lines_skip_empty_categories() {
        let result = calculator().compute(vec![event(TrustEventType::ContributionRejected)]);
        let lines = result.breakdown.lines();
        assert_eq!(
            lines,
            vec![BreakdownLine {
                category: "rejected",
                count: 1,
                points: -3,
            }]
        );
    }
}
