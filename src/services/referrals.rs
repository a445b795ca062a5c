//! Referral credit ledger.
//!
//! Referrals move `PENDING -> ELIGIBLE -> CREDITED`. Each credited referral
//! carries one fixed-size, time-boxed credit that is spent whole against the
//! referrer's monthly fee, oldest credit first.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ReferralPolicy;
use crate::error::{EngineError, Result};
use crate::model::member::normalize_phone;
use crate::model::{Member, MonthKey, Referral, ReferralStatus, ReferralSummary};
use crate::storage::sqlite::{members, memberships, referrals};

pub const REFERRAL_CODE_PREFIX: &str = "CIR";
const CODE_MIN_LEN: usize = 6;
const CODE_MAX_LEN: usize = 12;

/// `CIR` followed by six uppercase hex digits.
pub fn generate_referral_code() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{REFERRAL_CODE_PREFIX}{}", suffix[..6].to_ascii_uppercase())
}

/// Trim and uppercase an entered code. A blank entry means no referral.
pub fn normalize_referral_code(code: &str) -> Result<Option<String>> {
    let code = code.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Ok(None);
    }
    let valid_len = (CODE_MIN_LEN..=CODE_MAX_LEN).contains(&code.len());
    if !valid_len || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(EngineError::validation("Invalid referral code"));
    }
    Ok(Some(code))
}

/// Credits chosen to cover one month's fee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Redemption {
    pub amount: i64,
    pub credits: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ReferralLedger {
    policy: ReferralPolicy,
}

impl ReferralLedger {
    pub fn new(policy: &ReferralPolicy) -> Self {
        Self {
            policy: policy.clone(),
        }
    }

    /// Resolve `code` to a referrer and record a pending referral for `referred`.
    pub async fn link(
        &self,
        conn: &mut SqliteConnection,
        referred: &Member,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Referral> {
        let referrer = members::find_by_referral_code(conn, code)
            .await?
            .ok_or_else(|| EngineError::validation("Invalid referral code"))?;

        if referrer.is_admin() {
            return Err(EngineError::rejected(
                "Referral codes of admin accounts cannot be used",
            ));
        }
        let referred_phone = normalize_phone(&referred.phone);
        let same_phone =
            !referred_phone.is_empty() && referred_phone == normalize_phone(&referrer.phone);
        if referrer.id == referred.id || same_phone {
            return Err(EngineError::rejected("You cannot use your own referral code"));
        }
        if referrals::find_by_referred(conn, referred.id).await?.is_some() {
            return Err(EngineError::rejected(
                "A referral is already recorded for this member",
            ));
        }

        let referral = Referral {
            id: Uuid::new_v4(),
            referrer_id: referrer.id,
            referred_id: referred.id,
            status: ReferralStatus::Pending,
            created_at: now,
            eligible_at: None,
            credited_at: None,
            credit_amount: 0,
            credit_expires_at: None,
            credit_used: false,
            credit_used_month: None,
        };
        referrals::insert(conn, &referral).await?;

        info!(
            referral_id = %referral.id,
            referrer_id = %referrer.id,
            referred_id = %referred.id,
            "Referral recorded"
        );
        Ok(referral)
    }

    /// Promote the referral naming `referred_id` once that member has paid a
    /// fee and joined a group. Safe to call any number of times.
    pub async fn mark_eligible_if_qualified(
        &self,
        conn: &mut SqliteConnection,
        referred_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Referral>> {
        let Some(mut referral) = referrals::find_by_referred(conn, referred_id).await? else {
            return Ok(None);
        };
        if referral.status != ReferralStatus::Pending {
            return Ok(Some(referral));
        }

        let Some(referred) = members::find(conn, referred_id).await? else {
            return Ok(Some(referral));
        };
        if !referred.first_fee_verified || !memberships::has_joined_any(conn, referred_id).await? {
            debug!(referral_id = %referral.id, "Referral not yet qualified");
            return Ok(Some(referral));
        }

        referral.status = referral.status.transition(ReferralStatus::Eligible)?;
        referral.eligible_at = Some(now);
        referrals::save(conn, &referral).await?;

        info!(referral_id = %referral.id, "Referral eligible");
        Ok(Some(referral))
    }

    /// Mint the credit. Only an eligible referral can be credited, once.
    pub async fn credit(
        &self,
        conn: &mut SqliteConnection,
        referral_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Referral> {
        let mut referral = referrals::find(conn, referral_id)
            .await?
            .ok_or_else(|| EngineError::not_found("referral", referral_id))?;

        referral.status = referral.status.transition(ReferralStatus::Credited)?;
        referral.credited_at = Some(now);
        referral.credit_amount = self.policy.reward_amount;
        referral.credit_expires_at = Some(now + Duration::days(self.policy.credit_expiry_days));
        referral.credit_used = false;
        referral.credit_used_month = None;
        referrals::save(conn, &referral).await?;

        info!(
            referral_id = %referral_id,
            referrer_id = %referral.referrer_id,
            amount = referral.credit_amount,
            "Referral credited"
        );
        Ok(referral)
    }

    /// Choose credits for a fee of `gross`.
    ///
    /// Credits are spent whole. The amount is the largest multiple of the
    /// reward, capped by the monthly cap and the fee, that some set of live
    /// credits adds up to exactly. Each sum is first reached with the oldest
    /// credits, so equal-sized credits go out FIFO. Credits minted under an
    /// older reward size still count when they fit.
    pub fn plan(&self, credits: &[Referral], gross: i64) -> Redemption {
        let reward = self.policy.reward_amount;
        if reward <= 0 || gross <= 0 {
            return Redemption::default();
        }

        let available: i64 = credits.iter().map(|c| c.credit_amount.max(0)).sum();
        let ceiling = available.min(self.policy.monthly_credit_cap).min(gross);
        if ceiling < reward {
            return Redemption::default();
        }

        // reachable[sum] holds the credit indexes that first made up `sum`
        let mut reachable: Vec<Option<Vec<usize>>> = vec![None; ceiling as usize + 1];
        reachable[0] = Some(Vec::new());
        for (index, credit) in credits.iter().enumerate() {
            let amount = credit.credit_amount;
            if amount <= 0 || amount > ceiling {
                continue;
            }
            for sum in (amount..=ceiling).rev() {
                let (sum, from) = (sum as usize, (sum - amount) as usize);
                if reachable[sum].is_some() {
                    continue;
                }
                if let Some(mut picked) = reachable[from].clone() {
                    picked.push(index);
                    reachable[sum] = Some(picked);
                }
            }
        }

        let mut target = ceiling - ceiling.rem_euclid(reward);
        while target > 0 {
            if let Some(picked) = &reachable[target as usize] {
                return Redemption {
                    amount: target,
                    credits: picked.iter().map(|&i| credits[i].id).collect(),
                };
            }
            target -= reward;
        }
        Redemption::default()
    }

    /// What `apply_for_month` would take right now, without taking it.
    pub async fn preview(
        &self,
        conn: &mut SqliteConnection,
        member_id: Uuid,
        gross: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let credits = referrals::spendable_credits(conn, member_id, now).await?;
        Ok(self.plan(&credits, gross).amount)
    }

    /// Spend credits against `month`'s fee and return the amount applied.
    pub async fn apply_for_month(
        &self,
        conn: &mut SqliteConnection,
        member_id: Uuid,
        month: MonthKey,
        gross: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let credits = referrals::spendable_credits(conn, member_id, now).await?;
        let redemption = self.plan(&credits, gross);

        for id in &redemption.credits {
            referrals::mark_credit_used(conn, *id, month).await?;
        }
        if redemption.amount > 0 {
            info!(
                member_id = %member_id,
                month = %month,
                amount = redemption.amount,
                credits = redemption.credits.len(),
                "Referral credit applied"
            );
        }
        Ok(redemption.amount)
    }

    pub async fn summary(
        &self,
        conn: &mut SqliteConnection,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ReferralSummary> {
        let rows = referrals::list_for_referrer(conn, member_id).await?;
        Ok(summarize(&rows, now))
    }
}

pub fn summarize(rows: &[Referral], now: DateTime<Utc>) -> ReferralSummary {
    let mut summary = ReferralSummary::default();
    for referral in rows {
        match referral.status {
            ReferralStatus::Pending => summary.pending += 1,
            ReferralStatus::Eligible => summary.eligible += 1,
            ReferralStatus::Credited => summary.credited += 1,
        }
        if referral.is_spendable(now) {
            summary.available_credit += referral.credit_amount;
        } else if referral.is_expired_unused(now) {
            summary.expired_credit += referral.credit_amount;
        } else if referral.credit_used {
            summary.used_credit += referral.credit_amount;
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> ReferralLedger {
        ReferralLedger::new(&ReferralPolicy::default())
    }

    fn credit(amount: i64, credited_at: DateTime<Utc>) -> Referral {
        Referral {
            id: Uuid::new_v4(),
            referrer_id: Uuid::nil(),
            referred_id: Uuid::new_v4(),
            status: ReferralStatus::Credited,
            created_at: credited_at,
            eligible_at: Some(credited_at),
            credited_at: Some(credited_at),
            credit_amount: amount,
            credit_expires_at: Some(credited_at + Duration::days(183)),
            credit_used: false,
            credit_used_month: None,
        }
    }

    fn credits(n: usize) -> Vec<Referral> {
        let start = Utc::now() - Duration::days(30);
        (0..n)
            .map(|i| credit(10, start + Duration::days(i as i64)))
            .collect()
    }

    #[test]
    fn test_generated_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), 9);
        assert!(code.starts_with("CIR"));
        assert!(code[3..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_eq!(normalize_referral_code(&code).unwrap(), Some(code));
    }

    #[test]
    fn test_normalize_referral_code() {
        assert_eq!(
            normalize_referral_code("  cir1a2b3c ").unwrap(),
            Some("CIR1A2B3C".to_string())
        );
        assert_eq!(normalize_referral_code("   ").unwrap(), None);
        assert!(normalize_referral_code("ABC").is_err());
        assert!(normalize_referral_code("CIR-12345").is_err());
        assert!(normalize_referral_code("ABCDEFGHIJKLM").is_err());
    }

    #[test]
    fn test_plan_is_capped_and_fifo() {
        let rows = credits(5);
        let redemption = ledger().plan(&rows, 50);
        assert_eq!(redemption.amount, 30);
        assert_eq!(
            redemption.credits,
            rows[..3].iter().map(|r| r.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_plan_rounds_down_to_whole_rewards() {
        let redemption = ledger().plan(&credits(3), 25);
        assert_eq!(redemption.amount, 20);
        assert_eq!(redemption.credits.len(), 2);

        assert_eq!(ledger().plan(&credits(3), 9), Redemption::default());
    }

    #[test]
    fn test_plan_never_exceeds_available() {
        let redemption = ledger().plan(&credits(1), 50);
        assert_eq!(redemption.amount, 10);
        assert_eq!(ledger().plan(&[], 50).amount, 0);
    }

    #[test]
    fn test_plan_amount_is_always_whole_rewards() {
        let ledger = ledger();
        for n in 0..6 {
            for gross in [0, 5, 10, 19, 30, 45, 50, 100] {
                let redemption = ledger.plan(&credits(n), gross);
                assert_eq!(redemption.amount % 10, 0);
                assert!(redemption.amount <= 30);
                assert!(redemption.amount <= gross);
                assert!(redemption.amount <= 10 * n as i64);
            }
        }
    }

    #[test]
    fn test_plan_spends_credits_larger_than_the_reward_whole() {
        let now = Utc::now();
        let rows = vec![credit(15, now), credit(15, now + Duration::seconds(1))];
        let redemption = ledger().plan(&rows, 50);
        assert_eq!(redemption.amount, 30);
        assert_eq!(
            redemption.credits,
            rows.iter().map(|r| r.id).collect::<Vec<_>>()
        );

        // one 15 credit cannot make a whole 10 or 20
        assert_eq!(ledger().plan(&rows[..1], 50), Redemption::default());
    }

    #[test]
    fn test_plan_skips_credits_from_an_older_reward_size() {
        let ledger = ReferralLedger::new(&ReferralPolicy {
            reward_amount: 15,
            monthly_credit_cap: 30,
            ..ReferralPolicy::default()
        });
        let now = Utc::now();
        let rows = vec![
            credit(10, now),
            credit(15, now + Duration::seconds(1)),
            credit(15, now + Duration::seconds(2)),
        ];
        let redemption = ledger.plan(&rows, 50);
        assert_eq!(redemption.amount, 30);
        assert_eq!(redemption.credits, vec![rows[1].id, rows[2].id]);
    }

    #[test]
    fn test_plan_falls_back_to_a_smaller_whole_amount() {
        let now = Utc::now();
        let rows = vec![credit(10, now), credit(25, now + Duration::seconds(1))];
        // 30 is out of reach with 10 and 25, 10 is not
        let redemption = ledger().plan(&rows, 50);
        assert_eq!(redemption.amount, 10);
        assert_eq!(redemption.credits, vec![rows[0].id]);
    }

    #[test]
    fn test_summarize() {
        let now = Utc::now();
        let live = credit(10, now - Duration::days(1));
        let mut used = credit(10, now - Duration::days(2));
        used.credit_used = true;
        let mut expired = credit(10, now - Duration::days(200));
        expired.credit_expires_at = Some(now - Duration::days(17));
        let mut pending = credit(0, now);
        pending.status = ReferralStatus::Pending;

        let summary = summarize(&[live, used, expired, pending], now);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.credited, 3);
        assert_eq!(summary.available_credit, 10);
        assert_eq!(summary.used_credit, 10);
        assert_eq!(summary.expired_credit, 10);
    }
}
