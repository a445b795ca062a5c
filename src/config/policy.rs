//! Business rule configuration.
//!
//! Every knob the engine reads at call time lives here so that deployments can
//! tune amounts and windows without code changes.

use chrono::NaiveTime;
use serde::Deserialize;

/// Default days a verified contribution may trail its due date before it also
/// counts as missed.
pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 2;
/// Upper bound applied to the configured grace period.
pub const MAX_GRACE_PERIOD_DAYS: i64 = 14;

/// All business rule sections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub trust: TrustPolicy,
    pub groups: GroupPolicy,
    pub early_payout: EarlyPayoutPolicy,
    pub referral: ReferralPolicy,
    pub fees: FeePolicy,
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.groups.cycle_days == 0 {
            return Err("groups.cycle_days must be at least 1".to_string());
        }
        if self.groups.default_max_members < 2 {
            return Err("groups.default_max_members must be at least 2".to_string());
        }
        if self.fees.monthly_fee <= 0 {
            return Err("fees.monthly_fee must be positive".to_string());
        }
        if self.referral.reward_amount <= 0 {
            return Err("referral.reward_amount must be positive".to_string());
        }
        if self.referral.monthly_credit_cap < self.referral.reward_amount {
            return Err(format!(
                "referral.monthly_credit_cap ({}) is below one reward ({})",
                self.referral.monthly_credit_cap, self.referral.reward_amount
            ));
        }
        if self.referral.credit_expiry_days <= 0 {
            return Err("referral.credit_expiry_days must be positive".to_string());
        }
        if !(0..=100).contains(&self.early_payout.min_trust_score) {
            return Err("early_payout.min_trust_score must be within 0..=100".to_string());
        }
        Ok(())
    }
}

/// Trust score parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrustPolicy {
    /// Days of lateness tolerated before a contribution also counts as missed.
    /// Clamped to `0..=14` when used.
    pub grace_period_days: i64,
}

impl TrustPolicy {
    pub fn effective_grace_days(&self) -> i64 {
        self.grace_period_days.clamp(0, MAX_GRACE_PERIOD_DAYS)
    }
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            grace_period_days: DEFAULT_GRACE_PERIOD_DAYS,
        }
    }
}

/// Group cycle parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GroupPolicy {
    /// Days from activation to the first due date.
    pub cycle_days: u32,
    /// Time of day by which the receiver should be paid on the due date.
    pub payout_cutoff: NaiveTime,
    /// Member cap used when a group is created without one.
    pub default_max_members: u32,
}

impl Default for GroupPolicy {
    fn default() -> Self {
        Self {
            cycle_days: 30,
            payout_cutoff: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            default_max_members: 10,
        }
    }
}

/// Early payout gate and deposit policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EarlyPayoutPolicy {
    pub min_trust_score: i32,
    /// Score at or above which the deposit is halved.
    pub deposit_discount_score: i32,
    pub min_verified_contributions: u32,
    /// Whether a member may hold several unresolved requests for one group.
    pub allow_concurrent_requests: bool,
}

impl Default for EarlyPayoutPolicy {
    fn default() -> Self {
        Self {
            min_trust_score: 75,
            deposit_discount_score: 85,
            min_verified_contributions: 2,
            allow_concurrent_requests: true,
        }
    }
}

/// Referral credit minting and redemption.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReferralPolicy {
    /// Fixed credit minted per credited referral; also the redemption unit.
    pub reward_amount: i64,
    pub credit_expiry_days: i64,
    /// Most credit applied against a single month's fee.
    pub monthly_credit_cap: i64,
}

impl Default for ReferralPolicy {
    fn default() -> Self {
        Self {
            reward_amount: 10,
            credit_expiry_days: 183,
            monthly_credit_cap: 30,
        }
    }
}

/// Platform fee.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeePolicy {
    pub monthly_fee: i64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self { monthly_fee: 50 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grace_period_is_clamped() {
        let mut trust = TrustPolicy::default();
        assert_eq!(trust.effective_grace_days(), 2);
        trust.grace_period_days = 30;
        assert_eq!(trust.effective_grace_days(), MAX_GRACE_PERIOD_DAYS);
        trust.grace_period_days = -3;
        assert_eq!(trust.effective_grace_days(), 0);
    }

    #[test]
    fn test_group_policy_default() {
        let groups = GroupPolicy::default();
        assert_eq!(groups.cycle_days, 30);
        assert_eq!(groups.payout_cutoff, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert_eq!(groups.default_max_members, 10);
    }

    #[test]
    fn test_policy_validate() {
        let mut policy = PolicyConfig::default();
        assert!(policy.validate().is_ok());

        policy.fees.monthly_fee = 0;
        assert!(policy.validate().is_err());

        policy = PolicyConfig::default();
        policy.groups.cycle_days = 0;
        assert!(policy.validate().is_err());
    }
}
