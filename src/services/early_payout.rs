//! Early payout eligibility and the security-deposit workflow.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::groups::{load_group, load_member};
use super::trust::{TrustScore, TrustScoreCalculator};
use crate::config::EarlyPayoutPolicy;
use crate::error::{EngineError, Result};
use crate::model::{
    DepositStatus, EarlyPayoutRequest, Member, MembershipStatus, PayoutDecision,
    PayoutRequestStatus, TrustEvent, TrustEventType,
};
use crate::storage::sqlite::{early_payouts, memberships};

pub const UTR_MIN_LEN: usize = 6;
pub const UTR_MAX_LEN: usize = 22;
pub const DEFAULT_REJECTION_REASON: &str = "Rejected by admin";

/// Outcome of the eligibility gate. `reasons` is empty exactly when eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub trust_score: i32,
    pub reasons: Vec<String>,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        self.reasons.is_empty()
    }
}

/// Validate and normalize a bank transfer reference.
pub fn normalize_utr(utr: &str) -> Result<String> {
    let utr = utr.trim();
    let valid_len = (UTR_MIN_LEN..=UTR_MAX_LEN).contains(&utr.len());
    if !valid_len || !utr.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(EngineError::validation(format!(
            "UTR must be {UTR_MIN_LEN}-{UTR_MAX_LEN} letters or digits"
        )));
    }
    Ok(utr.to_ascii_uppercase())
}

#[derive(Debug, Clone)]
pub struct EarlyPayoutWorkflow {
    policy: EarlyPayoutPolicy,
}

impl EarlyPayoutWorkflow {
    pub fn new(policy: &EarlyPayoutPolicy) -> Self {
        Self {
            policy: policy.clone(),
        }
    }

    /// Full monthly amount, halved (rounding up) for high-trust members.
    pub fn deposit_amount(&self, monthly_amount: i64, trust_score: i32) -> i64 {
        if trust_score >= self.policy.deposit_discount_score {
            (monthly_amount + 1).div_euclid(2)
        } else {
            monthly_amount
        }
    }

    /// Every member-level check, each failure adding one reason.
    pub fn evaluate(&self, member: &Member, score: &TrustScore) -> Eligibility {
        let mut reasons = Vec::new();

        if score.score < self.policy.min_trust_score {
            reasons.push(format!(
                "Trust score {} is below the required {}",
                score.score, self.policy.min_trust_score
            ));
        }
        if member.payment_handle().is_none() {
            reasons.push("Add a UPI ID to your profile".to_string());
        }
        if !member.kyc.any_on_file() {
            reasons.push("Upload at least one KYC document".to_string());
        }

        let verified = score
            .events
            .iter()
            .filter(|e| e.event_type == TrustEventType::ContributionVerified)
            .count() as u32;
        if verified < self.policy.min_verified_contributions {
            reasons.push(format!(
                "At least {} verified contributions are required ({} so far)",
                self.policy.min_verified_contributions, verified
            ));
        }

        if score.events.iter().any(|e| e.event_type.is_delinquency()) {
            reasons.push("Missed payments or defaults are on record".to_string());
        }

        Eligibility {
            trust_score: score.score,
            reasons,
        }
    }

    /// Refresh the score and run the gate, optionally against one group.
    pub async fn check_eligibility(
        &self,
        conn: &mut SqliteConnection,
        trust: &TrustScoreCalculator,
        member: &Member,
        group_id: Option<Uuid>,
    ) -> Result<Eligibility> {
        let score = trust.refresh(conn, member.id).await?;
        let mut eligibility = self.evaluate(member, &score);

        if let Some(group_id) = group_id {
            let joined = memberships::find(conn, group_id, member.id)
                .await?
                .is_some_and(|m| m.status == MembershipStatus::Joined);
            if !joined {
                eligibility
                    .reasons
                    .push("You are not a joined member of this group".to_string());
            }
        }
        Ok(eligibility)
    }

    pub async fn request(
        &self,
        conn: &mut SqliteConnection,
        trust: &TrustScoreCalculator,
        member_id: Uuid,
        group_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<EarlyPayoutRequest> {
        let member = load_member(conn, member_id).await?;
        let group = load_group(conn, group_id).await?;

        let eligibility = self
            .check_eligibility(conn, trust, &member, Some(group_id))
            .await?;
        if !eligibility.is_eligible() {
            info!(
                member_id = %member_id,
                group_id = %group_id,
                reasons = eligibility.reasons.len(),
                "Early payout refused"
            );
            return Err(EngineError::Ineligible(eligibility.reasons));
        }

        if !self.policy.allow_concurrent_requests
            && early_payouts::has_unresolved(conn, member_id, group_id).await?
        {
            return Err(EngineError::rejected(
                "An early payout request for this group is already open",
            ));
        }

        let request = EarlyPayoutRequest {
            id: Uuid::new_v4(),
            member_id,
            group_id,
            monthly_amount: group.monthly_amount,
            trust_score: eligibility.trust_score,
            deposit_amount: self.deposit_amount(group.monthly_amount, eligibility.trust_score),
            status: PayoutRequestStatus::PendingDeposit,
            deposit_status: DepositStatus::NotPaid,
            utr: None,
            reason: reason.trim().to_string(),
            decision_reason: None,
            created_at: now,
            deposit_submitted_at: None,
            deposit_verified_at: None,
            decided_at: None,
        };
        early_payouts::insert(conn, &request).await?;

        info!(
            request_id = %request.id,
            member_id = %member_id,
            group_id = %group_id,
            deposit_amount = request.deposit_amount,
            "Early payout requested"
        );
        Ok(request)
    }

    /// Member reports the deposit transfer. Resubmission replaces the UTR.
    pub async fn submit_deposit(
        &self,
        conn: &mut SqliteConnection,
        request_id: Uuid,
        utr: &str,
        now: DateTime<Utc>,
    ) -> Result<EarlyPayoutRequest> {
        let utr = normalize_utr(utr)?;
        let mut request = load_request(conn, request_id).await?;

        if request.status != PayoutRequestStatus::PendingDeposit {
            return Err(EngineError::rejected(format!(
                "Deposit cannot be submitted for a request that is {}",
                request.status.as_str()
            )));
        }
        request.deposit_status = request.deposit_status.transition(DepositStatus::Submitted)?;
        request.utr = Some(utr);
        request.deposit_submitted_at = Some(now);
        early_payouts::save(conn, &request).await?;

        info!(request_id = %request_id, "Security deposit submitted");
        Ok(request)
    }

    /// Admin confirms the deposit arrived. Moves the request under review and
    /// feeds a `deposit_verified` event back into the member's trust score.
    pub async fn verify_deposit(
        &self,
        conn: &mut SqliteConnection,
        trust: &TrustScoreCalculator,
        request_id: Uuid,
        utr: &str,
        now: DateTime<Utc>,
    ) -> Result<EarlyPayoutRequest> {
        let utr = normalize_utr(utr)?;
        let mut request = load_request(conn, request_id).await?;

        let deposit_status = request.deposit_status.transition(DepositStatus::Verified)?;
        if request.utr.as_deref() != Some(utr.as_str()) {
            warn!(request_id = %request_id, "Deposit UTR mismatch");
            return Err(EngineError::rejected(
                "UTR does not match the submitted deposit",
            ));
        }
        request.status = request.status.transition(PayoutRequestStatus::UnderReview)?;
        request.deposit_status = deposit_status;
        request.deposit_verified_at = Some(now);
        early_payouts::save(conn, &request).await?;

        let event = TrustEvent::new(request.member_id, TrustEventType::DepositVerified, now)
            .in_group(request.group_id)
            .with_note(format!("early payout {request_id}"));
        trust.record(conn, event).await?;

        info!(
            request_id = %request_id,
            member_id = %request.member_id,
            "Security deposit verified"
        );
        Ok(request)
    }

    pub async fn decide(
        &self,
        conn: &mut SqliteConnection,
        request_id: Uuid,
        decision: PayoutDecision,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EarlyPayoutRequest> {
        let mut request = load_request(conn, request_id).await?;
        if request.status.is_terminal() {
            return Err(EngineError::rejected(format!(
                "Request is already {}",
                request.status.as_str()
            )));
        }

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        match decision {
            PayoutDecision::Approve => {
                if request.deposit_status != DepositStatus::Verified {
                    return Err(EngineError::rejected(
                        "Security deposit has not been verified",
                    ));
                }
                request.status = request.status.transition(PayoutRequestStatus::Approved)?;
                request.decision_reason = reason.map(str::to_string);
            }
            PayoutDecision::Reject => {
                request.status = request.status.transition(PayoutRequestStatus::Rejected)?;
                request.decision_reason =
                    Some(reason.unwrap_or(DEFAULT_REJECTION_REASON).to_string());
            }
        }
        request.decided_at = Some(now);
        early_payouts::save(conn, &request).await?;

        info!(
            request_id = %request_id,
            status = request.status.as_str(),
            "Early payout decided"
        );
        Ok(request)
    }
}

async fn load_request(conn: &mut SqliteConnection, request_id: Uuid) -> Result<EarlyPayoutRequest> {
    early_payouts::find(conn, request_id)
        .await?
        .ok_or_else(|| EngineError::not_found("early payout request", request_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KycDocument, KycDocuments, MemberRole};

    fn workflow() -> EarlyPayoutWorkflow {
        EarlyPayoutWorkflow::new(&EarlyPayoutPolicy::default())
    }

    fn member() -> Member {
        Member {
            id: Uuid::new_v4(),
            username: "meera".to_string(),
            full_name: "Meera".to_string(),
            phone: "9876543210".to_string(),
            role: MemberRole::Customer,
            upi_id: Some("meera@upi".to_string()),
            trust_score: 50,
            kyc: KycDocuments::default().with(KycDocument::IdentityProof),
            referral_code: "CIRAB12CD".to_string(),
            join_blocked: false,
            first_fee_verified: false,
            fee_paid_month: None,
            created_at: Utc::now(),
        }
    }

    fn score(score: i32, verified: usize, delinquent: bool) -> TrustScore {
        let mut events: Vec<TrustEvent> = (0..verified)
            .map(|_| TrustEvent::new(Uuid::nil(), TrustEventType::ContributionVerified, Utc::now()))
            .collect();
        if delinquent {
            events.push(TrustEvent::new(Uuid::nil(), TrustEventType::PaymentMissed, Utc::now()));
        }
        TrustScore {
            score,
            breakdown: Default::default(),
            events,
        }
    }

    #[test]
    fn test_deposit_is_halved_at_high_trust() {
        let w = workflow();
        assert_eq!(w.deposit_amount(1000, 84), 1000);
        assert_eq!(w.deposit_amount(1000, 85), 500);
        assert_eq!(w.deposit_amount(1001, 90), 501);
    }

    #[test]
    fn test_score_below_threshold_is_ineligible_regardless() {
        let eligibility = workflow().evaluate(&member(), &score(74, 5, false));
        assert!(!eligibility.is_eligible());
        assert_eq!(eligibility.reasons.len(), 1);
        assert!(eligibility.reasons[0].contains("74"));
    }

    #[test]
    fn test_all_checks_pass() {
        assert!(workflow()
            .evaluate(&member(), &score(80, 2, false))
            .is_eligible());
    }

    #[test]
    fn test_every_failing_check_is_reported() {
        let mut m = member();
        m.upi_id = Some("   ".to_string());
        m.kyc = KycDocuments::default();
        let eligibility = workflow().evaluate(&m, &score(40, 1, true));
        assert_eq!(eligibility.reasons.len(), 5);
    }

    #[test]
    fn test_utr_validation() {
        assert_eq!(normalize_utr(" abc123xyz ").unwrap(), "ABC123XYZ");
        assert!(normalize_utr("12345").is_err());
        assert!(normalize_utr("1234-5678").is_err());
        assert!(normalize_utr(&"9".repeat(23)).is_err());
    }
}
