//! Monthly platform fee reconciliation.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use super::groups::load_member;
use super::referrals::ReferralLedger;
use crate::config::FeePolicy;
use crate::error::Result;
use crate::model::{FeePayment, FeeStatus, MonthKey};
use crate::storage::sqlite::{fee_payments, members};

#[derive(Debug, Clone)]
pub struct FeeReconciler {
    policy: FeePolicy,
}

impl FeeReconciler {
    pub fn new(policy: &FeePolicy) -> Self {
        Self {
            policy: policy.clone(),
        }
    }

    pub fn monthly_fee(&self) -> i64 {
        self.policy.monthly_fee
    }

    /// Record the member's fee for `month`, spending referral credit on the
    /// first call. Later calls for the same month return the stored record.
    pub async fn verify(
        &self,
        conn: &mut SqliteConnection,
        ledger: &ReferralLedger,
        member_id: Uuid,
        month: MonthKey,
        now: DateTime<Utc>,
    ) -> Result<FeePayment> {
        load_member(conn, member_id).await?;

        if let Some(existing) = fee_payments::find(conn, member_id, month).await? {
            debug!(member_id = %member_id, month = %month, "Fee already verified");
            return Ok(existing);
        }

        let gross = self.policy.monthly_fee;
        let credit_applied = ledger
            .apply_for_month(conn, member_id, month, gross, now)
            .await?;
        let payment = FeePayment {
            member_id,
            month,
            gross,
            credit_applied,
            net: (gross - credit_applied).max(0),
            verified_at: now,
        };
        fee_payments::insert(conn, &payment).await?;
        members::mark_fee_paid(conn, member_id, month).await?;

        // Paying a first fee is what qualifies this member's own referrer.
        ledger
            .mark_eligible_if_qualified(conn, member_id, now)
            .await?;

        info!(
            member_id = %member_id,
            month = %month,
            gross = payment.gross,
            credit_applied = payment.credit_applied,
            net = payment.net,
            "Fee payment verified"
        );
        Ok(payment)
    }

    pub async fn status(
        &self,
        conn: &mut SqliteConnection,
        member_id: Uuid,
        month: MonthKey,
    ) -> Result<FeeStatus> {
        load_member(conn, member_id).await?;
        let payment = fee_payments::find(conn, member_id, month).await?;
        Ok(FeeStatus {
            month,
            paid: payment.is_some(),
            payment,
        })
    }
}
