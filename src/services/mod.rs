//! Engine services.
//!
//! Each service holds its slice of the policy and works on a connection the
//! caller has already opened a transaction on.

pub mod early_payout;
pub mod fees;
pub mod groups;
pub mod referrals;
pub mod trust;

pub use early_payout::{normalize_utr, EarlyPayoutWorkflow, Eligibility};
pub use fees::FeeReconciler;
pub use groups::{GroupCycleController, JoinOutcome};
pub use referrals::{generate_referral_code, normalize_referral_code, Redemption, ReferralLedger};
pub use trust::{BreakdownLine, Punctuality, TrustBreakdown, TrustScore, TrustScoreCalculator};
