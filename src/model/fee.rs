//! Monthly platform fee records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::MonthKey;

/// A verified fee payment. Written once per member and month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeePayment {
    pub member_id: Uuid,
    pub month: MonthKey,
    pub gross: i64,
    pub credit_applied: i64,
    pub net: i64,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeStatus {
    pub month: MonthKey,
    pub paid: bool,
    pub payment: Option<FeePayment>,
}
