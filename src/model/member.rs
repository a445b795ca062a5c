//! Member records.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{MonthKey, UnknownVariant};

/// Trust score a member starts with and falls back to without history.
pub const NEUTRAL_TRUST_SCORE: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Customer,
    Admin,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Customer => "customer",
            MemberRole::Admin => "admin",
        }
    }
}

impl FromStr for MemberRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(MemberRole::Customer),
            "admin" => Ok(MemberRole::Admin),
            other => Err(UnknownVariant {
                kind: "member role",
                value: other.to_string(),
            }),
        }
    }
}

/// KYC documents the upload collaborator can report as present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KycDocument {
    IdentityProof,
    AddressProof,
}

/// Presence flags for KYC documents. The files themselves live elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KycDocuments {
    pub identity_proof: bool,
    pub address_proof: bool,
}

impl KycDocuments {
    pub fn any_on_file(&self) -> bool {
        self.identity_proof || self.address_proof
    }

    pub fn with(mut self, document: KycDocument) -> Self {
        match document {
            KycDocument::IdentityProof => self.identity_proof = true,
            KycDocument::AddressProof => self.address_proof = true,
        }
        self
    }
}

/// A registered member.
///
/// `trust_score` is a cache of the fold over the member's trust events and is
/// only ever written by a recompute. Identity fields and the payment handle are
/// owned by the profile collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub phone: String,
    pub role: MemberRole,
    pub upi_id: Option<String>,
    pub trust_score: i32,
    pub kyc: KycDocuments,
    pub referral_code: String,
    pub join_blocked: bool,
    pub first_fee_verified: bool,
    pub fee_paid_month: Option<MonthKey>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Payment handle, if one is set and not blank.
    pub fn payment_handle(&self) -> Option<&str> {
        self.upi_id
            .as_deref()
            .map(str::trim)
            .filter(|upi| !upi.is_empty())
    }

    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }

    /// Display name, falling back to the username when no full name is set.
    pub fn display_name(&self) -> &str {
        let name = self.full_name.trim();
        if name.is_empty() {
            &self.username
        } else {
            name
        }
    }

    pub fn has_paid_for(&self, month: MonthKey) -> bool {
        self.fee_paid_month == Some(month)
    }
}

/// Registration input supplied by the identity collaborator.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub phone: String,
    pub role: MemberRole,
}

impl NewMember {
    pub fn customer(
        username: impl Into<String>,
        full_name: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            full_name: full_name.into(),
            phone: phone.into(),
            role: MemberRole::Customer,
        }
    }

    pub fn admin(username: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            role: MemberRole::Admin,
            ..Self::customer(username, "", phone)
        }
    }
}

/// Reduce a phone number to its last ten digits so that `+91 98765-43210`
/// and `9876543210` compare equal.
pub fn normalize_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(10);
    digits[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_strips_country_code_and_punctuation() {
        assert_eq!(normalize_phone("+91 98765-43210"), "9876543210");
        assert_eq!(normalize_phone("9876543210"), "9876543210");
        assert_eq!(normalize_phone("(0) 12"), "012");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_kyc_any_on_file() {
        let none = KycDocuments::default();
        assert!(!none.any_on_file());
        assert!(none.with(KycDocument::AddressProof).any_on_file());
    }

    #[test]
    fn test_member_role_round_trips_through_str() {
        assert_eq!("admin".parse::<MemberRole>().unwrap(), MemberRole::Admin);
        assert_eq!(MemberRole::Customer.as_str(), "customer");
        assert!("owner".parse::<MemberRole>().is_err());
    }
}
