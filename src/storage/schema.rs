//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building,
//! plus the DDL applied by [`SqliteStore::init`](super::SqliteStore::init).

use sea_query::Iden;

/// Members table schema.
#[derive(Iden, Clone, Copy)]
pub enum Members {
    Table,
    Id,
    Username,
    FullName,
    Phone,
    Role,
    UpiId,
    TrustScore,
    KycIdentityProof,
    KycAddressProof,
    ReferralCode,
    JoinBlocked,
    FirstFeeVerified,
    FeePaidMonth,
    CreatedAt,
}

/// Groups table schema.
#[derive(Iden, Clone, Copy)]
pub enum Groups {
    Table,
    Id,
    Name,
    Description,
    MonthlyAmount,
    MaxMembers,
    Status,
    Paused,
    ActivatedAt,
    NextDueDate,
    PayoutCutoff,
    ReceiverMemberId,
    ReceiverUsername,
    ReceiverName,
    ReceiverUpi,
    ReceiverSelectedAt,
    CreatedAt,
}

/// Memberships table schema.
#[derive(Iden, Clone, Copy)]
pub enum Memberships {
    Table,
    GroupId,
    MemberId,
    Status,
    CreatedAt,
    UpdatedAt,
}

/// Trust events table schema.
#[derive(Iden, Clone, Copy)]
pub enum TrustEvents {
    Table,
    MemberId,
    Sequence,
    EventType,
    GroupId,
    DueDate,
    VerifiedAt,
    CreatedAt,
    Note,
}

/// Early payout requests table schema.
#[derive(Iden, Clone, Copy)]
pub enum EarlyPayoutRequests {
    Table,
    Id,
    MemberId,
    GroupId,
    MonthlyAmount,
    TrustScore,
    DepositAmount,
    Status,
    DepositStatus,
    Utr,
    Reason,
    DecisionReason,
    CreatedAt,
    DepositSubmittedAt,
    DepositVerifiedAt,
    DecidedAt,
}

/// Referrals table schema.
#[derive(Iden, Clone, Copy)]
pub enum Referrals {
    Table,
    Id,
    ReferrerId,
    ReferredId,
    Status,
    CreatedAt,
    EligibleAt,
    CreditedAt,
    CreditAmount,
    CreditExpiresAt,
    CreditUsed,
    CreditUsedMonth,
}

/// Fee payments table schema.
#[derive(Iden, Clone, Copy)]
pub enum FeePayments {
    Table,
    MemberId,
    MonthKey,
    Gross,
    CreditApplied,
    Net,
    VerifiedAt,
}

/// SQL for creating the members table.
pub const CREATE_MEMBERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS members (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL DEFAULT 'customer',
    upi_id TEXT,
    trust_score INTEGER NOT NULL DEFAULT 50,
    kyc_identity_proof INTEGER NOT NULL DEFAULT 0,
    kyc_address_proof INTEGER NOT NULL DEFAULT 0,
    referral_code TEXT NOT NULL UNIQUE,
    join_blocked INTEGER NOT NULL DEFAULT 0,
    first_fee_verified INTEGER NOT NULL DEFAULT 0,
    fee_paid_month TEXT,
    created_at TEXT NOT NULL
)
"#;

/// SQL for creating the groups table.
pub const CREATE_GROUPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS "groups" (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    monthly_amount INTEGER NOT NULL,
    max_members INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'formation',
    paused INTEGER NOT NULL DEFAULT 0,
    activated_at TEXT,
    next_due_date TEXT,
    payout_cutoff TEXT,
    receiver_member_id TEXT,
    receiver_username TEXT,
    receiver_name TEXT,
    receiver_upi TEXT,
    receiver_selected_at TEXT,
    created_at TEXT NOT NULL,
    CHECK ((activated_at IS NULL) = (next_due_date IS NULL))
)
"#;

/// SQL for creating the memberships table.
pub const CREATE_MEMBERSHIPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS memberships (
    group_id TEXT NOT NULL REFERENCES "groups"(id),
    member_id TEXT NOT NULL REFERENCES members(id),
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (group_id, member_id)
)
"#;

/// SQL for creating the trust events table.
pub const CREATE_TRUST_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS trust_events (
    member_id TEXT NOT NULL REFERENCES members(id),
    sequence INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    group_id TEXT,
    due_date TEXT,
    verified_at TEXT,
    created_at TEXT NOT NULL,
    note TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (member_id, sequence)
)
"#;

/// SQL for creating the early payout requests table.
pub const CREATE_EARLY_PAYOUT_REQUESTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS early_payout_requests (
    id TEXT PRIMARY KEY,
    member_id TEXT NOT NULL REFERENCES members(id),
    group_id TEXT NOT NULL REFERENCES "groups"(id),
    monthly_amount INTEGER NOT NULL,
    trust_score INTEGER NOT NULL,
    deposit_amount INTEGER NOT NULL,
    status TEXT NOT NULL,
    deposit_status TEXT NOT NULL,
    utr TEXT,
    reason TEXT NOT NULL DEFAULT '',
    decision_reason TEXT,
    created_at TEXT NOT NULL,
    deposit_submitted_at TEXT,
    deposit_verified_at TEXT,
    decided_at TEXT
)
"#;

/// SQL for creating the referrals table.
pub const CREATE_REFERRALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS referrals (
    id TEXT PRIMARY KEY,
    referrer_id TEXT NOT NULL REFERENCES members(id),
    referred_id TEXT NOT NULL UNIQUE REFERENCES members(id),
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    eligible_at TEXT,
    credited_at TEXT,
    credit_amount INTEGER NOT NULL DEFAULT 0,
    credit_expires_at TEXT,
    credit_used INTEGER NOT NULL DEFAULT 0,
    credit_used_month TEXT
)
"#;

/// SQL for creating the fee payments table.
pub const CREATE_FEE_PAYMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS fee_payments (
    member_id TEXT NOT NULL REFERENCES members(id),
    month_key TEXT NOT NULL,
    gross INTEGER NOT NULL,
    credit_applied INTEGER NOT NULL,
    net INTEGER NOT NULL,
    verified_at TEXT NOT NULL,
    PRIMARY KEY (member_id, month_key)
)
"#;

/// Secondary indexes.
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_memberships_member ON memberships(member_id)",
    "CREATE INDEX IF NOT EXISTS idx_early_payout_member_group ON early_payout_requests(member_id, group_id)",
    "CREATE INDEX IF NOT EXISTS idx_referrals_referrer ON referrals(referrer_id)",
];

/// Table DDL in dependency order.
pub const CREATE_TABLES: &[&str] = &[
    CREATE_MEMBERS_TABLE,
    CREATE_GROUPS_TABLE,
    CREATE_MEMBERSHIPS_TABLE,
    CREATE_TRUST_EVENTS_TABLE,
    CREATE_EARLY_PAYOUT_REQUESTS_TABLE,
    CREATE_REFERRALS_TABLE,
    CREATE_FEE_PAYMENTS_TABLE,
];
