//! Referral rows and the credits they carry.

use chrono::{DateTime, Utc};
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::expect_one_row;
use crate::model::{MonthKey, Referral, ReferralStatus};
use crate::storage::helpers::{
    format_timestamp, parse_optional_timestamp, parse_timestamp, parse_uuid,
};
use crate::storage::schema::Referrals;
use crate::storage::Result;

const COLUMNS: [Referrals; 11] = [
    Referrals::Id,
    Referrals::ReferrerId,
    Referrals::ReferredId,
    Referrals::Status,
    Referrals::CreatedAt,
    Referrals::EligibleAt,
    Referrals::CreditedAt,
    Referrals::CreditAmount,
    Referrals::CreditExpiresAt,
    Referrals::CreditUsed,
    Referrals::CreditUsedMonth,
];

fn from_row(row: &SqliteRow) -> Result<Referral> {
    let id: String = row.try_get("id")?;
    let referrer_id: String = row.try_get("referrer_id")?;
    let referred_id: String = row.try_get("referred_id")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let used_month: Option<String> = row.try_get("credit_used_month")?;

    Ok(Referral {
        id: parse_uuid(&id)?,
        referrer_id: parse_uuid(&referrer_id)?,
        referred_id: parse_uuid(&referred_id)?,
        status: status.parse()?,
        created_at: parse_timestamp(&created_at)?,
        eligible_at: parse_optional_timestamp(row.try_get("eligible_at")?)?,
        credited_at: parse_optional_timestamp(row.try_get("credited_at")?)?,
        credit_amount: row.try_get("credit_amount")?,
        credit_expires_at: parse_optional_timestamp(row.try_get("credit_expires_at")?)?,
        credit_used: row.try_get("credit_used")?,
        credit_used_month: used_month.as_deref().map(str::parse::<MonthKey>).transpose()?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, referral: &Referral) -> Result<()> {
    let query = Query::insert()
        .into_table(Referrals::Table)
        .columns(COLUMNS)
        .values_panic([
            referral.id.to_string().into(),
            referral.referrer_id.to_string().into(),
            referral.referred_id.to_string().into(),
            referral.status.as_str().into(),
            format_timestamp(referral.created_at).into(),
            referral.eligible_at.map(format_timestamp).into(),
            referral.credited_at.map(format_timestamp).into(),
            referral.credit_amount.into(),
            referral.credit_expires_at.map(format_timestamp).into(),
            referral.credit_used.into(),
            referral.credit_used_month.map(|m| m.to_string()).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Referral>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Referrals::Table)
        .and_where(Expr::col(Referrals::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

/// The one referral, if any, in which `member_id` was the referred party.
pub async fn find_by_referred(
    conn: &mut SqliteConnection,
    member_id: Uuid,
) -> Result<Option<Referral>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Referrals::Table)
        .and_where(Expr::col(Referrals::ReferredId).eq(member_id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list_for_referrer(
    conn: &mut SqliteConnection,
    referrer_id: Uuid,
) -> Result<Vec<Referral>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Referrals::Table)
        .and_where(Expr::col(Referrals::ReferrerId).eq(referrer_id.to_string()))
        .order_by(Referrals::CreatedAt, Order::Asc)
        .order_by(Referrals::Id, Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

/// Credited, unused credits that are still live at `now`, oldest credit first.
pub async fn spendable_credits(
    conn: &mut SqliteConnection,
    referrer_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<Referral>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Referrals::Table)
        .and_where(Expr::col(Referrals::ReferrerId).eq(referrer_id.to_string()))
        .and_where(Expr::col(Referrals::Status).eq(ReferralStatus::Credited.as_str()))
        .and_where(Expr::col(Referrals::CreditUsed).eq(false))
        .and_where(Expr::col(Referrals::CreditExpiresAt).gt(format_timestamp(now)))
        .order_by(Referrals::CreditedAt, Order::Asc)
        .order_by(Referrals::Id, Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

/// Persist status, lifecycle stamps and credit columns.
pub async fn save(conn: &mut SqliteConnection, referral: &Referral) -> Result<()> {
    let query = Query::update()
        .table(Referrals::Table)
        .values([
            (Referrals::Status, referral.status.as_str().into()),
            (
                Referrals::EligibleAt,
                referral.eligible_at.map(format_timestamp).into(),
            ),
            (
                Referrals::CreditedAt,
                referral.credited_at.map(format_timestamp).into(),
            ),
            (Referrals::CreditAmount, referral.credit_amount.into()),
            (
                Referrals::CreditExpiresAt,
                referral.credit_expires_at.map(format_timestamp).into(),
            ),
            (Referrals::CreditUsed, referral.credit_used.into()),
            (
                Referrals::CreditUsedMonth,
                referral.credit_used_month.map(|m| m.to_string()).into(),
            ),
        ])
        .and_where(Expr::col(Referrals::Id).eq(referral.id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    expect_one_row(result.rows_affected(), "referrals")
}

/// Mark one credit consumed for `month`. Fails if it was already used.
pub async fn mark_credit_used(
    conn: &mut SqliteConnection,
    id: Uuid,
    month: MonthKey,
) -> Result<()> {
    let query = Query::update()
        .table(Referrals::Table)
        .values([
            (Referrals::CreditUsed, true.into()),
            (Referrals::CreditUsedMonth, month.to_string().into()),
        ])
        .and_where(Expr::col(Referrals::Id).eq(id.to_string()))
        .and_where(Expr::col(Referrals::CreditUsed).eq(false))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    expect_one_row(result.rows_affected(), "referrals")
}
