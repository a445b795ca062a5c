//! Member rows.

use sea_query::{Expr, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::expect_one_row;
use crate::model::{KycDocuments, Member, MonthKey};
use crate::storage::helpers::{format_timestamp, parse_timestamp, parse_uuid};
use crate::storage::schema::Members;
use crate::storage::Result;

const COLUMNS: [Members; 14] = [
    Members::Id,
    Members::Username,
    Members::FullName,
    Members::Phone,
    Members::Role,
    Members::UpiId,
    Members::TrustScore,
    Members::KycIdentityProof,
    Members::KycAddressProof,
    Members::ReferralCode,
    Members::JoinBlocked,
    Members::FirstFeeVerified,
    Members::FeePaidMonth,
    Members::CreatedAt,
];

fn from_row(row: &SqliteRow) -> Result<Member> {
    let id: String = row.try_get("id")?;
    let role: String = row.try_get("role")?;
    let trust_score: i64 = row.try_get("trust_score")?;
    let fee_paid_month: Option<String> = row.try_get("fee_paid_month")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Member {
        id: parse_uuid(&id)?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        phone: row.try_get("phone")?,
        role: role.parse()?,
        upi_id: row.try_get("upi_id")?,
        trust_score: trust_score.clamp(0, 100) as i32,
        kyc: KycDocuments {
            identity_proof: row.try_get("kyc_identity_proof")?,
            address_proof: row.try_get("kyc_address_proof")?,
        },
        referral_code: row.try_get("referral_code")?,
        join_blocked: row.try_get("join_blocked")?,
        first_fee_verified: row.try_get("first_fee_verified")?,
        fee_paid_month: fee_paid_month.as_deref().map(str::parse::<MonthKey>).transpose()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, member: &Member) -> Result<()> {
    let query = Query::insert()
        .into_table(Members::Table)
        .columns(COLUMNS)
        .values_panic([
            member.id.to_string().into(),
            member.username.clone().into(),
            member.full_name.clone().into(),
            member.phone.clone().into(),
            member.role.as_str().into(),
            member.upi_id.clone().into(),
            member.trust_score.into(),
            member.kyc.identity_proof.into(),
            member.kyc.address_proof.into(),
            member.referral_code.clone().into(),
            member.join_blocked.into(),
            member.first_fee_verified.into(),
            member.fee_paid_month.map(|m| m.to_string()).into(),
            format_timestamp(member.created_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Member>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Members::Table)
        .and_where(Expr::col(Members::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn find_by_referral_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<Member>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Members::Table)
        .and_where(Expr::col(Members::ReferralCode).eq(code))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn referral_code_taken(conn: &mut SqliteConnection, code: &str) -> Result<bool> {
    let query = Query::select()
        .column(Members::Id)
        .from(Members::Table)
        .and_where(Expr::col(Members::ReferralCode).eq(code))
        .to_string(SqliteQueryBuilder);

    Ok(sqlx::query(&query)
        .fetch_optional(&mut *conn)
        .await?
        .is_some())
}

pub async fn username_taken(conn: &mut SqliteConnection, username: &str) -> Result<bool> {
    let query = Query::select()
        .column(Members::Id)
        .from(Members::Table)
        .and_where(Expr::col(Members::Username).eq(username))
        .to_string(SqliteQueryBuilder);

    Ok(sqlx::query(&query)
        .fetch_optional(&mut *conn)
        .await?
        .is_some())
}

/// Overwrite the cached trust score. Only the score recompute calls this.
pub async fn set_trust_score(conn: &mut SqliteConnection, id: Uuid, score: i32) -> Result<()> {
    update_column(conn, id, Members::TrustScore, score.into()).await
}

pub async fn set_upi_id(conn: &mut SqliteConnection, id: Uuid, upi_id: Option<String>) -> Result<()> {
    update_column(conn, id, Members::UpiId, upi_id.into()).await
}

pub async fn set_kyc(conn: &mut SqliteConnection, id: Uuid, kyc: KycDocuments) -> Result<()> {
    let query = Query::update()
        .table(Members::Table)
        .values([
            (Members::KycIdentityProof, kyc.identity_proof.into()),
            (Members::KycAddressProof, kyc.address_proof.into()),
        ])
        .and_where(Expr::col(Members::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    expect_one_row(result.rows_affected(), "members")
}

pub async fn set_join_blocked(conn: &mut SqliteConnection, id: Uuid, blocked: bool) -> Result<()> {
    update_column(conn, id, Members::JoinBlocked, blocked.into()).await
}

/// Flag the month as paid and latch the first-fee flag.
pub async fn mark_fee_paid(conn: &mut SqliteConnection, id: Uuid, month: MonthKey) -> Result<()> {
    let query = Query::update()
        .table(Members::Table)
        .values([
            (Members::FeePaidMonth, month.to_string().into()),
            (Members::FirstFeeVerified, true.into()),
        ])
        .and_where(Expr::col(Members::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    expect_one_row(result.rows_affected(), "members")
}

async fn update_column(
    conn: &mut SqliteConnection,
    id: Uuid,
    column: Members,
    value: sea_query::SimpleExpr,
) -> Result<()> {
    let query = Query::update()
        .table(Members::Table)
        .value(column, value)
        .and_where(Expr::col(Members::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    expect_one_row(result.rows_affected(), "members")
}
