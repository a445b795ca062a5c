//! Early payout request rows.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::expect_one_row;
use crate::model::{EarlyPayoutRequest, PayoutRequestStatus};
use crate::storage::helpers::{
    format_timestamp, parse_optional_timestamp, parse_timestamp, parse_uuid,
};
use crate::storage::schema::EarlyPayoutRequests;
use crate::storage::Result;

const COLUMNS: [EarlyPayoutRequests; 15] = [
    EarlyPayoutRequests::Id,
    EarlyPayoutRequests::MemberId,
    EarlyPayoutRequests::GroupId,
    EarlyPayoutRequests::MonthlyAmount,
    EarlyPayoutRequests::TrustScore,
    EarlyPayoutRequests::DepositAmount,
    EarlyPayoutRequests::Status,
    EarlyPayoutRequests::DepositStatus,
    EarlyPayoutRequests::Utr,
    EarlyPayoutRequests::Reason,
    EarlyPayoutRequests::DecisionReason,
    EarlyPayoutRequests::CreatedAt,
    EarlyPayoutRequests::DepositSubmittedAt,
    EarlyPayoutRequests::DepositVerifiedAt,
    EarlyPayoutRequests::DecidedAt,
];

fn from_row(row: &SqliteRow) -> Result<EarlyPayoutRequest> {
    let id: String = row.try_get("id")?;
    let member_id: String = row.try_get("member_id")?;
    let group_id: String = row.try_get("group_id")?;
    let trust_score: i64 = row.try_get("trust_score")?;
    let status: String = row.try_get("status")?;
    let deposit_status: String = row.try_get("deposit_status")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(EarlyPayoutRequest {
        id: parse_uuid(&id)?,
        member_id: parse_uuid(&member_id)?,
        group_id: parse_uuid(&group_id)?,
        monthly_amount: row.try_get("monthly_amount")?,
        trust_score: trust_score.clamp(0, 100) as i32,
        deposit_amount: row.try_get("deposit_amount")?,
        status: status.parse()?,
        deposit_status: deposit_status.parse()?,
        utr: row.try_get("utr")?,
        reason: row.try_get("reason")?,
        decision_reason: row.try_get("decision_reason")?,
        created_at: parse_timestamp(&created_at)?,
        deposit_submitted_at: parse_optional_timestamp(row.try_get("deposit_submitted_at")?)?,
        deposit_verified_at: parse_optional_timestamp(row.try_get("deposit_verified_at")?)?,
        decided_at: parse_optional_timestamp(row.try_get("decided_at")?)?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, request: &EarlyPayoutRequest) -> Result<()> {
    let query = Query::insert()
        .into_table(EarlyPayoutRequests::Table)
        .columns(COLUMNS)
        .values_panic([
            request.id.to_string().into(),
            request.member_id.to_string().into(),
            request.group_id.to_string().into(),
            request.monthly_amount.into(),
            request.trust_score.into(),
            request.deposit_amount.into(),
            request.status.as_str().into(),
            request.deposit_status.as_str().into(),
            request.utr.clone().into(),
            request.reason.clone().into(),
            request.decision_reason.clone().into(),
            format_timestamp(request.created_at).into(),
            request.deposit_submitted_at.map(format_timestamp).into(),
            request.deposit_verified_at.map(format_timestamp).into(),
            request.decided_at.map(format_timestamp).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<EarlyPayoutRequest>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(EarlyPayoutRequests::Table)
        .and_where(Expr::col(EarlyPayoutRequests::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

/// Persist the workflow columns. Snapshots taken at creation are left alone.
pub async fn save(conn: &mut SqliteConnection, request: &EarlyPayoutRequest) -> Result<()> {
    let query = Query::update()
        .table(EarlyPayoutRequests::Table)
        .values([
            (EarlyPayoutRequests::Status, request.status.as_str().into()),
            (
                EarlyPayoutRequests::DepositStatus,
                request.deposit_status.as_str().into(),
            ),
            (EarlyPayoutRequests::Utr, request.utr.clone().into()),
            (
                EarlyPayoutRequests::DecisionReason,
                request.decision_reason.clone().into(),
            ),
            (
                EarlyPayoutRequests::DepositSubmittedAt,
                request.deposit_submitted_at.map(format_timestamp).into(),
            ),
            (
                EarlyPayoutRequests::DepositVerifiedAt,
                request.deposit_verified_at.map(format_timestamp).into(),
            ),
            (
                EarlyPayoutRequests::DecidedAt,
                request.decided_at.map(format_timestamp).into(),
            ),
        ])
        .and_where(Expr::col(EarlyPayoutRequests::Id).eq(request.id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    expect_one_row(result.rows_affected(), "early_payout_requests")
}

/// Requests for a member, newest first, optionally narrowed to one group.
pub async fn list_for_member(
    conn: &mut SqliteConnection,
    member_id: Uuid,
    group_id: Option<Uuid>,
) -> Result<Vec<EarlyPayoutRequest>> {
    let mut query = Query::select();
    query
        .columns(COLUMNS)
        .from(EarlyPayoutRequests::Table)
        .and_where(Expr::col(EarlyPayoutRequests::MemberId).eq(member_id.to_string()));
    if let Some(group_id) = group_id {
        query.and_where(Expr::col(EarlyPayoutRequests::GroupId).eq(group_id.to_string()));
    }
    let query = query
        .order_by(EarlyPayoutRequests::CreatedAt, Order::Desc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

/// Requests in the given status across all members, oldest first.
pub async fn list_by_status(
    conn: &mut SqliteConnection,
    status: PayoutRequestStatus,
) -> Result<Vec<EarlyPayoutRequest>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(EarlyPayoutRequests::Table)
        .and_where(Expr::col(EarlyPayoutRequests::Status).eq(status.as_str()))
        .order_by(EarlyPayoutRequests::CreatedAt, Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

/// Whether the member already holds a non-terminal request for the group.
pub async fn has_unresolved(
    conn: &mut SqliteConnection,
    member_id: Uuid,
    group_id: Uuid,
) -> Result<bool> {
    let query = Query::select()
        .column(EarlyPayoutRequests::Id)
        .from(EarlyPayoutRequests::Table)
        .and_where(Expr::col(EarlyPayoutRequests::MemberId).eq(member_id.to_string()))
        .and_where(Expr::col(EarlyPayoutRequests::GroupId).eq(group_id.to_string()))
        .and_where(Expr::col(EarlyPayoutRequests::Status).is_in([
            PayoutRequestStatus::PendingDeposit.as_str(),
            PayoutRequestStatus::UnderReview.as_str(),
        ]))
        .limit(1)
        .to_string(SqliteQueryBuilder);

    Ok(sqlx::query(&query)
        .fetch_optional(&mut *conn)
        .await?
        .is_some())
}

/// Whether any request, resolved or not, names the group.
pub async fn exists_for_group(conn: &mut SqliteConnection, group_id: Uuid) -> Result<bool> {
    let query = Query::select()
        .column(EarlyPayoutRequests::Id)
        .from(EarlyPayoutRequests::Table)
        .and_where(Expr::col(EarlyPayoutRequests::GroupId).eq(group_id.to_string()))
        .limit(1)
        .to_string(SqliteQueryBuilder);

    Ok(sqlx::query(&query)
        .fetch_optional(&mut *conn)
        .await?
        .is_some())
}
