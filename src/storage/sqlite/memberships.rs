//! Membership rows keyed by `(group_id, member_id)`.

use chrono::{DateTime, Utc};
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::expect_one_row;
use crate::model::{Membership, MembershipStatus};
use crate::storage::helpers::{format_timestamp, parse_timestamp, parse_uuid};
use crate::storage::schema::Memberships;
use crate::storage::Result;

const COLUMNS: [Memberships; 5] = [
    Memberships::GroupId,
    Memberships::MemberId,
    Memberships::Status,
    Memberships::CreatedAt,
    Memberships::UpdatedAt,
];

fn from_row(row: &SqliteRow) -> Result<Membership> {
    let group_id: String = row.try_get("group_id")?;
    let member_id: String = row.try_get("member_id")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Membership {
        group_id: parse_uuid(&group_id)?,
        member_id: parse_uuid(&member_id)?,
        status: status.parse()?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, membership: &Membership) -> Result<()> {
    let query = Query::insert()
        .into_table(Memberships::Table)
        .columns(COLUMNS)
        .values_panic([
            membership.group_id.to_string().into(),
            membership.member_id.to_string().into(),
            membership.status.as_str().into(),
            format_timestamp(membership.created_at).into(),
            format_timestamp(membership.updated_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub async fn find(
    conn: &mut SqliteConnection,
    group_id: Uuid,
    member_id: Uuid,
) -> Result<Option<Membership>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Memberships::Table)
        .and_where(Expr::col(Memberships::GroupId).eq(group_id.to_string()))
        .and_where(Expr::col(Memberships::MemberId).eq(member_id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn set_status(
    conn: &mut SqliteConnection,
    group_id: Uuid,
    member_id: Uuid,
    status: MembershipStatus,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    let query = Query::update()
        .table(Memberships::Table)
        .values([
            (Memberships::Status, status.as_str().into()),
            (Memberships::UpdatedAt, format_timestamp(updated_at).into()),
        ])
        .and_where(Expr::col(Memberships::GroupId).eq(group_id.to_string()))
        .and_where(Expr::col(Memberships::MemberId).eq(member_id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    expect_one_row(result.rows_affected(), "memberships")
}

pub async fn count_joined(conn: &mut SqliteConnection, group_id: Uuid) -> Result<u32> {
    let query = Query::select()
        .expr(Expr::col(Memberships::MemberId).count())
        .from(Memberships::Table)
        .and_where(Expr::col(Memberships::GroupId).eq(group_id.to_string()))
        .and_where(Expr::col(Memberships::Status).eq(MembershipStatus::Joined.as_str()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
    let count: i64 = row.try_get(0)?;
    Ok(count.max(0) as u32)
}

pub async fn list_for_group(conn: &mut SqliteConnection, group_id: Uuid) -> Result<Vec<Membership>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Memberships::Table)
        .and_where(Expr::col(Memberships::GroupId).eq(group_id.to_string()))
        .order_by(Memberships::CreatedAt, Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_for_member(
    conn: &mut SqliteConnection,
    member_id: Uuid,
) -> Result<Vec<Membership>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Memberships::Table)
        .and_where(Expr::col(Memberships::MemberId).eq(member_id.to_string()))
        .order_by(Memberships::CreatedAt, Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

/// Whether the member holds at least one joined membership in any group.
pub async fn has_joined_any(conn: &mut SqliteConnection, member_id: Uuid) -> Result<bool> {
    let query = Query::select()
        .column(Memberships::GroupId)
        .from(Memberships::Table)
        .and_where(Expr::col(Memberships::MemberId).eq(member_id.to_string()))
        .and_where(Expr::col(Memberships::Status).eq(MembershipStatus::Joined.as_str()))
        .limit(1)
        .to_string(SqliteQueryBuilder);

    Ok(sqlx::query(&query)
        .fetch_optional(&mut *conn)
        .await?
        .is_some())
}

/// Remove every membership of a group, whatever its status.
pub async fn delete_for_group(conn: &mut SqliteConnection, group_id: Uuid) -> Result<u64> {
    let query = Query::delete()
        .from_table(Memberships::Table)
        .and_where(Expr::col(Memberships::GroupId).eq(group_id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}
