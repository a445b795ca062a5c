//! Group rows, including the cycle schedule and payout receiver snapshot.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::expect_one_row;
use crate::model::{CycleSchedule, Group, PayoutReceiver};
use crate::storage::helpers::{
    format_date, format_time, format_timestamp, parse_date, parse_optional_date, parse_time,
    parse_timestamp, parse_uuid,
};
use crate::storage::schema::Groups;
use crate::storage::{Result, StorageError};

const COLUMNS: [Groups; 16] = [
    Groups::Id,
    Groups::Name,
    Groups::Description,
    Groups::MonthlyAmount,
    Groups::MaxMembers,
    Groups::Status,
    Groups::Paused,
    Groups::ActivatedAt,
    Groups::NextDueDate,
    Groups::PayoutCutoff,
    Groups::ReceiverMemberId,
    Groups::ReceiverUsername,
    Groups::ReceiverName,
    Groups::ReceiverUpi,
    Groups::ReceiverSelectedAt,
    Groups::CreatedAt,
];

fn corrupt(reason: impl Into<String>) -> StorageError {
    StorageError::Corrupt {
        table: "groups",
        reason: reason.into(),
    }
}

fn schedule_from_row(row: &SqliteRow) -> Result<Option<CycleSchedule>> {
    let activated_at = parse_optional_date(row.try_get("activated_at")?)?;
    let next_due_date = parse_optional_date(row.try_get("next_due_date")?)?;
    let cutoff: Option<String> = row.try_get("payout_cutoff")?;

    match (activated_at, next_due_date) {
        (Some(activated_on), Some(next_due_date)) => {
            let cutoff = cutoff.ok_or_else(|| corrupt("scheduled group without payout cutoff"))?;
            Ok(Some(CycleSchedule {
                activated_on,
                next_due_date,
                payout_cutoff: parse_time(&cutoff)?,
            }))
        }
        (None, None) => Ok(None),
        _ => Err(corrupt("activated_at and next_due_date must be set together")),
    }
}

fn receiver_from_row(row: &SqliteRow) -> Result<Option<PayoutReceiver>> {
    let member_id: Option<String> = row.try_get("receiver_member_id")?;
    let Some(member_id) = member_id else {
        return Ok(None);
    };
    let selected_on: Option<String> = row.try_get("receiver_selected_at")?;
    let selected_on = selected_on.ok_or_else(|| corrupt("receiver without selection date"))?;

    Ok(Some(PayoutReceiver {
        member_id: parse_uuid(&member_id)?,
        username: row.try_get::<Option<String>, _>("receiver_username")?.unwrap_or_default(),
        display_name: row.try_get::<Option<String>, _>("receiver_name")?.unwrap_or_default(),
        upi_id: row.try_get::<Option<String>, _>("receiver_upi")?.unwrap_or_default(),
        selected_on: parse_date(&selected_on)?,
    }))
}

fn from_row(row: &SqliteRow) -> Result<Group> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let max_members: i64 = row.try_get("max_members")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Group {
        id: parse_uuid(&id)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        monthly_amount: row.try_get("monthly_amount")?,
        max_members: u32::try_from(max_members)
            .map_err(|_| corrupt(format!("max_members out of range: {max_members}")))?,
        status: status.parse()?,
        paused: row.try_get("paused")?,
        schedule: schedule_from_row(row)?,
        receiver: receiver_from_row(row)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, group: &Group) -> Result<()> {
    let query = Query::insert()
        .into_table(Groups::Table)
        .columns([
            Groups::Id,
            Groups::Name,
            Groups::Description,
            Groups::MonthlyAmount,
            Groups::MaxMembers,
            Groups::Status,
            Groups::Paused,
            Groups::CreatedAt,
        ])
        .values_panic([
            group.id.to_string().into(),
            group.name.clone().into(),
            group.description.clone().into(),
            group.monthly_amount.into(),
            group.max_members.into(),
            group.status.as_str().into(),
            group.paused.into(),
            format_timestamp(group.created_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;

    if group.schedule.is_some() || group.receiver.is_some() {
        save(conn, group).await?;
    }
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Group>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Groups::Table)
        .and_where(Expr::col(Groups::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Group>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(Groups::Table)
        .order_by(Groups::CreatedAt, Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

/// Write every mutable column in one statement so the schedule fields and
/// status never land separately.
pub async fn save(conn: &mut SqliteConnection, group: &Group) -> Result<()> {
    let schedule = group.schedule.as_ref();
    let receiver = group.receiver.as_ref();

    let query = Query::update()
        .table(Groups::Table)
        .values([
            (Groups::Name, group.name.clone().into()),
            (Groups::Description, group.description.clone().into()),
            (Groups::MonthlyAmount, group.monthly_amount.into()),
            (Groups::Status, group.status.as_str().into()),
            (Groups::Paused, group.paused.into()),
            (
                Groups::ActivatedAt,
                schedule.map(|s| format_date(s.activated_on)).into(),
            ),
            (
                Groups::NextDueDate,
                schedule.map(|s| format_date(s.next_due_date)).into(),
            ),
            (
                Groups::PayoutCutoff,
                schedule.map(|s| format_time(s.payout_cutoff)).into(),
            ),
            (
                Groups::ReceiverMemberId,
                receiver.map(|r| r.member_id.to_string()).into(),
            ),
            (
                Groups::ReceiverUsername,
                receiver.map(|r| r.username.clone()).into(),
            ),
            (
                Groups::ReceiverName,
                receiver.map(|r| r.display_name.clone()).into(),
            ),
            (Groups::ReceiverUpi, receiver.map(|r| r.upi_id.clone()).into()),
            (
                Groups::ReceiverSelectedAt,
                receiver.map(|r| format_date(r.selected_on)).into(),
            ),
        ])
        .and_where(Expr::col(Groups::Id).eq(group.id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    expect_one_row(result.rows_affected(), "groups")
}

pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    let query = Query::delete()
        .from_table(Groups::Table)
        .and_where(Expr::col(Groups::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    expect_one_row(result.rows_affected(), "groups")
}
