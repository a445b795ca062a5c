//! Append-only trust event log.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::model::TrustEvent;
use crate::storage::helpers::{
    format_date, format_timestamp, parse_optional_date, parse_optional_timestamp,
    parse_optional_uuid, parse_timestamp, parse_uuid,
};
use crate::storage::schema::TrustEvents;
use crate::storage::{Result, StorageError};

const COLUMNS: [TrustEvents; 8] = [
    TrustEvents::MemberId,
    TrustEvents::Sequence,
    TrustEvents::EventType,
    TrustEvents::GroupId,
    TrustEvents::DueDate,
    TrustEvents::VerifiedAt,
    TrustEvents::CreatedAt,
    TrustEvents::Note,
];

fn from_row(row: &SqliteRow) -> Result<TrustEvent> {
    let member_id: String = row.try_get("member_id")?;
    let sequence: i64 = row.try_get("sequence")?;
    let event_type: String = row.try_get("event_type")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(TrustEvent {
        member_id: parse_uuid(&member_id)?,
        sequence: u32::try_from(sequence).map_err(|_| StorageError::Corrupt {
            table: "trust_events",
            reason: format!("sequence out of range: {sequence}"),
        })?,
        event_type: event_type.parse()?,
        group_id: parse_optional_uuid(row.try_get("group_id")?)?,
        due_date: parse_optional_date(row.try_get("due_date")?)?,
        verified_at: parse_optional_timestamp(row.try_get("verified_at")?)?,
        created_at: parse_timestamp(&created_at)?,
        note: row.try_get("note")?,
    })
}

/// Next free sequence for the member. Must run inside the writing transaction.
async fn next_sequence(conn: &mut SqliteConnection, member: &str) -> Result<u32> {
    let query = Query::select()
        .expr(Expr::col(TrustEvents::Sequence).max())
        .from(TrustEvents::Table)
        .and_where(Expr::col(TrustEvents::MemberId).eq(member))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;

    match row {
        Some(row) => {
            let max_seq: Option<i64> = row.try_get(0)?;
            Ok(max_seq.map(|s| s as u32 + 1).unwrap_or(0))
        }
        None => Ok(0),
    }
}

/// Append one event and return it with its assigned sequence.
pub async fn append(conn: &mut SqliteConnection, event: TrustEvent) -> Result<TrustEvent> {
    let member = event.member_id.to_string();
    let sequence = next_sequence(conn, &member).await?;

    let query = Query::insert()
        .into_table(TrustEvents::Table)
        .columns(COLUMNS)
        .values_panic([
            member.into(),
            sequence.into(),
            event.event_type.as_str().into(),
            event.group_id.map(|g| g.to_string()).into(),
            event.due_date.map(format_date).into(),
            event.verified_at.map(format_timestamp).into(),
            format_timestamp(event.created_at).into(),
            event.note.clone().into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;

    Ok(TrustEvent { sequence, ..event })
}

/// The member's full history in append order.
pub async fn list_for_member(conn: &mut SqliteConnection, member_id: Uuid) -> Result<Vec<TrustEvent>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(TrustEvents::Table)
        .and_where(Expr::col(TrustEvents::MemberId).eq(member_id.to_string()))
        .order_by(TrustEvents::Sequence, Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}

pub async fn exists_for_group(conn: &mut SqliteConnection, group_id: Uuid) -> Result<bool> {
    let query = Query::select()
        .column(TrustEvents::Sequence)
        .from(TrustEvents::Table)
        .and_where(Expr::col(TrustEvents::GroupId).eq(group_id.to_string()))
        .limit(1)
        .to_string(SqliteQueryBuilder);

    Ok(sqlx::query(&query)
        .fetch_optional(&mut *conn)
        .await?
        .is_some())
}
