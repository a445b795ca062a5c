//! Fee payment records, one per member and month.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::model::{FeePayment, MonthKey};
use crate::storage::helpers::{format_timestamp, parse_timestamp, parse_uuid};
use crate::storage::schema::FeePayments;
use crate::storage::Result;

const COLUMNS: [FeePayments; 6] = [
    FeePayments::MemberId,
    FeePayments::MonthKey,
    FeePayments::Gross,
    FeePayments::CreditApplied,
    FeePayments::Net,
    FeePayments::VerifiedAt,
];

fn from_row(row: &SqliteRow) -> Result<FeePayment> {
    let member_id: String = row.try_get("member_id")?;
    let month: String = row.try_get("month_key")?;
    let verified_at: String = row.try_get("verified_at")?;

    Ok(FeePayment {
        member_id: parse_uuid(&member_id)?,
        month: month.parse()?,
        gross: row.try_get("gross")?,
        credit_applied: row.try_get("credit_applied")?,
        net: row.try_get("net")?,
        verified_at: parse_timestamp(&verified_at)?,
    })
}

pub async fn find(
    conn: &mut SqliteConnection,
    member_id: Uuid,
    month: MonthKey,
) -> Result<Option<FeePayment>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(FeePayments::Table)
        .and_where(Expr::col(FeePayments::MemberId).eq(member_id.to_string()))
        .and_where(Expr::col(FeePayments::MonthKey).eq(month.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn insert(conn: &mut SqliteConnection, payment: &FeePayment) -> Result<()> {
    let query = Query::insert()
        .into_table(FeePayments::Table)
        .columns(COLUMNS)
        .values_panic([
            payment.member_id.to_string().into(),
            payment.month.to_string().into(),
            payment.gross.into(),
            payment.credit_applied.into(),
            payment.net.into(),
            format_timestamp(payment.verified_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

/// Payment history, most recent month first.
pub async fn list_for_member(conn: &mut SqliteConnection, member_id: Uuid) -> Result<Vec<FeePayment>> {
    let query = Query::select()
        .columns(COLUMNS)
        .from(FeePayments::Table)
        .and_where(Expr::col(FeePayments::MemberId).eq(member_id.to_string()))
        .order_by(FeePayments::MonthKey, Order::Desc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(from_row).collect()
}
