use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use fitout_core::domain::catalog::WorkItemId;
use fitout_core::domain::invoice::{
    BillingState, Invoice, InvoiceId, InvoiceNumber, InvoiceStatus,
};

use super::{
    parse_decimal, parse_optional_timestamp, parse_timestamp, parse_u32, InvoiceRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlInvoiceRepository {
    pool: DbPool,
}

impl SqlInvoiceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl InvoiceRepository for SqlInvoiceRepository {
    async fn list_for_work_item(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Vec<Invoice>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        list_invoices(&mut conn, work_item_id).await
    }

    async fn find_by_step(
        &self,
        work_item_id: &WorkItemId,
        step: u32,
    ) -> Result<Option<Invoice>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_invoice_by_step(&mut conn, work_item_id, step).await
    }

    async fn find_billing_state(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<BillingState>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_billing_state(&mut conn, work_item_id).await
    }

    async fn save_billing_state(&self, state: BillingState) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_billing_state(&mut conn, &state).await?;
        Ok(())
    }
}

pub(crate) async fn list_invoices(
    conn: &mut SqliteConnection,
    work_item_id: &WorkItemId,
) -> Result<Vec<Invoice>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id, work_item_id, step_number, year, month, sequence, label, percentage,
                amount, status, proof_ref, paid_at, notified, created_at, updated_at
         FROM invoice
         WHERE work_item_id = ?
         ORDER BY step_number ASC",
    )
    .bind(&work_item_id.0)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(invoice_from_row).collect()
}

pub(crate) async fn load_invoice_by_step(
    conn: &mut SqliteConnection,
    work_item_id: &WorkItemId,
    step: u32,
) -> Result<Option<Invoice>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, work_item_id, step_number, year, month, sequence, label, percentage,
                amount, status, proof_ref, paid_at, notified, created_at, updated_at
         FROM invoice
         WHERE work_item_id = ? AND step_number = ?",
    )
    .bind(&work_item_id.0)
    .bind(i64::from(step))
    .fetch_optional(&mut *conn)
    .await?;

    row.map(invoice_from_row).transpose()
}

/// Next free sequence within the year+month numbering scope. Read inside
/// the same transaction as the insert; a racing allocator loses on the
/// UNIQUE (year, month, sequence) constraint, not here.
pub(crate) async fn next_sequence(
    conn: &mut SqliteConnection,
    year: i32,
    month: u32,
) -> Result<u32, RepositoryError> {
    let row = sqlx::query(
        "SELECT IFNULL(MAX(sequence), 0) AS max_sequence
         FROM invoice
         WHERE year = ? AND month = ?",
    )
    .bind(i64::from(year))
    .bind(i64::from(month))
    .fetch_one(&mut *conn)
    .await?;

    Ok(parse_u32("max_sequence", row.try_get("max_sequence")?)? + 1)
}

pub(crate) async fn insert_invoice(
    conn: &mut SqliteConnection,
    invoice: &Invoice,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO invoice (
            id, work_item_id, step_number, year, month, sequence, label, percentage,
            amount, status, proof_ref, paid_at, notified, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&invoice.id.0)
    .bind(&invoice.work_item_id.0)
    .bind(i64::from(invoice.step_number))
    .bind(i64::from(invoice.number.year))
    .bind(i64::from(invoice.number.month))
    .bind(i64::from(invoice.number.sequence))
    .bind(&invoice.label)
    .bind(invoice.percentage.to_string())
    .bind(invoice.amount.to_string())
    .bind(invoice.status.as_str())
    .bind(invoice.proof_ref.as_deref())
    .bind(invoice.paid_at.map(|value| value.to_rfc3339()))
    .bind(i64::from(invoice.notified))
    .bind(invoice.created_at.to_rfc3339())
    .bind(invoice.updated_at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

/// Identity, step number, and invoice number never change on update.
pub(crate) async fn update_invoice(
    conn: &mut SqliteConnection,
    invoice: &Invoice,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE invoice SET
            label = ?, percentage = ?, amount = ?, status = ?, proof_ref = ?, paid_at = ?,
            notified = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&invoice.label)
    .bind(invoice.percentage.to_string())
    .bind(invoice.amount.to_string())
    .bind(invoice.status.as_str())
    .bind(invoice.proof_ref.as_deref())
    .bind(invoice.paid_at.map(|value| value.to_rfc3339()))
    .bind(i64::from(invoice.notified))
    .bind(invoice.updated_at.to_rfc3339())
    .bind(&invoice.id.0)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn delete_invoice(
    conn: &mut SqliteConnection,
    id: &InvoiceId,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM invoice WHERE id = ?").bind(&id.0).execute(conn).await?;
    Ok(())
}

pub(crate) async fn load_billing_state(
    conn: &mut SqliteConnection,
    work_item_id: &WorkItemId,
) -> Result<Option<BillingState>, RepositoryError> {
    let row = sqlx::query("SELECT work_item_id, unlocked_step FROM billing_state WHERE work_item_id = ?")
        .bind(&work_item_id.0)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|row| {
        Ok(BillingState {
            work_item_id: WorkItemId(row.try_get("work_item_id")?),
            unlocked_step: parse_u32("unlocked_step", row.try_get("unlocked_step")?)?,
        })
    })
    .transpose()
}

pub(crate) async fn upsert_billing_state(
    conn: &mut SqliteConnection,
    state: &BillingState,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO billing_state (work_item_id, unlocked_step)
         VALUES (?, ?)
         ON CONFLICT(work_item_id) DO UPDATE SET unlocked_step = excluded.unlocked_step",
    )
    .bind(&state.work_item_id.0)
    .bind(i64::from(state.unlocked_step))
    .execute(conn)
    .await?;
    Ok(())
}

fn invoice_from_row(row: SqliteRow) -> Result<Invoice, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = InvoiceStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown invoice status `{status_raw}`")))?;

    Ok(Invoice {
        id: InvoiceId(row.try_get("id")?),
        work_item_id: WorkItemId(row.try_get("work_item_id")?),
        step_number: parse_u32("step_number", row.try_get("step_number")?)?,
        number: InvoiceNumber {
            year: i32::try_from(row.try_get::<i64, _>("year")?).map_err(|_| {
                RepositoryError::Decode("invoice year out of range".to_string())
            })?,
            month: parse_u32("month", row.try_get("month")?)?,
            sequence: parse_u32("sequence", row.try_get("sequence")?)?,
        },
        label: row.try_get("label")?,
        percentage: parse_decimal("percentage", row.try_get("percentage")?)?,
        amount: parse_decimal("amount", row.try_get("amount")?)?,
        status,
        proof_ref: row.try_get("proof_ref")?,
        paid_at: parse_optional_timestamp("paid_at", row.try_get("paid_at")?)?,
        notified: row.try_get::<i64, _>("notified")? != 0,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
