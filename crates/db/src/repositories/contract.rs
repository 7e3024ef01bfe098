use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use fitout_core::domain::catalog::WorkItemId;
use fitout_core::domain::contract::{
    Contract, ContractId, ContractState, PaymentSchedule, ScheduleId, ScheduleStep,
};

use super::{
    parse_decimal, parse_optional_decimal, parse_timestamp, parse_u32, ContractRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlContractRepository {
    pool: DbPool,
}

impl SqlContractRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ContractRepository for SqlContractRepository {
    async fn find_by_work_item(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<Contract>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_contract(&mut conn, work_item_id).await
    }

    async fn find_schedule(
        &self,
        id: &ScheduleId,
    ) -> Result<Option<PaymentSchedule>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_schedule(&mut conn, id).await
    }

    async fn list_schedules(&self) -> Result<Vec<PaymentSchedule>, RepositoryError> {
        let ids: Vec<String> = sqlx::query("SELECT id FROM payment_schedule ORDER BY code ASC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.try_get("id"))
            .collect::<Result<_, _>>()?;

        let mut conn = self.pool.acquire().await?;
        let mut schedules = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(schedule) = load_schedule(&mut conn, &ScheduleId(id)).await? {
                schedules.push(schedule);
            }
        }
        Ok(schedules)
    }

    async fn save_schedule(&self, schedule: PaymentSchedule) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO payment_schedule (id, code, name)
             VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code, name = excluded.name",
        )
        .bind(&schedule.id.0)
        .bind(&schedule.code)
        .bind(&schedule.name)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM schedule_step WHERE schedule_id = ?")
            .bind(&schedule.id.0)
            .execute(&mut *tx)
            .await?;

        for step in &schedule.steps {
            sqlx::query(
                "INSERT INTO schedule_step (schedule_id, number, label, percentage)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&schedule.id.0)
            .bind(i64::from(step.number))
            .bind(&step.label)
            .bind(step.percentage.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

pub(crate) async fn load_contract(
    conn: &mut SqliteConnection,
    work_item_id: &WorkItemId,
) -> Result<Option<Contract>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, work_item_id, state, price, duration_days, schedule_id, created_at, updated_at
         FROM contract
         WHERE work_item_id = ?",
    )
    .bind(&work_item_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(contract_from_row).transpose()
}

/// Finalization is a single overwrite, not additive: re-finalizing replaces
/// price, duration, and schedule on the existing row.
pub(crate) async fn upsert_contract(
    conn: &mut SqliteConnection,
    contract: &Contract,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO contract (
            id, work_item_id, state, price, duration_days, schedule_id, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(work_item_id) DO UPDATE SET
            state = excluded.state,
            price = excluded.price,
            duration_days = excluded.duration_days,
            schedule_id = excluded.schedule_id,
            updated_at = excluded.updated_at",
    )
    .bind(&contract.id.0)
    .bind(&contract.work_item_id.0)
    .bind(contract.state.as_str())
    .bind(contract.price.map(|value| value.to_string()))
    .bind(contract.duration_days.map(i64::from))
    .bind(contract.schedule_id.as_ref().map(|id| id.0.as_str()))
    .bind(contract.created_at.to_rfc3339())
    .bind(contract.updated_at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn load_schedule(
    conn: &mut SqliteConnection,
    id: &ScheduleId,
) -> Result<Option<PaymentSchedule>, RepositoryError> {
    let header = sqlx::query("SELECT id, code, name FROM payment_schedule WHERE id = ?")
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(header) = header else { return Ok(None) };

    let step_rows = sqlx::query(
        "SELECT number, label, percentage
         FROM schedule_step
         WHERE schedule_id = ?
         ORDER BY number ASC",
    )
    .bind(&id.0)
    .fetch_all(&mut *conn)
    .await?;

    let steps = step_rows
        .into_iter()
        .map(|row| {
            Ok(ScheduleStep {
                number: parse_u32("number", row.try_get("number")?)?,
                label: row.try_get("label")?,
                percentage: parse_decimal("percentage", row.try_get("percentage")?)?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

    Ok(Some(PaymentSchedule {
        id: ScheduleId(header.try_get("id")?),
        code: header.try_get("code")?,
        name: header.try_get("name")?,
        steps,
    }))
}

fn contract_from_row(row: SqliteRow) -> Result<Contract, RepositoryError> {
    let state_raw = row.try_get::<String, _>("state")?;
    let state = ContractState::parse(&state_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown contract state `{state_raw}`")))?;

    Ok(Contract {
        id: ContractId(row.try_get("id")?),
        work_item_id: WorkItemId(row.try_get("work_item_id")?),
        state,
        price: parse_optional_decimal("price", row.try_get("price")?)?,
        duration_days: row
            .try_get::<Option<i64>, _>("duration_days")?
            .map(|value| parse_u32("duration_days", value))
            .transpose()?,
        schedule_id: row.try_get::<Option<String>, _>("schedule_id")?.map(ScheduleId),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use fitout_core::domain::contract::{PaymentSchedule, ScheduleId, ScheduleStep};

    use super::SqlContractRepository;
    use crate::migrations;
    use crate::repositories::ContractRepository;
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn schedule_round_trips_with_ordered_steps() {
        let pool = setup_pool().await;
        let repo = SqlContractRepository::new(pool.clone());

        let schedule = PaymentSchedule {
            id: ScheduleId("SCH-T3".to_string()),
            code: "T3".to_string(),
            name: "Three tranches".to_string(),
            steps: vec![
                ScheduleStep { number: 1, label: "Down payment".to_string(), percentage: dec!(30) },
                ScheduleStep { number: 2, label: "Progress".to_string(), percentage: dec!(30) },
                ScheduleStep { number: 3, label: "Handover".to_string(), percentage: dec!(40) },
            ],
        };

        repo.save_schedule(schedule.clone()).await.expect("save schedule");

        let found = repo.find_schedule(&schedule.id).await.expect("find schedule");
        assert_eq!(found, Some(schedule.clone()));

        let all = repo.list_schedules().await.expect("list schedules");
        assert_eq!(all, vec![schedule]);

        pool.close().await;
    }
}
