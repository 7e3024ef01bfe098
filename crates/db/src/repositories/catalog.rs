use sqlx::{sqlite::SqliteRow, Row};

use fitout_core::domain::catalog::{
    Component, ComponentCategory, ComponentId, ProductLine, ProductLineId, WorkItem, WorkItemId,
};
use fitout_core::domain::invoice::ReservationFee;

use super::{parse_decimal, parse_optional_decimal, parse_u32, CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn find_work_item(&self, id: &WorkItemId) -> Result<Option<WorkItem>, RepositoryError> {
        let header = sqlx::query(
            "SELECT id, project_name, certificate_issued, certificate_photo
             FROM work_item
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(header) = header else { return Ok(None) };

        let line_rows = sqlx::query(
            "SELECT id, name, room, quantity, length, width, height, base_price
             FROM product_line
             WHERE work_item_id = ?
             ORDER BY id ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut product_lines = Vec::with_capacity(line_rows.len());
        for line_row in line_rows {
            let line_id: String = line_row.try_get("id")?;
            let component_rows = sqlx::query(
                "SELECT id, name, category, unit_price, quantity
                 FROM component
                 WHERE product_line_id = ?
                 ORDER BY id ASC",
            )
            .bind(&line_id)
            .fetch_all(&self.pool)
            .await?;

            let components = component_rows
                .into_iter()
                .map(component_from_row)
                .collect::<Result<Vec<_>, _>>()?;
            product_lines.push(product_line_from_row(line_row, components)?);
        }

        Ok(Some(WorkItem {
            id: WorkItemId(header.try_get("id")?),
            project_name: header.try_get("project_name")?,
            product_lines,
            certificate_issued: header.try_get::<i64, _>("certificate_issued")? != 0,
            certificate_photo: header.try_get("certificate_photo")?,
        }))
    }

    async fn save_work_item(&self, work_item: WorkItem) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO work_item (id, project_name, certificate_issued, certificate_photo)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                project_name = excluded.project_name,
                certificate_issued = excluded.certificate_issued,
                certificate_photo = excluded.certificate_photo",
        )
        .bind(&work_item.id.0)
        .bind(&work_item.project_name)
        .bind(i64::from(work_item.certificate_issued))
        .bind(work_item.certificate_photo.as_deref())
        .execute(&mut *tx)
        .await?;

        // Prune lines dropped from the edit. The schema cascades a removed
        // product line into its cost-sheet and accessory rows, so surviving
        // lines must be upserted rather than rewritten wholesale.
        let existing_rows = sqlx::query("SELECT id FROM product_line WHERE work_item_id = ?")
            .bind(&work_item.id.0)
            .fetch_all(&mut *tx)
            .await?;
        for existing_row in existing_rows {
            let existing_id: String = existing_row.try_get("id")?;
            if !work_item.product_lines.iter().any(|line| line.id.0 == existing_id) {
                sqlx::query("DELETE FROM product_line WHERE id = ?")
                    .bind(&existing_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for line in &work_item.product_lines {
            sqlx::query(
                "INSERT INTO product_line (
                    id, work_item_id, name, room, quantity, length, width, height, base_price
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    work_item_id = excluded.work_item_id,
                    name = excluded.name,
                    room = excluded.room,
                    quantity = excluded.quantity,
                    length = excluded.length,
                    width = excluded.width,
                    height = excluded.height,
                    base_price = excluded.base_price",
            )
            .bind(&line.id.0)
            .bind(&work_item.id.0)
            .bind(&line.name)
            .bind(line.room.as_deref())
            .bind(i64::from(line.quantity))
            .bind(line.length.map(|value| value.to_string()))
            .bind(line.width.map(|value| value.to_string()))
            .bind(line.height.map(|value| value.to_string()))
            .bind(line.base_price.to_string())
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM component WHERE product_line_id = ?")
                .bind(&line.id.0)
                .execute(&mut *tx)
                .await?;

            for component in &line.components {
                sqlx::query(
                    "INSERT INTO component (
                        id, product_line_id, name, category, unit_price, quantity
                     ) VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(&component.id.0)
                .bind(&line.id.0)
                .bind(&component.name)
                .bind(component.category.as_str())
                .bind(component.unit_price.to_string())
                .bind(i64::from(component.quantity))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_certificate(
        &self,
        id: &WorkItemId,
        issued: bool,
        photo: Option<String>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE work_item SET certificate_issued = ?, certificate_photo = ? WHERE id = ?",
        )
        .bind(i64::from(issued))
        .bind(photo.as_deref())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_reservation_fee(
        &self,
        id: &WorkItemId,
    ) -> Result<Option<ReservationFee>, RepositoryError> {
        let row = sqlx::query("SELECT amount, paid FROM reservation_fee WHERE work_item_id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(ReservationFee {
                amount: parse_decimal("amount", row.try_get("amount")?)?,
                paid: row.try_get::<i64, _>("paid")? != 0,
            })
        })
        .transpose()
    }

    async fn save_reservation_fee(
        &self,
        id: &WorkItemId,
        fee: ReservationFee,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO reservation_fee (work_item_id, amount, paid)
             VALUES (?, ?, ?)
             ON CONFLICT(work_item_id) DO UPDATE SET
                amount = excluded.amount,
                paid = excluded.paid",
        )
        .bind(&id.0)
        .bind(fee.amount.to_string())
        .bind(i64::from(fee.paid))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn product_line_from_row(
    row: SqliteRow,
    components: Vec<Component>,
) -> Result<ProductLine, RepositoryError> {
    Ok(ProductLine {
        id: ProductLineId(row.try_get("id")?),
        name: row.try_get("name")?,
        room: row.try_get("room")?,
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        length: parse_optional_decimal("length", row.try_get("length")?)?,
        width: parse_optional_decimal("width", row.try_get("width")?)?,
        height: parse_optional_decimal("height", row.try_get("height")?)?,
        base_price: parse_decimal("base_price", row.try_get("base_price")?)?,
        components,
    })
}

fn component_from_row(row: SqliteRow) -> Result<Component, RepositoryError> {
    let category_raw = row.try_get::<String, _>("category")?;
    let category = ComponentCategory::parse(&category_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown component category `{category_raw}`"))
    })?;

    Ok(Component {
        id: ComponentId(row.try_get("id")?),
        name: row.try_get("name")?,
        category,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use fitout_core::domain::catalog::{
        Component, ComponentCategory, ComponentId, ProductLine, ProductLineId, WorkItem, WorkItemId,
    };
    use fitout_core::domain::invoice::ReservationFee;

    use super::SqlCatalogRepository;
    use crate::migrations;
    use crate::repositories::CatalogRepository;
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn sample_work_item() -> WorkItem {
        WorkItem {
            id: WorkItemId("WI-CAT-1".to_string()),
            project_name: "Cafe interior".to_string(),
            product_lines: vec![ProductLine {
                id: ProductLineId("PL-CAT-1".to_string()),
                name: "Bar counter".to_string(),
                room: Some("Front".to_string()),
                quantity: 1,
                length: Some(dec!(3.5)),
                width: Some(dec!(0.6)),
                height: Some(dec!(1.1)),
                base_price: dec!(750_000),
                components: vec![Component {
                    id: ComponentId("C-CAT-1".to_string()),
                    name: "Teak top".to_string(),
                    category: ComponentCategory::RawMaterial,
                    unit_price: dec!(320_000),
                    quantity: 1,
                }],
            }],
            certificate_issued: false,
            certificate_photo: None,
        }
    }

    #[tokio::test]
    async fn work_item_round_trips_with_lines_and_components() {
        let pool = setup_pool().await;
        let repo = SqlCatalogRepository::new(pool.clone());

        let work_item = sample_work_item();
        repo.save_work_item(work_item.clone()).await.expect("save work item");

        let found = repo.find_work_item(&work_item.id).await.expect("find work item");
        assert_eq!(found, Some(work_item));

        pool.close().await;
    }

    #[tokio::test]
    async fn removed_product_lines_are_pruned_on_resave() {
        let pool = setup_pool().await;
        let repo = SqlCatalogRepository::new(pool.clone());

        let mut work_item = sample_work_item();
        work_item.product_lines.push(ProductLine {
            id: ProductLineId("PL-CAT-2".to_string()),
            name: "Wall shelving".to_string(),
            room: None,
            quantity: 2,
            length: None,
            width: None,
            height: None,
            base_price: dec!(150_000),
            components: vec![],
        });
        repo.save_work_item(work_item.clone()).await.expect("save work item");

        work_item.product_lines.truncate(1);
        repo.save_work_item(work_item.clone()).await.expect("resave work item");

        let found = repo.find_work_item(&work_item.id).await.expect("find work item");
        assert_eq!(found, Some(work_item));

        pool.close().await;
    }

    #[tokio::test]
    async fn certificate_update_is_visible_on_reload() {
        let pool = setup_pool().await;
        let repo = SqlCatalogRepository::new(pool.clone());

        let work_item = sample_work_item();
        repo.save_work_item(work_item.clone()).await.expect("save work item");
        repo.set_certificate(&work_item.id, true, Some("photos/bast.jpg".to_string()))
            .await
            .expect("set certificate");

        let found = repo
            .find_work_item(&work_item.id)
            .await
            .expect("find work item")
            .expect("work item exists");
        assert!(found.certificate_issued);
        assert_eq!(found.certificate_photo.as_deref(), Some("photos/bast.jpg"));

        pool.close().await;
    }

    #[tokio::test]
    async fn reservation_fee_upserts() {
        let pool = setup_pool().await;
        let repo = SqlCatalogRepository::new(pool.clone());

        let work_item = sample_work_item();
        repo.save_work_item(work_item.clone()).await.expect("save work item");

        let fee = ReservationFee { amount: dec!(100_000), paid: false };
        repo.save_reservation_fee(&work_item.id, fee.clone()).await.expect("save fee");
        assert_eq!(
            repo.find_reservation_fee(&work_item.id).await.expect("find fee"),
            Some(fee)
        );

        let settled = ReservationFee { amount: dec!(100_000), paid: true };
        repo.save_reservation_fee(&work_item.id, settled.clone()).await.expect("update fee");
        assert_eq!(
            repo.find_reservation_fee(&work_item.id).await.expect("find fee"),
            Some(settled)
        );

        pool.close().await;
    }
}
