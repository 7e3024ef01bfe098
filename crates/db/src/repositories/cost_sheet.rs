//! Persistence for the four valuation views. Reads assemble a full sheet
//! from header, line, and accessory rows; writes are `pub(crate)` helpers
//! over a borrowed connection so the engine can compose them inside one
//! transaction.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use fitout_core::domain::catalog::{ComponentId, ProductLineId, WorkItemId};
use fitout_core::domain::cost_sheet::{
    AccessoryCostLine, ContractAccessoryLine, ContractCostLine, ContractCostSheet,
    InternalCostLine, InternalCostSheet, ResponseStamp, ServiceCostLine, ServiceCostSheet,
    SheetId, VendorAccessoryLine, VendorCostLine, VendorCostSheet,
};

use super::{parse_decimal, parse_timestamp, parse_u32, CostSheetRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCostSheetRepository {
    pool: DbPool,
}

impl SqlCostSheetRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CostSheetRepository for SqlCostSheetRepository {
    async fn find_internal(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<InternalCostSheet>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_internal(&mut conn, work_item_id).await
    }

    async fn find_contract(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<ContractCostSheet>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_contract(&mut conn, work_item_id).await
    }

    async fn find_vendor(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<VendorCostSheet>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_vendor(&mut conn, work_item_id).await
    }

    async fn find_service(
        &self,
        work_item_id: &WorkItemId,
    ) -> Result<Option<ServiceCostSheet>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_service(&mut conn, work_item_id).await
    }
}

pub(crate) async fn load_internal(
    conn: &mut SqliteConnection,
    work_item_id: &WorkItemId,
) -> Result<Option<InternalCostSheet>, RepositoryError> {
    let header = sqlx::query(
        "SELECT id, work_item_id, response_actor, response_at, submitted_actor, submitted_at
         FROM internal_sheet
         WHERE work_item_id = ?",
    )
    .bind(&work_item_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(header) = header else { return Ok(None) };
    let sheet_id: String = header.try_get("id")?;

    let line_rows = sqlx::query(
        "SELECT product_line_id, base_price, component_sum, dimensional_qty, markup_pct,
                discount_pct, unit_price, accessory_total, final_price
         FROM internal_line
         WHERE sheet_id = ?
         ORDER BY product_line_id ASC",
    )
    .bind(&sheet_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut lines = Vec::with_capacity(line_rows.len());
    for row in line_rows {
        let product_line_id: String = row.try_get("product_line_id")?;
        let accessory_rows = sqlx::query(
            "SELECT component_id, name, unit_price, quantity, markup_pct, total
             FROM internal_accessory
             WHERE sheet_id = ? AND product_line_id = ?
             ORDER BY component_id ASC",
        )
        .bind(&sheet_id)
        .bind(&product_line_id)
        .fetch_all(&mut *conn)
        .await?;

        let accessories = accessory_rows
            .into_iter()
            .map(internal_accessory_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        lines.push(InternalCostLine {
            product_line_id: ProductLineId(product_line_id),
            base_price: parse_decimal("base_price", row.try_get("base_price")?)?,
            component_sum: parse_decimal("component_sum", row.try_get("component_sum")?)?,
            dimensional_qty: parse_decimal("dimensional_qty", row.try_get("dimensional_qty")?)?,
            markup_pct: parse_decimal("markup_pct", row.try_get("markup_pct")?)?,
            discount_pct: parse_decimal("discount_pct", row.try_get("discount_pct")?)?,
            unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
            accessories,
            accessory_total: parse_decimal("accessory_total", row.try_get("accessory_total")?)?,
            final_price: parse_decimal("final_price", row.try_get("final_price")?)?,
        });
    }

    let submitted = match header.try_get::<Option<String>, _>("submitted_actor")? {
        Some(actor) => {
            let at_raw = header.try_get::<Option<String>, _>("submitted_at")?.ok_or_else(|| {
                RepositoryError::Decode("submitted_actor present without submitted_at".to_string())
            })?;
            Some(ResponseStamp::new(actor, parse_timestamp("submitted_at", at_raw)?))
        }
        None => None,
    };

    Ok(Some(InternalCostSheet {
        id: SheetId(sheet_id),
        work_item_id: WorkItemId(header.try_get("work_item_id")?),
        response: ResponseStamp::new(
            header.try_get::<String, _>("response_actor")?,
            parse_timestamp("response_at", header.try_get("response_at")?)?,
        ),
        submitted,
        lines,
    }))
}

/// Inserts the internal-sheet header. A second sheet for the same work item
/// trips the UNIQUE constraint; the caller maps that to `AlreadyExists`.
pub(crate) async fn insert_internal_header(
    conn: &mut SqliteConnection,
    sheet: &InternalCostSheet,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO internal_sheet (id, work_item_id, response_actor, response_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(&sheet.id.0)
    .bind(&sheet.work_item_id.0)
    .bind(&sheet.response.actor)
    .bind(sheet.response.at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn update_internal_response(
    conn: &mut SqliteConnection,
    sheet_id: &SheetId,
    response: &ResponseStamp,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE internal_sheet SET response_actor = ?, response_at = ? WHERE id = ?")
        .bind(&response.actor)
        .bind(response.at.to_rfc3339())
        .bind(&sheet_id.0)
        .execute(conn)
        .await?;
    Ok(())
}

pub(crate) async fn mark_internal_submitted(
    conn: &mut SqliteConnection,
    sheet_id: &SheetId,
    submitted: &ResponseStamp,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE internal_sheet SET submitted_actor = ?, submitted_at = ? WHERE id = ?")
        .bind(&submitted.actor)
        .bind(submitted.at.to_rfc3339())
        .bind(&sheet_id.0)
        .execute(conn)
        .await?;
    Ok(())
}

pub(crate) async fn replace_internal_lines(
    conn: &mut SqliteConnection,
    sheet_id: &SheetId,
    lines: &[InternalCostLine],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM internal_line WHERE sheet_id = ?")
        .bind(&sheet_id.0)
        .execute(&mut *conn)
        .await?;

    for line in lines {
        sqlx::query(
            "INSERT INTO internal_line (
                sheet_id, product_line_id, base_price, component_sum, dimensional_qty,
                markup_pct, discount_pct, unit_price, accessory_total, final_price
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sheet_id.0)
        .bind(&line.product_line_id.0)
        .bind(line.base_price.to_string())
        .bind(line.component_sum.to_string())
        .bind(line.dimensional_qty.to_string())
        .bind(line.markup_pct.to_string())
        .bind(line.discount_pct.to_string())
        .bind(line.unit_price.to_string())
        .bind(line.accessory_total.to_string())
        .bind(line.final_price.to_string())
        .execute(&mut *conn)
        .await?;

        for accessory in &line.accessories {
            sqlx::query(
                "INSERT INTO internal_accessory (
                    sheet_id, product_line_id, component_id, name, unit_price, quantity,
                    markup_pct, total
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&sheet_id.0)
            .bind(&line.product_line_id.0)
            .bind(&accessory.component_id.0)
            .bind(&accessory.name)
            .bind(accessory.unit_price.to_string())
            .bind(i64::from(accessory.quantity))
            .bind(accessory.markup_pct.to_string())
            .bind(accessory.total.to_string())
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

pub(crate) async fn load_contract(
    conn: &mut SqliteConnection,
    work_item_id: &WorkItemId,
) -> Result<Option<ContractCostSheet>, RepositoryError> {
    let header = sqlx::query(
        "SELECT id, work_item_id, response_actor, response_at
         FROM contract_sheet
         WHERE work_item_id = ?",
    )
    .bind(&work_item_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(header) = header else { return Ok(None) };
    let sheet_id: String = header.try_get("id")?;

    let line_rows = sqlx::query(
        "SELECT product_line_id, base_price, component_sum, finishing_interior,
                finishing_exterior, dimensional_qty, unit_price, accessory_total, discount,
                final_price
         FROM contract_line
         WHERE sheet_id = ?
         ORDER BY product_line_id ASC",
    )
    .bind(&sheet_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut lines = Vec::with_capacity(line_rows.len());
    for row in line_rows {
        let product_line_id: String = row.try_get("product_line_id")?;
        let accessory_rows = sqlx::query(
            "SELECT component_id, name, unit_price, quantity, total
             FROM contract_accessory
             WHERE sheet_id = ? AND product_line_id = ?
             ORDER BY component_id ASC",
        )
        .bind(&sheet_id)
        .bind(&product_line_id)
        .fetch_all(&mut *conn)
        .await?;

        let accessories = accessory_rows
            .into_iter()
            .map(|row| {
                Ok(ContractAccessoryLine {
                    component_id: ComponentId(row.try_get("component_id")?),
                    name: row.try_get("name")?,
                    unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
                    quantity: parse_u32("quantity", row.try_get("quantity")?)?,
                    total: parse_decimal("total", row.try_get("total")?)?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        lines.push(ContractCostLine {
            product_line_id: ProductLineId(product_line_id),
            base_price: parse_decimal("base_price", row.try_get("base_price")?)?,
            component_sum: parse_decimal("component_sum", row.try_get("component_sum")?)?,
            finishing_interior: parse_decimal(
                "finishing_interior",
                row.try_get("finishing_interior")?,
            )?,
            finishing_exterior: parse_decimal(
                "finishing_exterior",
                row.try_get("finishing_exterior")?,
            )?,
            dimensional_qty: parse_decimal("dimensional_qty", row.try_get("dimensional_qty")?)?,
            unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
            accessories,
            accessory_total: parse_decimal("accessory_total", row.try_get("accessory_total")?)?,
            discount: parse_decimal("discount", row.try_get("discount")?)?,
            final_price: parse_decimal("final_price", row.try_get("final_price")?)?,
        });
    }

    Ok(Some(ContractCostSheet {
        id: SheetId(sheet_id),
        work_item_id: WorkItemId(header.try_get("work_item_id")?),
        response: ResponseStamp::new(
            header.try_get::<String, _>("response_actor")?,
            parse_timestamp("response_at", header.try_get("response_at")?)?,
        ),
        lines,
    }))
}

/// Full replacement of the contract view. If a sheet already exists for the
/// work item, its identity is kept and only the response stamp and line set
/// change; the returned sheet carries the effective id.
pub(crate) async fn save_contract_sheet(
    conn: &mut SqliteConnection,
    mut sheet: ContractCostSheet,
) -> Result<ContractCostSheet, sqlx::Error> {
    let existing_id =
        sheet_id_for(conn, "SELECT id FROM contract_sheet WHERE work_item_id = ?", &sheet.work_item_id)
            .await?;
    if let Some(existing) = existing_id {
        sheet.id = SheetId(existing);
    }

    sqlx::query(
        "INSERT INTO contract_sheet (id, work_item_id, response_actor, response_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(work_item_id) DO UPDATE SET
            response_actor = excluded.response_actor,
            response_at = excluded.response_at",
    )
    .bind(&sheet.id.0)
    .bind(&sheet.work_item_id.0)
    .bind(&sheet.response.actor)
    .bind(sheet.response.at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM contract_line WHERE sheet_id = ?")
        .bind(&sheet.id.0)
        .execute(&mut *conn)
        .await?;

    for line in &sheet.lines {
        sqlx::query(
            "INSERT INTO contract_line (
                sheet_id, product_line_id, base_price, component_sum, finishing_interior,
                finishing_exterior, dimensional_qty, unit_price, accessory_total, discount,
                final_price
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sheet.id.0)
        .bind(&line.product_line_id.0)
        .bind(line.base_price.to_string())
        .bind(line.component_sum.to_string())
        .bind(line.finishing_interior.to_string())
        .bind(line.finishing_exterior.to_string())
        .bind(line.dimensional_qty.to_string())
        .bind(line.unit_price.to_string())
        .bind(line.accessory_total.to_string())
        .bind(line.discount.to_string())
        .bind(line.final_price.to_string())
        .execute(&mut *conn)
        .await?;

        for accessory in &line.accessories {
            sqlx::query(
                "INSERT INTO contract_accessory (
                    sheet_id, product_line_id, component_id, name, unit_price, quantity, total
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&sheet.id.0)
            .bind(&line.product_line_id.0)
            .bind(&accessory.component_id.0)
            .bind(&accessory.name)
            .bind(accessory.unit_price.to_string())
            .bind(i64::from(accessory.quantity))
            .bind(accessory.total.to_string())
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(sheet)
}

pub(crate) async fn load_vendor(
    conn: &mut SqliteConnection,
    work_item_id: &WorkItemId,
) -> Result<Option<VendorCostSheet>, RepositoryError> {
    let header = sqlx::query(
        "SELECT id, work_item_id, response_actor, response_at
         FROM vendor_sheet
         WHERE work_item_id = ?",
    )
    .bind(&work_item_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(header) = header else { return Ok(None) };
    let sheet_id: String = header.try_get("id")?;

    let line_rows = sqlx::query(
        "SELECT product_line_id, base_price, component_sum, dimensional_qty, unit_price,
                accessory_total, final_price
         FROM vendor_line
         WHERE sheet_id = ?
         ORDER BY product_line_id ASC",
    )
    .bind(&sheet_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut lines = Vec::with_capacity(line_rows.len());
    for row in line_rows {
        let product_line_id: String = row.try_get("product_line_id")?;
        let accessory_rows = sqlx::query(
            "SELECT component_id, name, unit_price, quantity, total
             FROM vendor_accessory
             WHERE sheet_id = ? AND product_line_id = ?
             ORDER BY component_id ASC",
        )
        .bind(&sheet_id)
        .bind(&product_line_id)
        .fetch_all(&mut *conn)
        .await?;

        let accessories = accessory_rows
            .into_iter()
            .map(|row| {
                Ok(VendorAccessoryLine {
                    component_id: ComponentId(row.try_get("component_id")?),
                    name: row.try_get("name")?,
                    unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
                    quantity: parse_u32("quantity", row.try_get("quantity")?)?,
                    total: parse_decimal("total", row.try_get("total")?)?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        lines.push(VendorCostLine {
            product_line_id: ProductLineId(product_line_id),
            base_price: parse_decimal("base_price", row.try_get("base_price")?)?,
            component_sum: parse_decimal("component_sum", row.try_get("component_sum")?)?,
            dimensional_qty: parse_decimal("dimensional_qty", row.try_get("dimensional_qty")?)?,
            unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
            accessories,
            accessory_total: parse_decimal("accessory_total", row.try_get("accessory_total")?)?,
            final_price: parse_decimal("final_price", row.try_get("final_price")?)?,
        });
    }

    Ok(Some(VendorCostSheet {
        id: SheetId(sheet_id),
        work_item_id: WorkItemId(header.try_get("work_item_id")?),
        response: ResponseStamp::new(
            header.try_get::<String, _>("response_actor")?,
            parse_timestamp("response_at", header.try_get("response_at")?)?,
        ),
        lines,
    }))
}

pub(crate) async fn save_vendor_sheet(
    conn: &mut SqliteConnection,
    mut sheet: VendorCostSheet,
) -> Result<VendorCostSheet, sqlx::Error> {
    let existing_id =
        sheet_id_for(conn, "SELECT id FROM vendor_sheet WHERE work_item_id = ?", &sheet.work_item_id)
            .await?;
    if let Some(existing) = existing_id {
        sheet.id = SheetId(existing);
    }

    sqlx::query(
        "INSERT INTO vendor_sheet (id, work_item_id, response_actor, response_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(work_item_id) DO UPDATE SET
            response_actor = excluded.response_actor,
            response_at = excluded.response_at",
    )
    .bind(&sheet.id.0)
    .bind(&sheet.work_item_id.0)
    .bind(&sheet.response.actor)
    .bind(sheet.response.at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM vendor_line WHERE sheet_id = ?")
        .bind(&sheet.id.0)
        .execute(&mut *conn)
        .await?;

    for line in &sheet.lines {
        sqlx::query(
            "INSERT INTO vendor_line (
                sheet_id, product_line_id, base_price, component_sum, dimensional_qty,
                unit_price, accessory_total, final_price
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sheet.id.0)
        .bind(&line.product_line_id.0)
        .bind(line.base_price.to_string())
        .bind(line.component_sum.to_string())
        .bind(line.dimensional_qty.to_string())
        .bind(line.unit_price.to_string())
        .bind(line.accessory_total.to_string())
        .bind(line.final_price.to_string())
        .execute(&mut *conn)
        .await?;

        for accessory in &line.accessories {
            sqlx::query(
                "INSERT INTO vendor_accessory (
                    sheet_id, product_line_id, component_id, name, unit_price, quantity, total
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&sheet.id.0)
            .bind(&line.product_line_id.0)
            .bind(&accessory.component_id.0)
            .bind(&accessory.name)
            .bind(accessory.unit_price.to_string())
            .bind(i64::from(accessory.quantity))
            .bind(accessory.total.to_string())
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(sheet)
}

pub(crate) async fn load_service(
    conn: &mut SqliteConnection,
    work_item_id: &WorkItemId,
) -> Result<Option<ServiceCostSheet>, RepositoryError> {
    let header = sqlx::query(
        "SELECT id, work_item_id, response_actor, response_at
         FROM service_sheet
         WHERE work_item_id = ?",
    )
    .bind(&work_item_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(header) = header else { return Ok(None) };
    let sheet_id: String = header.try_get("id")?;

    let line_rows = sqlx::query(
        "SELECT product_line_id, base_price, component_sum, dimensional_qty, unit_price,
                final_price
         FROM service_line
         WHERE sheet_id = ?
         ORDER BY product_line_id ASC",
    )
    .bind(&sheet_id)
    .fetch_all(&mut *conn)
    .await?;

    let lines = line_rows
        .into_iter()
        .map(|row| {
            Ok(ServiceCostLine {
                product_line_id: ProductLineId(row.try_get("product_line_id")?),
                base_price: parse_decimal("base_price", row.try_get("base_price")?)?,
                component_sum: parse_decimal("component_sum", row.try_get("component_sum")?)?,
                dimensional_qty: parse_decimal(
                    "dimensional_qty",
                    row.try_get("dimensional_qty")?,
                )?,
                unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
                final_price: parse_decimal("final_price", row.try_get("final_price")?)?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

    Ok(Some(ServiceCostSheet {
        id: SheetId(sheet_id),
        work_item_id: WorkItemId(header.try_get("work_item_id")?),
        response: ResponseStamp::new(
            header.try_get::<String, _>("response_actor")?,
            parse_timestamp("response_at", header.try_get("response_at")?)?,
        ),
        lines,
    }))
}

pub(crate) async fn save_service_sheet(
    conn: &mut SqliteConnection,
    mut sheet: ServiceCostSheet,
) -> Result<ServiceCostSheet, sqlx::Error> {
    let existing_id =
        sheet_id_for(conn, "SELECT id FROM service_sheet WHERE work_item_id = ?", &sheet.work_item_id)
            .await?;
    if let Some(existing) = existing_id {
        sheet.id = SheetId(existing);
    }

    sqlx::query(
        "INSERT INTO service_sheet (id, work_item_id, response_actor, response_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(work_item_id) DO UPDATE SET
            response_actor = excluded.response_actor,
            response_at = excluded.response_at",
    )
    .bind(&sheet.id.0)
    .bind(&sheet.work_item_id.0)
    .bind(&sheet.response.actor)
    .bind(sheet.response.at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM service_line WHERE sheet_id = ?")
        .bind(&sheet.id.0)
        .execute(&mut *conn)
        .await?;

    for line in &sheet.lines {
        sqlx::query(
            "INSERT INTO service_line (
                sheet_id, product_line_id, base_price, component_sum, dimensional_qty,
                unit_price, final_price
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sheet.id.0)
        .bind(&line.product_line_id.0)
        .bind(line.base_price.to_string())
        .bind(line.component_sum.to_string())
        .bind(line.dimensional_qty.to_string())
        .bind(line.unit_price.to_string())
        .bind(line.final_price.to_string())
        .execute(&mut *conn)
        .await?;
    }

    Ok(sheet)
}

async fn sheet_id_for(
    conn: &mut SqliteConnection,
    sql: &'static str,
    work_item_id: &WorkItemId,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query(sql).bind(&work_item_id.0).fetch_optional(conn).await?;
    row.map(|row| row.try_get("id")).transpose()
}

fn internal_accessory_from_row(row: SqliteRow) -> Result<AccessoryCostLine, RepositoryError> {
    Ok(AccessoryCostLine {
        component_id: ComponentId(row.try_get("component_id")?),
        name: row.try_get("name")?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        markup_pct: parse_decimal("markup_pct", row.try_get("markup_pct")?)?,
        total: parse_decimal("total", row.try_get("total")?)?,
    })
}
