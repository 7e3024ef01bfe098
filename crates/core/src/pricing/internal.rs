use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{ComponentCategory, ComponentId, ProductLineId, WorkItem};
use crate::domain::cost_sheet::{AccessoryCostLine, InternalCostLine};
use crate::errors::DomainError;
use crate::pricing::{category_sum, dimensional_quantity, markup_apply};

/// Operator input for one product line of the internal sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_line_id: ProductLineId,
    pub markup_pct: Decimal,
    pub discount_pct: Decimal,
    pub accessories: Vec<AccessoryInput>,
}

/// One selected accessory: quantity plus its own independent markup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessoryInput {
    pub component_id: ComponentId,
    pub quantity: u32,
    pub markup_pct: Decimal,
}

/// Builds the full internal line set from the catalog snapshot and operator
/// input. Pure; callers persist the result atomically so a stale accessory
/// reference leaves no line behind.
pub fn build_internal_lines(
    work_item: &WorkItem,
    inputs: &[LineInput],
) -> Result<Vec<InternalCostLine>, DomainError> {
    inputs.iter().map(|input| build_internal_line(work_item, input)).collect()
}

fn build_internal_line(
    work_item: &WorkItem,
    input: &LineInput,
) -> Result<InternalCostLine, DomainError> {
    validate_percentage("markup_pct", input.markup_pct)?;
    validate_percentage("discount_pct", input.discount_pct)?;

    let product_line = work_item.product_line(&input.product_line_id)?;

    let component_sum =
        category_sum(&product_line.components, &[ComponentCategory::Accessory]);
    let dimensional_qty = dimensional_quantity(
        product_line.length,
        product_line.width,
        product_line.height,
        product_line.quantity,
    );

    let unit_price = markup_apply(product_line.base_price + component_sum, input.markup_pct)
        * dimensional_qty;

    let mut accessories = Vec::with_capacity(input.accessories.len());
    let mut accessory_total = Decimal::ZERO;
    for accessory in &input.accessories {
        validate_percentage("accessory markup_pct", accessory.markup_pct)?;
        if accessory.quantity == 0 {
            return Err(DomainError::ValidationError {
                field: "accessory quantity",
                reason: "must be at least 1".to_string(),
            });
        }

        let component = product_line.component(&accessory.component_id).ok_or_else(|| {
            DomainError::NotFound { entity: "accessory component", id: accessory.component_id.0.clone() }
        })?;
        if component.category != ComponentCategory::Accessory {
            return Err(DomainError::ValidationError {
                field: "accessory component",
                reason: format!(
                    "component `{}` has category {}, expected accessory",
                    component.id.0,
                    component.category.as_str()
                ),
            });
        }

        let total = markup_apply(
            component.unit_price * Decimal::from(accessory.quantity),
            accessory.markup_pct,
        );
        accessory_total += total;
        accessories.push(AccessoryCostLine {
            component_id: component.id.clone(),
            name: component.name.clone(),
            unit_price: component.unit_price,
            quantity: accessory.quantity,
            markup_pct: accessory.markup_pct,
            total,
        });
    }

    Ok(InternalCostLine {
        product_line_id: input.product_line_id.clone(),
        base_price: product_line.base_price,
        component_sum,
        dimensional_qty,
        markup_pct: input.markup_pct,
        discount_pct: input.discount_pct,
        unit_price,
        accessories,
        accessory_total,
        final_price: unit_price + accessory_total,
    })
}

fn validate_percentage(field: &'static str, value: Decimal) -> Result<(), DomainError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(DomainError::ValidationError {
            field,
            reason: format!("`{value}` is outside 0..=100"),
        });
    }
    Ok(())
}
