//! The three projections of the internal sheet. Each is a pure function of
//! an immutable internal-sheet snapshot; persistence replaces the previous
//! view atomically or not at all.

use rust_decimal::Decimal;

use crate::domain::catalog::{ComponentCategory, WorkItem};
use crate::domain::cost_sheet::{
    ContractAccessoryLine, ContractCostLine, ContractCostSheet, InternalCostSheet, ResponseStamp,
    ServiceCostLine, ServiceCostSheet, SheetId, VendorAccessoryLine, VendorCostLine,
    VendorCostSheet,
};
use crate::errors::DomainError;
use crate::pricing::{margin_adjust, single_category_sum};

/// Customer-facing contract view. Margin semantics: the stored markup is
/// treated as a target gross margin, so pre-markup figures are divided by
/// `1 - m/100` rather than multiplied by `1 + m/100` as the internal sheet
/// does. Both read the same stored markup value; the divergence is the
/// specified business rule and must not be harmonized here.
pub fn derive_contract_sheet(
    internal: &InternalCostSheet,
    work_item: &WorkItem,
    id: SheetId,
    response: ResponseStamp,
) -> Result<ContractCostSheet, DomainError> {
    let mut lines = Vec::with_capacity(internal.lines.len());

    for line in &internal.lines {
        let product_line = work_item.product_line(&line.product_line_id)?;

        let base = margin_adjust(line.base_price, line.markup_pct);
        let components = margin_adjust(line.component_sum, line.markup_pct);
        let finishing_interior = margin_adjust(
            single_category_sum(&product_line.components, ComponentCategory::FinishingInterior),
            line.markup_pct,
        );
        let finishing_exterior = margin_adjust(
            single_category_sum(&product_line.components, ComponentCategory::FinishingExterior),
            line.markup_pct,
        );

        let unit_price = (base + components) * line.dimensional_qty;

        let mut accessories = Vec::with_capacity(line.accessories.len());
        let mut accessory_total = Decimal::ZERO;
        for accessory in &line.accessories {
            let adjusted_unit = margin_adjust(accessory.unit_price, accessory.markup_pct);
            let total = adjusted_unit * Decimal::from(accessory.quantity);
            accessory_total += total;
            accessories.push(ContractAccessoryLine {
                component_id: accessory.component_id.clone(),
                name: accessory.name.clone(),
                unit_price: adjusted_unit,
                quantity: accessory.quantity,
                total,
            });
        }

        let discount =
            (unit_price + accessory_total) * line.discount_pct / Decimal::ONE_HUNDRED;

        lines.push(ContractCostLine {
            product_line_id: line.product_line_id.clone(),
            base_price: base,
            component_sum: components,
            finishing_interior,
            finishing_exterior,
            dimensional_qty: line.dimensional_qty,
            unit_price,
            accessories,
            accessory_total,
            discount,
            final_price: unit_price + accessory_total - discount,
        });
    }

    Ok(ContractCostSheet { id, work_item_id: internal.work_item_id.clone(), response, lines })
}

/// Procurement view: everything at original cost, accessories included
/// without any markup.
pub fn derive_vendor_sheet(
    internal: &InternalCostSheet,
    id: SheetId,
    response: ResponseStamp,
) -> VendorCostSheet {
    let lines = internal
        .lines
        .iter()
        .map(|line| {
            let unit_price = (line.base_price + line.component_sum) * line.dimensional_qty;
            let accessories: Vec<VendorAccessoryLine> = line
                .accessories
                .iter()
                .map(|accessory| VendorAccessoryLine {
                    component_id: accessory.component_id.clone(),
                    name: accessory.name.clone(),
                    unit_price: accessory.unit_price,
                    quantity: accessory.quantity,
                    total: accessory.unit_price * Decimal::from(accessory.quantity),
                })
                .collect();
            let accessory_total = accessories.iter().map(|accessory| accessory.total).sum();

            VendorCostLine {
                product_line_id: line.product_line_id.clone(),
                base_price: line.base_price,
                component_sum: line.component_sum,
                dimensional_qty: line.dimensional_qty,
                unit_price,
                accessories,
                accessory_total,
                final_price: unit_price + accessory_total,
            }
        })
        .collect();

    VendorCostSheet { id, work_item_id: internal.work_item_id.clone(), response, lines }
}

/// Labor-only view: the vendor formula without any accessory lines. The
/// component sum already excludes accessory components.
pub fn derive_service_sheet(
    internal: &InternalCostSheet,
    id: SheetId,
    response: ResponseStamp,
) -> ServiceCostSheet {
    let lines = internal
        .lines
        .iter()
        .map(|line| {
            let unit_price = (line.base_price + line.component_sum) * line.dimensional_qty;
            ServiceCostLine {
                product_line_id: line.product_line_id.clone(),
                base_price: line.base_price,
                component_sum: line.component_sum,
                dimensional_qty: line.dimensional_qty,
                unit_price,
                final_price: unit_price,
            }
        })
        .collect();

    ServiceCostSheet { id, work_item_id: internal.work_item_id.clone(), response, lines }
}
