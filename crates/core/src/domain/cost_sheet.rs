use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{ComponentId, ProductLineId, WorkItemId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetId(pub String);

/// Actor + time stamp recorded whenever a sheet is generated or rebuilt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStamp {
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl ResponseStamp {
    pub fn new(actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { actor: actor.into(), at }
    }
}

/// An accessory picked into a cost line, priced with its own markup.
/// `unit_price` stays the original catalog price; only `total` embeds markup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessoryCostLine {
    pub component_id: ComponentId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub markup_pct: Decimal,
    pub total: Decimal,
}

/// One line of the internal (cost-plus) sheet.
///
/// Invariant: `base_price` and `component_sum` are stored pre-markup; the
/// markup shows up only in `unit_price`, accessory totals, and `final_price`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InternalCostLine {
    pub product_line_id: ProductLineId,
    pub base_price: Decimal,
    pub component_sum: Decimal,
    pub dimensional_qty: Decimal,
    pub markup_pct: Decimal,
    pub discount_pct: Decimal,
    pub unit_price: Decimal,
    pub accessories: Vec<AccessoryCostLine>,
    pub accessory_total: Decimal,
    pub final_price: Decimal,
}

/// The single source sheet all other valuation views derive from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InternalCostSheet {
    pub id: SheetId,
    pub work_item_id: WorkItemId,
    pub response: ResponseStamp,
    pub submitted: Option<ResponseStamp>,
    pub lines: Vec<InternalCostLine>,
}

impl InternalCostSheet {
    pub fn is_submitted(&self) -> bool {
        self.submitted.is_some()
    }

    pub fn line(&self, product_line_id: &ProductLineId) -> Option<&InternalCostLine> {
        self.lines.iter().find(|line| &line.product_line_id == product_line_id)
    }
}

/// Accessory as carried on the customer-facing contract sheet: the unit
/// price already embeds the margin division, no further markup field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractAccessoryLine {
    pub component_id: ComponentId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractCostLine {
    pub product_line_id: ProductLineId,
    pub base_price: Decimal,
    pub component_sum: Decimal,
    pub finishing_interior: Decimal,
    pub finishing_exterior: Decimal,
    pub dimensional_qty: Decimal,
    pub unit_price: Decimal,
    pub accessories: Vec<ContractAccessoryLine>,
    pub accessory_total: Decimal,
    pub discount: Decimal,
    pub final_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractCostSheet {
    pub id: SheetId,
    pub work_item_id: WorkItemId,
    pub response: ResponseStamp,
    pub lines: Vec<ContractCostLine>,
}

impl ContractCostSheet {
    /// Sum of the per-line final prices; the default contract price when no
    /// override is supplied at finalization.
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(|line| line.final_price).sum()
    }
}

/// Accessory at original cost for procurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VendorAccessoryLine {
    pub component_id: ComponentId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VendorCostLine {
    pub product_line_id: ProductLineId,
    pub base_price: Decimal,
    pub component_sum: Decimal,
    pub dimensional_qty: Decimal,
    pub unit_price: Decimal,
    pub accessories: Vec<VendorAccessoryLine>,
    pub accessory_total: Decimal,
    pub final_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VendorCostSheet {
    pub id: SheetId,
    pub work_item_id: WorkItemId,
    pub response: ResponseStamp,
    pub lines: Vec<VendorCostLine>,
}

/// Labor-only line: same at-cost formula as the vendor view, accessories
/// excluded entirely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceCostLine {
    pub product_line_id: ProductLineId,
    pub base_price: Decimal,
    pub component_sum: Decimal,
    pub dimensional_qty: Decimal,
    pub unit_price: Decimal,
    pub final_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceCostSheet {
    pub id: SheetId,
    pub work_item_id: WorkItemId,
    pub response: ResponseStamp,
    pub lines: Vec<ServiceCostLine>,
}
