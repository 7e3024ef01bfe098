use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItemId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductLineId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub String);

/// Closed set of component kinds. Resolved once at the catalog boundary;
/// the pricing code never matches on free-form category labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    RawMaterial,
    FinishingInterior,
    FinishingExterior,
    Accessory,
    Other,
}

impl ComponentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawMaterial => "raw_material",
            Self::FinishingInterior => "finishing_interior",
            Self::FinishingExterior => "finishing_exterior",
            Self::Accessory => "accessory",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "raw_material" => Some(Self::RawMaterial),
            "finishing_interior" => Some(Self::FinishingInterior),
            "finishing_exterior" => Some(Self::FinishingExterior),
            "accessory" => Some(Self::Accessory),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// A catalog-priced sub-part of a product line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub category: ComponentCategory,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// One priced item within a work item: quantity, three optional linear
/// dimensions, a base unit price, and its categorized components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    pub id: ProductLineId,
    pub name: String,
    pub room: Option<String>,
    pub quantity: u32,
    pub length: Option<Decimal>,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub base_price: Decimal,
    pub components: Vec<Component>,
}

impl ProductLine {
    pub fn component(&self, id: &ComponentId) -> Option<&Component> {
        self.components.iter().find(|component| &component.id == id)
    }
}

/// Read-only snapshot of a work item's catalogued product lines, plus the
/// externally-managed completion-certificate state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub project_name: String,
    pub product_lines: Vec<ProductLine>,
    pub certificate_issued: bool,
    pub certificate_photo: Option<String>,
}

impl WorkItem {
    pub fn product_line(&self, id: &ProductLineId) -> Result<&ProductLine, DomainError> {
        self.product_lines
            .iter()
            .find(|line| &line.id == id)
            .ok_or_else(|| DomainError::NotFound { entity: "product line", id: id.0.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::ComponentCategory;

    #[test]
    fn category_parse_is_case_insensitive_and_closed() {
        assert_eq!(ComponentCategory::parse("Accessory"), Some(ComponentCategory::Accessory));
        assert_eq!(
            ComponentCategory::parse(" finishing_interior "),
            Some(ComponentCategory::FinishingInterior)
        );
        assert_eq!(ComponentCategory::parse("upholstery"), None);
    }

    #[test]
    fn category_round_trips_through_as_str() {
        for category in [
            ComponentCategory::RawMaterial,
            ComponentCategory::FinishingInterior,
            ComponentCategory::FinishingExterior,
            ComponentCategory::Accessory,
            ComponentCategory::Other,
        ] {
            assert_eq!(ComponentCategory::parse(category.as_str()), Some(category));
        }
    }
}
