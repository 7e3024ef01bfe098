//! Pure pricing arithmetic. Everything in here is a total function over
//! `Decimal` inputs; persistence and rounding policy live elsewhere.

pub mod internal;
pub mod views;

use rust_decimal::Decimal;

use crate::domain::catalog::{Component, ComponentCategory};

/// Volume-style quantity of a product line: `length * width * height * qty`
/// when all three dimensions are present, else zero. No rounding here.
pub fn dimensional_quantity(
    length: Option<Decimal>,
    width: Option<Decimal>,
    height: Option<Decimal>,
    quantity: u32,
) -> Decimal {
    match (length, width, height) {
        (Some(length), Some(width), Some(height)) => {
            length * width * height * Decimal::from(quantity)
        }
        _ => Decimal::ZERO,
    }
}

/// Sum of `unit_price * quantity` over components whose category is not in
/// `excluded`.
pub fn category_sum(components: &[Component], excluded: &[ComponentCategory]) -> Decimal {
    components
        .iter()
        .filter(|component| !excluded.contains(&component.category))
        .map(|component| component.unit_price * Decimal::from(component.quantity))
        .sum()
}

/// Sum of `unit_price * quantity` over components of exactly one category.
pub fn single_category_sum(components: &[Component], category: ComponentCategory) -> Decimal {
    components
        .iter()
        .filter(|component| component.category == category)
        .map(|component| component.unit_price * Decimal::from(component.quantity))
        .sum()
}

/// Margin-based price adjustment used by the contract view: treat `markup`
/// as a target gross margin and divide by `1 - markup/100`.
///
/// When the divider is zero or negative (markup >= 100%) the division is
/// skipped and the original value passes through unchanged. That
/// discontinuity is intentional business behavior, kept as an explicit
/// branch so it stays visible and testable.
pub fn margin_adjust(value: Decimal, markup_pct: Decimal) -> Decimal {
    let divider = Decimal::ONE - markup_pct / Decimal::ONE_HUNDRED;
    if divider > Decimal::ZERO {
        value / divider
    } else {
        value
    }
}

/// Cost-plus multiplier used by the internal view: `value * (1 + markup/100)`.
pub fn markup_apply(value: Decimal, markup_pct: Decimal) -> Decimal {
    value * (Decimal::ONE + markup_pct / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::domain::catalog::{Component, ComponentCategory, ComponentId};

    use super::{category_sum, dimensional_quantity, margin_adjust, markup_apply};

    fn component(id: &str, category: ComponentCategory, price: Decimal, qty: u32) -> Component {
        Component {
            id: ComponentId(id.to_string()),
            name: id.to_string(),
            category,
            unit_price: price,
            quantity: qty,
        }
    }

    #[test]
    fn dimensional_quantity_requires_all_three_dimensions() {
        assert_eq!(
            dimensional_quantity(Some(dec!(2)), Some(dec!(3)), Some(dec!(0.5)), 4),
            dec!(12)
        );
        assert_eq!(dimensional_quantity(Some(dec!(2)), None, Some(dec!(0.5)), 4), Decimal::ZERO);
        assert_eq!(dimensional_quantity(None, None, None, 4), Decimal::ZERO);
    }

    #[test]
    fn category_sum_skips_excluded_categories() {
        let components = vec![
            component("c1", ComponentCategory::RawMaterial, dec!(100), 2),
            component("c2", ComponentCategory::FinishingInterior, dec!(50), 1),
            component("c3", ComponentCategory::Accessory, dec!(999), 3),
        ];

        assert_eq!(category_sum(&components, &[ComponentCategory::Accessory]), dec!(250));
        assert_eq!(category_sum(&components, &[]), dec!(3247));
    }

    #[test]
    fn margin_adjust_divides_below_one_hundred_percent() {
        assert_eq!(margin_adjust(dec!(80), dec!(20)), dec!(100));
        assert_eq!(margin_adjust(dec!(100), dec!(0)), dec!(100));
    }

    #[test]
    fn margin_adjust_passes_through_at_or_above_one_hundred_percent() {
        assert_eq!(margin_adjust(dec!(80), dec!(100)), dec!(80));
        assert_eq!(margin_adjust(dec!(80), dec!(150)), dec!(80));
    }

    #[test]
    fn markup_apply_is_cost_plus() {
        assert_eq!(markup_apply(dec!(100), dec!(20)), dec!(120.00));
        assert_eq!(markup_apply(dec!(100), dec!(0)), dec!(100.00));
    }
}
