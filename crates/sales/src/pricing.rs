//! Per-line price, tax and margin.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderflow_core::{percent_of, ratio_percent, round_money};

/// Derived money figures for one line, rounded to 2 places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricing {
    pub price_after_discount: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub purchase_cost: Decimal,
    pub margin: Decimal,
    /// Margin as a percent of revenue (subtotal); zero when the subtotal is not positive.
    pub margin_percent: Decimal,
}

impl LinePricing {
    /// Figures for a line whose subtotal is fixed rather than computed from a
    /// unit price (group headers, system-price allocations).
    pub fn from_subtotal(subtotal: Decimal, purchase_cost: Decimal, tax_rate: Decimal) -> Self {
        let margin = subtotal - purchase_cost;
        Self {
            price_after_discount: round_money(subtotal),
            subtotal: round_money(subtotal),
            tax: round_money(percent_of(subtotal, tax_rate)),
            purchase_cost: round_money(purchase_cost),
            margin: round_money(margin),
            margin_percent: ratio_percent(margin, subtotal),
        }
    }
}

/// Price one line.
///
/// ```text
/// price_after_discount = unit_price × (1 − discount/100)
/// subtotal             = quantity × price_after_discount
/// tax                  = subtotal × tax_rate/100
/// purchase_cost        = quantity × purchase_price
/// margin               = subtotal − purchase_cost
/// margin_percent       = margin / subtotal × 100   (0 if subtotal ≤ 0)
/// ```
pub fn price_line(
    quantity: Decimal,
    unit_price: Decimal,
    discount_percent: Decimal,
    tax_rate: Decimal,
    purchase_price: Decimal,
) -> LinePricing {
    let price_after_discount = unit_price - percent_of(unit_price, discount_percent);
    let subtotal = quantity * price_after_discount;
    let purchase_cost = quantity * purchase_price;
    let margin = subtotal - purchase_cost;

    LinePricing {
        price_after_discount: round_money(price_after_discount),
        subtotal: round_money(subtotal),
        tax: round_money(percent_of(subtotal, tax_rate)),
        purchase_cost: round_money(purchase_cost),
        margin: round_money(margin),
        margin_percent: ratio_percent(margin, subtotal),
    }
}
