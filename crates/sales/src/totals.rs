//! Document-level sums.
//!
//! Only top-level items are folded; members are represented by their header.

use std::cmp::Reverse;
use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use orderflow_core::{GroupId, LineItemId, percent_of, ratio_percent, round_money};

use crate::allocation::distribute;
use crate::line_item::{LineItem, LineKind};
use crate::pricing::LinePricing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub net_total: Decimal,
    pub purchase_cost_total: Decimal,
    pub delivery_cost: Decimal,
    pub net_with_delivery: Decimal,
    pub tax: Decimal,
    pub gross_total: Decimal,
    pub margin_total: Decimal,
    pub margin_percent_total: Decimal,
}

/// Pricing of a line as it counts towards the document.
///
/// - system-price standalone item: its allocated amount;
/// - other standalone items: quantity × discounted unit price;
/// - group headers: the effective sale price against the members' cost;
/// - members: their own article pricing (shown, never summed).
pub fn effective_pricing(item: &LineItem) -> LinePricing {
    match &item.kind {
        LineKind::Standalone {
            article,
            uses_system_price: true,
            allocated_price: Some(allocated),
        } => LinePricing::from_subtotal(*allocated, article.purchase_cost(), article.tax_rate),
        LineKind::Standalone { article, .. } | LineKind::GroupMember { article, .. } => {
            article.pricing()
        }
        LineKind::GroupHeader(header) => LinePricing::from_subtotal(
            header.effective_sale_price(),
            header.purchase_cost_sum,
            header.tax_rate,
        ),
    }
}

/// Fold top-level items into document totals.
///
/// `tax_rate` applies to the net total including delivery cost; with
/// `tax_enabled == false` no tax is charged.
pub fn summarize(
    items: &[LineItem],
    tax_rate: Decimal,
    tax_enabled: bool,
    delivery_cost: Decimal,
) -> DocumentTotals {
    let (net_total, purchase_cost_total) = items
        .iter()
        .filter(|item| item.is_top_level())
        .map(effective_pricing)
        .fold((Decimal::ZERO, Decimal::ZERO), |(net, cost), p| {
            (net + p.subtotal, cost + p.purchase_cost)
        });

    let net_with_delivery = net_total + delivery_cost;
    let tax = if tax_enabled {
        round_money(percent_of(net_with_delivery, tax_rate))
    } else {
        Decimal::ZERO
    };
    let margin_total = net_total - purchase_cost_total;

    DocumentTotals {
        net_total: round_money(net_total),
        purchase_cost_total: round_money(purchase_cost_total),
        delivery_cost: round_money(delivery_cost),
        net_with_delivery: round_money(net_with_delivery),
        tax,
        gross_total: round_money(net_with_delivery + tax),
        margin_total: round_money(margin_total),
        margin_percent_total: ratio_percent(margin_total, net_total),
    }
}

/// Net value of every fulfillable (non-header) item, rounded.
///
/// Members split their group's effective price in proportion to their list
/// value, or evenly when the group has no list value. The rounded shares add
/// up to the group's rounded price. A member without a header is valued at
/// its own subtotal.
pub fn fulfillable_values(items: &[LineItem]) -> HashMap<LineItemId, Decimal> {
    let group_prices: HashMap<GroupId, Decimal> = items
        .iter()
        .filter_map(LineItem::header)
        .map(|header| (header.group_id, header.effective_sale_price()))
        .collect();

    let mut members: HashMap<GroupId, Vec<(LineItemId, Decimal)>> = HashMap::new();
    let mut values = HashMap::new();

    for item in items {
        match &item.kind {
            LineKind::Standalone { .. } => {
                values.insert(item.id, effective_pricing(item).subtotal);
            }
            LineKind::GroupMember { group_id, article } if group_prices.contains_key(group_id) => {
                members
                    .entry(*group_id)
                    .or_default()
                    .push((item.id, article.list_value()));
            }
            LineKind::GroupMember { article, .. } => {
                values.insert(item.id, article.pricing().subtotal);
            }
            LineKind::GroupHeader(_) => {}
        }
    }

    for (group_id, group_members) in members {
        let price = group_prices[&group_id];
        let weights: Vec<Decimal> = group_members.iter().map(|(_, weight)| *weight).collect();
        let shares = distribute(price, &weights).unwrap_or_else(|| {
            let even = price / Decimal::from(group_members.len());
            vec![even; group_members.len()]
        });
        for ((id, _), share) in group_members.iter().zip(round_shares(&shares, round_money(price))) {
            values.insert(*id, share);
        }
    }
    values
}

/// Round shares to cents so they sum to `target`: every share is cut to
/// whole cents, then the missing cents go to the largest remainders.
fn round_shares(shares: &[Decimal], target: Decimal) -> Vec<Decimal> {
    let cent = Decimal::new(1, 2);
    let mut rounded: Vec<Decimal> = shares
        .iter()
        .map(|share| share.round_dp_with_strategy(2, RoundingStrategy::ToZero))
        .collect();

    let mut by_remainder: Vec<usize> = (0..shares.len()).collect();
    by_remainder.sort_by_key(|&index| Reverse(shares[index] - rounded[index]));

    let mut residue = target - rounded.iter().copied().sum::<Decimal>();
    for index in by_remainder {
        if residue < cent {
            break;
        }
        rounded[index] += cent;
        residue -= cent;
    }
    rounded
}
