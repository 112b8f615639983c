//! Group header values derived from their members.

use std::collections::HashMap;

use rust_decimal::Decimal;

use orderflow_core::{GroupId, round_money};

use crate::line_item::{LineItem, LineKind};

/// Sums over the members of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupValues {
    /// Σ quantity × unit_price × (1 − discount/100)
    pub list_price_sum: Decimal,
    /// Σ quantity × purchase_price
    pub purchase_cost_sum: Decimal,
}

/// Member sums for every group that has at least one member.
pub fn group_values(items: &[LineItem]) -> HashMap<GroupId, GroupValues> {
    let mut values: HashMap<GroupId, GroupValues> = HashMap::new();
    for item in items {
        if let LineKind::GroupMember { group_id, article } = &item.kind {
            let entry = values.entry(*group_id).or_default();
            entry.list_price_sum += article.list_value();
            entry.purchase_cost_sum += article.purchase_cost();
        }
    }
    values
}

/// Store each group's member sums on its header.
///
/// `list_price_sum` is the default sale price suggestion; `purchase_cost_sum`
/// stands in for the header's purchase price in margin figures.
pub fn aggregate_groups(items: &mut [LineItem]) {
    let values = group_values(items);
    for header in items.iter_mut().filter_map(LineItem::header_mut) {
        let sums = values.get(&header.group_id).copied().unwrap_or_default();
        header.list_price_sum = round_money(sums.list_price_sum);
        header.purchase_cost_sum = round_money(sums.purchase_cost_sum);
    }
}
