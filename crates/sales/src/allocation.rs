//! Distribution of a document's fixed system price across flagged items.
//!
//! Every top-level item or group with `uses_system_price` is a candidate.
//! Each candidate receives `system_price × own_cost / total_cost`. The whole
//! allocation is recomputed from scratch on every pass.

use rust_decimal::Decimal;

use orderflow_core::round_money;

use crate::line_item::{LineItem, LineKind};

/// What an allocation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationOutcome {
    /// The document has no system price; candidates keep their own prices.
    NoSystemPrice,
    /// No item is flagged.
    NoCandidates,
    /// Candidates exist but their total cost is zero; all received zero.
    Degenerate { candidates: usize },
    Allocated { candidates: usize },
}

/// Split `amount` proportionally to `weights`, unrounded.
///
/// Returns `None` when the weights sum to zero.
pub fn distribute(amount: Decimal, weights: &[Decimal]) -> Option<Vec<Decimal>> {
    let total: Decimal = weights.iter().sum();
    if total.is_zero() {
        return None;
    }
    Some(weights.iter().map(|weight| amount * *weight / total).collect())
}

/// Purchase cost that weighs a candidate's share.
pub fn candidate_cost(item: &LineItem) -> Decimal {
    match &item.kind {
        LineKind::Standalone { article, .. } => article.purchase_cost(),
        LineKind::GroupHeader(header) => header.purchase_cost_sum,
        LineKind::GroupMember { .. } => Decimal::ZERO,
    }
}

/// Allocate `system_price` over all flagged top-level items.
///
/// Group headers must already carry their member sums (see
/// [`crate::grouping::aggregate_groups`]). Standalone candidates get their
/// unit price back-derived as `allocated / quantity`.
pub fn allocate(items: &mut [LineItem], system_price: Option<Decimal>) -> AllocationOutcome {
    for item in items.iter_mut() {
        match &mut item.kind {
            LineKind::Standalone {
                allocated_price, ..
            } => *allocated_price = None,
            LineKind::GroupHeader(header) => header.allocated_price = None,
            LineKind::GroupMember { .. } => {}
        }
    }

    let Some(system_price) = system_price else {
        return AllocationOutcome::NoSystemPrice;
    };

    let candidates: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.is_top_level() && item.uses_system_price())
        .map(|(index, _)| index)
        .collect();
    if candidates.is_empty() {
        return AllocationOutcome::NoCandidates;
    }

    let costs: Vec<Decimal> = candidates.iter().map(|&i| candidate_cost(&items[i])).collect();
    let (shares, outcome) = match distribute(system_price, &costs) {
        Some(shares) => (
            shares,
            AllocationOutcome::Allocated {
                candidates: candidates.len(),
            },
        ),
        None => {
            tracing::debug!(
                candidates = candidates.len(),
                %system_price,
                "system price candidates have zero total cost; allocating zero"
            );
            (
                vec![Decimal::ZERO; candidates.len()],
                AllocationOutcome::Degenerate {
                    candidates: candidates.len(),
                },
            )
        }
    };

    for (&index, share) in candidates.iter().zip(shares) {
        assign(&mut items[index], share);
    }
    outcome
}

fn assign(item: &mut LineItem, share: Decimal) {
    match &mut item.kind {
        LineKind::Standalone {
            article,
            allocated_price,
            ..
        } => {
            *allocated_price = Some(round_money(share));
            if article.quantity > Decimal::ZERO {
                article.unit_price = round_money(share / article.quantity);
            }
        }
        LineKind::GroupHeader(header) => header.allocated_price = Some(round_money(share)),
        LineKind::GroupMember { .. } => {}
    }
}
