//! The ordered recompute pipeline run after every edit.

use rust_decimal::Decimal;

use crate::allocation::{AllocationOutcome, allocate};
use crate::grouping::aggregate_groups;
use crate::line_item::LineItem;
use crate::numbering::renumber;

/// Numberer → group aggregator → system price allocator.
///
/// A pure, idempotent fold over the current items; running it twice gives the
/// same result as running it once.
pub fn recompute(items: &mut [LineItem], system_price: Option<Decimal>) -> AllocationOutcome {
    renumber(items);
    aggregate_groups(items);
    let outcome = allocate(items, system_price);
    tracing::debug!(items = items.len(), ?outcome, "line items recomputed");
    outcome
}
