//! Sales documents: line items, pricing, groups, system price allocation,
//! totals, fulfillment tracking and the quotation/order lifecycles.
//!
//! Pure, deterministic domain logic (no IO, no storage). Every edit of a
//! [`Document`] runs the recompute pipeline so derived fields are never stale.

pub mod allocation;
pub mod document;
pub mod fulfillment;
pub mod grouping;
pub mod lifecycle;
pub mod line_item;
pub mod numbering;
pub mod pricing;
pub mod recalc;
pub mod totals;

pub use allocation::AllocationOutcome;
pub use document::{Document, DocumentCommand, DocumentEvent};
pub use fulfillment::FulfillmentKind;
pub use lifecycle::{DocumentKind, DocumentStatus, OrderStatus, QuotationStatus};
pub use line_item::{Article, ArticlePatch, Fulfillment, GroupHeader, LineItem, LineKind, NewLine};
pub use numbering::Direction;
pub use pricing::{LinePricing, price_line};
pub use recalc::recompute;
pub use totals::DocumentTotals;
