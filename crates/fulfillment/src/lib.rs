//! Delivery notes and invoices created from customer orders.
//!
//! Creation is a pure operation over a [`orderflow_sales::Document`]: it checks
//! the lifecycle gate and that every selected item is still open, then marks
//! the items and builds the record, all or nothing. Making that step atomic
//! against concurrent callers is the job of a [`DocumentStore`].

pub mod delivery_note;
pub mod invoice;
pub mod store;

pub use delivery_note::{DeliveryLine, DeliveryNote, DeliveryRequest, create_delivery_note};
pub use invoice::{
    Invoice, InvoiceCommand, InvoiceEvent, InvoiceLine, InvoiceRequest, InvoiceStatus,
    create_invoice, void_invoice,
};
pub use store::{DocumentStore, IssuedNumber, NumberKind, NumberSequence};
