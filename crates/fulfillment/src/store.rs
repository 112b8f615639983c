//! Collaborator contracts: document persistence and number issuing.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use orderflow_core::{DocumentId, DomainResult, ExpectedVersion, InvoiceId, NumberPrefixes};
use orderflow_sales::Document;

use crate::delivery_note::{DeliveryNote, DeliveryRequest};
use crate::invoice::{Invoice, InvoiceRequest};

/// Which number series a number is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberKind {
    Quotation,
    Order,
    DeliveryNote,
    Invoice,
}

impl NumberKind {
    pub fn prefix<'a>(&self, prefixes: &'a NumberPrefixes) -> &'a str {
        match self {
            NumberKind::Quotation => &prefixes.quotation,
            NumberKind::Order => &prefixes.order,
            NumberKind::DeliveryNote => &prefixes.delivery_note,
            NumberKind::Invoice => &prefixes.invoice,
        }
    }
}

/// A number handed out by a [`NumberSequence`].
///
/// `sequence` is what line items record; `number` is the printed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedNumber {
    pub sequence: u32,
    pub number: String,
}

/// Issues order, quotation, delivery note and invoice numbers.
///
/// Numbers of one kind are strictly increasing and never reused.
pub trait NumberSequence: Send + Sync {
    fn next(&self, kind: NumberKind) -> DomainResult<IssuedNumber>;
}

/// Persistence of documents and of the records created from them.
///
/// `create_delivery_note` and `create_invoice` must run the open check and the
/// marking of items as one atomic step: of two concurrent calls selecting the
/// same open item, at most one succeeds and the other fails with
/// [`orderflow_core::DomainError::FulfillmentConflict`].
pub trait DocumentStore: Send + Sync {
    fn load(&self, id: DocumentId) -> DomainResult<Document>;

    /// Store a document, returning what was stored.
    fn save(&self, document: &Document, expected: ExpectedVersion) -> DomainResult<Document>;

    fn create_delivery_note(
        &self,
        document_id: DocumentId,
        request: &DeliveryRequest,
    ) -> DomainResult<DeliveryNote>;

    fn create_invoice(
        &self,
        document_id: DocumentId,
        request: &InvoiceRequest,
    ) -> DomainResult<Invoice>;

    fn load_invoice(&self, id: InvoiceId) -> DomainResult<Invoice>;

    fn register_payment(
        &self,
        id: InvoiceId,
        amount: Decimal,
        paid_on: NaiveDate,
    ) -> DomainResult<Invoice>;

    /// Void an unpaid invoice and reopen its items for billing, atomically.
    fn void_invoice(&self, id: InvoiceId, reason: Option<String>) -> DomainResult<Invoice>;
}
