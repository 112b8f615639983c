use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use orderflow_core::{
    Aggregate, AggregateRoot, DeliveryNoteId, DocumentId, DomainError, DomainResult,
    EngineSettings, ExpectedVersion, InvoiceId,
};
use orderflow_fulfillment::{
    DeliveryNote, DeliveryRequest, DocumentStore, Invoice, InvoiceCommand, InvoiceRequest,
    NumberKind, NumberSequence, create_delivery_note, create_invoice, void_invoice,
};
use orderflow_sales::{Document, FulfillmentKind};

#[derive(Debug, Default)]
struct State {
    documents: HashMap<DocumentId, Document>,
    delivery_notes: HashMap<DeliveryNoteId, DeliveryNote>,
    invoices: HashMap<InvoiceId, Invoice>,
}

/// In-memory document store.
///
/// Every mutating call holds the write lock from load to store, so the open
/// check and the marking of items cannot interleave with another caller.
/// Intended for tests/dev.
#[derive(Debug)]
pub struct InMemoryDocumentStore<N> {
    state: RwLock<State>,
    numbers: N,
    payment_terms_days: u32,
}

impl<N: NumberSequence> InMemoryDocumentStore<N> {
    pub fn new(numbers: N, settings: &EngineSettings) -> Self {
        Self {
            state: RwLock::new(State::default()),
            numbers,
            payment_terms_days: settings.payment_terms_days,
        }
    }

    pub fn numbers(&self) -> &N {
        &self.numbers
    }

    /// Delivery notes of a document, in sequence order.
    pub fn delivery_notes(&self, document_id: DocumentId) -> DomainResult<Vec<DeliveryNote>> {
        let state = self.read()?;
        let mut notes: Vec<DeliveryNote> = state
            .delivery_notes
            .values()
            .filter(|note| note.document_id == document_id)
            .cloned()
            .collect();
        notes.sort_by_key(|note| note.sequence);
        Ok(notes)
    }

    /// Invoices of a document, in sequence order.
    pub fn invoices(&self, document_id: DocumentId) -> DomainResult<Vec<Invoice>> {
        let state = self.read()?;
        let mut invoices: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|invoice| invoice.document_id() == document_id)
            .cloned()
            .collect();
        invoices.sort_by_key(Invoice::sequence);
        Ok(invoices)
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| DomainError::invariant("document store lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| DomainError::invariant("document store lock poisoned"))
    }

    fn update_invoice(&self, id: InvoiceId, command: &InvoiceCommand) -> DomainResult<Invoice> {
        let mut state = self.write()?;
        let invoice = state
            .invoices
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("invoice {id}")))?;
        let updated = invoice.execute(command)?;
        state.invoices.insert(id, updated.clone());
        Ok(updated)
    }
}

impl<N: NumberSequence> DocumentStore for InMemoryDocumentStore<N> {
    fn load(&self, id: DocumentId) -> DomainResult<Document> {
        self.read()?
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("document {id}")))
    }

    fn save(&self, document: &Document, expected: ExpectedVersion) -> DomainResult<Document> {
        for item in document.items() {
            if let Some(article) = item.article() {
                article.validate()?;
            }
        }

        let mut state = self.write()?;
        let current = state.documents.get(document.id());
        let current_version = current.map_or(0, AggregateRoot::version);
        expected.check(current_version)?;
        // Delivery and invoice state only changes through the calls below.
        document.ensure_fulfillment_matches(current)?;

        let stored = document
            .clone()
            .recalculated()
            .at_version(current_version + 1);
        state.documents.insert(*stored.id(), stored.clone());
        tracing::debug!(document_id = %stored.id(), version = stored.version(), "document saved");
        Ok(stored)
    }

    fn create_delivery_note(
        &self,
        document_id: DocumentId,
        request: &DeliveryRequest,
    ) -> DomainResult<DeliveryNote> {
        let mut state = self.write()?;
        let document = state
            .documents
            .get(&document_id)
            .ok_or_else(|| DomainError::not_found(format!("document {document_id}")))?;

        // Check before drawing a number so rejected requests leave no gaps.
        document.check_fulfillment(FulfillmentKind::Delivery, &request.item_ids)?;
        let number = self.numbers.next(NumberKind::DeliveryNote)?;
        let (updated, note) = create_delivery_note(document, DeliveryNoteId::new(), number, request)?;

        state.documents.insert(document_id, updated);
        state.delivery_notes.insert(note.id, note.clone());
        Ok(note)
    }

    fn create_invoice(
        &self,
        document_id: DocumentId,
        request: &InvoiceRequest,
    ) -> DomainResult<Invoice> {
        let mut state = self.write()?;
        let document = state
            .documents
            .get(&document_id)
            .ok_or_else(|| DomainError::not_found(format!("document {document_id}")))?;

        document.check_fulfillment(FulfillmentKind::Invoice, &request.item_ids)?;
        let number = self.numbers.next(NumberKind::Invoice)?;
        let (updated, invoice) = create_invoice(
            document,
            InvoiceId::new(),
            number,
            request,
            self.payment_terms_days,
        )?;

        state.documents.insert(document_id, updated);
        state.invoices.insert(*invoice.id(), invoice.clone());
        Ok(invoice)
    }

    fn load_invoice(&self, id: InvoiceId) -> DomainResult<Invoice> {
        self.read()?
            .invoices
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("invoice {id}")))
    }

    fn register_payment(
        &self,
        id: InvoiceId,
        amount: Decimal,
        paid_on: NaiveDate,
    ) -> DomainResult<Invoice> {
        self.update_invoice(id, &InvoiceCommand::RegisterPayment { amount, paid_on })
    }

    fn void_invoice(&self, id: InvoiceId, reason: Option<String>) -> DomainResult<Invoice> {
        let mut state = self.write()?;
        let invoice = state
            .invoices
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("invoice {id}")))?;
        let document_id = invoice.document_id();
        let document = state
            .documents
            .get(&document_id)
            .ok_or_else(|| DomainError::not_found(format!("document {document_id}")))?;

        let (updated, voided) = void_invoice(document, invoice, reason)?;
        state.documents.insert(document_id, updated);
        state.invoices.insert(id, voided.clone());
        Ok(voided)
    }
}
