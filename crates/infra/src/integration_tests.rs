//! Integration tests for the document lifecycle through the store.
//!
//! Verifies:
//! - Confirmed orders can be delivered and invoiced through the store
//! - Concurrent fulfillment of the same item succeeds at most once
//! - Stale saves are rejected, even without a version check
//! - Voided invoices release their items for billing

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use orderflow_core::{
        Aggregate, AggregateRoot, CustomerId, DocumentId, DomainError, EngineSettings,
        ExpectedVersion, LineItemId, NumberPrefixes,
    };
    use orderflow_fulfillment::{
        DeliveryRequest, DocumentStore, InvoiceRequest, InvoiceStatus, NumberKind, NumberSequence,
    };
    use orderflow_sales::{
        Article, Document, DocumentCommand, DocumentStatus, FulfillmentKind, NewLine, OrderStatus,
    };

    use crate::{InMemoryDocumentStore, InMemoryNumberSequence};

    type Store = InMemoryDocumentStore<InMemoryNumberSequence>;

    fn setup() -> Store {
        let settings = EngineSettings::default();
        InMemoryDocumentStore::new(InMemoryNumberSequence::new(NumberPrefixes::default()), &settings)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    /// Saves a confirmed order with two items and returns its id and item ids.
    fn confirmed_order(store: &Store) -> (DocumentId, Vec<LineItemId>) {
        let settings = EngineSettings::default();
        let mut doc = Document::new_order(DocumentId::new(), &settings)
            .execute(&DocumentCommand::SetCustomer {
                customer: Some(CustomerId::new()),
            })
            .unwrap();
        let mut ids = Vec::new();
        for (name, price) in [("Server", dec!(1200)), ("Rack", dec!(300))] {
            let item_id = LineItemId::new();
            doc = doc
                .execute(&DocumentCommand::AddItem {
                    item_id,
                    line: NewLine::Standalone {
                        article: Article::new(name, dec!(1), price, dec!(19)),
                        uses_system_price: false,
                    },
                })
                .unwrap();
            ids.push(item_id);
        }
        let number = store.numbers().next(NumberKind::Order).unwrap();
        let doc = doc
            .execute(&DocumentCommand::ConfirmOrder {
                number: number.number,
            })
            .unwrap();
        let saved = store.save(&doc, ExpectedVersion::Exact(0)).unwrap();
        (*saved.id(), ids)
    }

    fn delivery(item_ids: Vec<LineItemId>) -> DeliveryRequest {
        DeliveryRequest {
            item_ids,
            serial_numbers: BTreeMap::new(),
            issued_on: day(),
        }
    }

    #[test]
    fn order_is_delivered_invoiced_and_paid() {
        let store = setup();
        let (id, items) = confirmed_order(&store);
        assert_eq!(store.load(id).unwrap().number(), Some("SO-00001"));

        let note = store.create_delivery_note(id, &delivery(items.clone())).unwrap();
        assert_eq!(note.number, "DN-00001");
        assert_eq!(
            store.load(id).unwrap().status(),
            DocumentStatus::Order(OrderStatus::Delivered)
        );

        let invoice = store
            .create_invoice(
                id,
                &InvoiceRequest {
                    item_ids: items,
                    issued_on: day(),
                },
            )
            .unwrap();
        assert_eq!(invoice.number(), "INV-00001");
        assert_eq!(invoice.gross_total(), dec!(1785.00));
        assert_eq!(invoice.due_on(), NaiveDate::from_ymd_opt(2026, 6, 15).unwrap());

        let doc = store.load(id).unwrap();
        assert_eq!(doc.status(), DocumentStatus::Order(OrderStatus::Invoiced));
        assert_eq!(doc.items()[0].fulfillment().unwrap().invoice_sequence, Some(1));

        let paid = store
            .register_payment(*invoice.id(), dec!(1785), day())
            .unwrap();
        assert_eq!(paid.status(), InvoiceStatus::Paid);
        assert_eq!(store.load_invoice(*invoice.id()).unwrap(), paid);
        assert_eq!(store.invoices(id).unwrap().len(), 1);
    }

    #[test]
    fn rejected_requests_do_not_consume_numbers() {
        let store = setup();
        let (id, items) = confirmed_order(&store);
        store.create_delivery_note(id, &delivery(vec![items[0]])).unwrap();

        let err = store
            .create_delivery_note(id, &delivery(vec![items[0]]))
            .unwrap_err();
        assert!(matches!(err, DomainError::FulfillmentConflict(_)));

        let note = store.create_delivery_note(id, &delivery(vec![items[1]])).unwrap();
        assert_eq!(note.sequence, 2);
        assert_eq!(store.delivery_notes(id).unwrap().len(), 2);
    }

    #[test]
    fn created_orders_are_not_deliverable() {
        let store = setup();
        let doc = Document::new_order(DocumentId::new(), &EngineSettings::default());
        let saved = store.save(&doc, ExpectedVersion::Any).unwrap();
        let err = store
            .create_delivery_note(*saved.id(), &delivery(vec![LineItemId::new()]))
            .unwrap_err();
        assert!(matches!(err, DomainError::Precondition(_)));
    }

    #[test]
    fn concurrent_deliveries_of_same_item_succeed_once() {
        let store = Arc::new(setup());
        let (id, items) = confirmed_order(&store);
        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));

        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let item = items[0];
                thread::spawn(move || {
                    barrier.wait();
                    store.create_delivery_note(id, &delivery(vec![item]))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, DomainError::FulfillmentConflict(_)))
        );

        let doc = store.load(id).unwrap();
        assert!(!doc.item(items[0]).unwrap().fulfillment().unwrap().is_open(FulfillmentKind::Delivery));
        assert_eq!(store.delivery_notes(id).unwrap().len(), 1);
    }

    #[test]
    fn stale_save_is_a_conflict() {
        let store = setup();
        let (id, items) = confirmed_order(&store);
        let loaded = store.load(id).unwrap();

        // Someone else delivers in the meantime.
        store.create_delivery_note(id, &delivery(vec![items[0]])).unwrap();

        let edited = loaded
            .execute(&DocumentCommand::SetNotes {
                item_id: items[1],
                notes: Some("fragile".into()),
            })
            .unwrap();
        let err = store
            .save(&edited, ExpectedVersion::Exact(loaded.version()))
            .unwrap_err();
        assert!(err.requires_refresh());
    }

    #[test]
    fn unversioned_save_cannot_reopen_delivered_items() {
        let store = setup();
        let (id, items) = confirmed_order(&store);
        let stale = store.load(id).unwrap();
        store.create_delivery_note(id, &delivery(vec![items[0]])).unwrap();
        let delivered_version = store.load(id).unwrap().version();

        let err = store.save(&stale, ExpectedVersion::Any).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = store
            .create_delivery_note(id, &delivery(vec![items[0]]))
            .unwrap_err();
        assert!(matches!(err, DomainError::FulfillmentConflict(_)));
        assert_eq!(store.delivery_notes(id).unwrap().len(), 1);

        // A fresh copy saves fine, and the version only moves forward.
        let fresh = store.load(id).unwrap();
        let saved = store.save(&fresh, ExpectedVersion::Any).unwrap();
        assert_eq!(saved.version(), delivered_version + 1);
        assert_eq!(store.load(id).unwrap().version(), delivered_version + 1);
    }

    #[test]
    fn voided_invoice_items_can_be_invoiced_again() {
        let store = setup();
        let (id, items) = confirmed_order(&store);
        store.create_delivery_note(id, &delivery(items.clone())).unwrap();
        let request = InvoiceRequest {
            item_ids: vec![items[0]],
            issued_on: day(),
        };

        let first = store.create_invoice(id, &request).unwrap();
        let voided = store
            .void_invoice(*first.id(), Some("wrong customer".into()))
            .unwrap();
        assert_eq!(voided.status(), InvoiceStatus::Void);
        assert!(store.load(id).unwrap().has_no_invoices());

        let second = store.create_invoice(id, &request).unwrap();
        assert_eq!(second.number(), "INV-00002");
        assert_eq!(second.gross_total(), first.gross_total());
        assert_eq!(
            store.load(id).unwrap().item(items[0]).unwrap().fulfillment().unwrap().invoice_sequence,
            Some(2)
        );

        let paid = store
            .register_payment(*second.id(), second.gross_total(), day())
            .unwrap();
        assert!(matches!(
            store.void_invoice(*paid.id(), None),
            Err(DomainError::Precondition(_))
        ));
        assert_eq!(
            store.load(id).unwrap().open_items(FulfillmentKind::Invoice),
            vec![items[1]]
        );
    }
}
