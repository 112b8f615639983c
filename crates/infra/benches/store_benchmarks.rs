use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::NaiveDate;
use orderflow_core::{
    Aggregate, AggregateRoot, CustomerId, DocumentId, EngineSettings, ExpectedVersion, LineItemId,
    NumberPrefixes,
};
use orderflow_fulfillment::{DeliveryRequest, DocumentStore};
use orderflow_infra::{InMemoryDocumentStore, InMemoryNumberSequence};
use orderflow_sales::{Article, Document, DocumentCommand, NewLine};
use rust_decimal_macros::dec;

type Store = InMemoryDocumentStore<InMemoryNumberSequence>;

fn setup() -> Store {
    InMemoryDocumentStore::new(
        InMemoryNumberSequence::new(NumberPrefixes::default()),
        &EngineSettings::default(),
    )
}

fn confirmed_order(items: usize) -> (Document, Vec<LineItemId>) {
    let mut doc = Document::new_order(DocumentId::new(), &EngineSettings::default())
        .execute(&DocumentCommand::SetCustomer {
            customer: Some(CustomerId::new()),
        })
        .unwrap();
    let mut ids = Vec::with_capacity(items);
    for _ in 0..items {
        let item_id = LineItemId::new();
        doc = doc
            .execute(&DocumentCommand::AddItem {
                item_id,
                line: NewLine::Standalone {
                    article: Article::new("article", dec!(2), dec!(49.90), dec!(19)),
                    uses_system_price: false,
                },
            })
            .unwrap();
        ids.push(item_id);
    }
    let doc = doc
        .execute(&DocumentCommand::ConfirmOrder {
            number: "SO-00001".into(),
        })
        .unwrap();
    (doc, ids)
}

fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("save");
    for items in [10usize, 50] {
        let (doc, _) = confirmed_order(items);
        group.throughput(Throughput::Elements(items as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), &doc, |b, doc| {
            let store = setup();
            b.iter(|| store.save(black_box(doc), ExpectedVersion::Any).unwrap());
        });
    }
    group.finish();
}

fn bench_delivery_note_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_delivery_note");
    let issued_on = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();

    // One note per item until the order is fully delivered.
    group.bench_function("item_by_item_50", |b| {
        b.iter(|| {
            let store = setup();
            let (doc, ids) = confirmed_order(50);
            let saved = store.save(&doc, ExpectedVersion::Any).unwrap();
            for id in ids {
                let request = DeliveryRequest {
                    item_ids: vec![id],
                    serial_numbers: Default::default(),
                    issued_on,
                };
                store.create_delivery_note(*saved.id(), &request).unwrap();
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_save, bench_delivery_note_creation);
criterion_main!(benches);
