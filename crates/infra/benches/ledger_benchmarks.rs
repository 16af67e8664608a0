use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use shopledger_auth::{Actor, Permission};
use shopledger_core::UserId;
use shopledger_customers::{ContactInfo, CustomerId};
use shopledger_infra::coordinator::{
    PaymentRequest, RegisterCustomerRequest, RegisterProductRequest, RestockRequest,
    SaleLineRequest, SaleRequest,
};
use shopledger_infra::{
    ExchangeRateBook, InMemoryLedgerStore, LockManager, ReconcileScope, ReconciliationEngine,
    TransactionCoordinator,
};
use shopledger_inventory::ProductId;

type Coordinator = TransactionCoordinator<InMemoryLedgerStore>;

fn setup() -> (Coordinator, ReconciliationEngine<InMemoryLedgerStore>, Actor) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let locks = LockManager::new(Duration::from_secs(5));
    let rates = Arc::new(
        ExchangeRateBook::new("USD".parse().unwrap(), "SOS".parse().unwrap(), dec!(570)).unwrap(),
    );
    let coordinator = TransactionCoordinator::new(Arc::clone(&store), locks.clone(), rates);
    let engine = ReconciliationEngine::new(store, locks);
    let actor = Actor::new(UserId::new(), "bench", vec![Permission::WILDCARD]);
    (coordinator, engine, actor)
}

fn register_product(coordinator: &Coordinator, actor: &Actor, opening_stock: i64) -> ProductId {
    coordinator
        .register_product(
            actor,
            RegisterProductRequest {
                name: "Oil filter".to_string(),
                unit_price: dec!(4.50),
                cost_basis: dec!(3),
                low_stock_threshold: 5,
                opening_stock,
                origin: None,
            },
        )
        .unwrap()
        .id_typed()
}

fn register_customer(coordinator: &Coordinator, actor: &Actor) -> CustomerId {
    coordinator
        .register_customer(
            actor,
            RegisterCustomerRequest {
                name: "Bench customer".to_string(),
                contact: ContactInfo::default(),
                origin: None,
            },
        )
        .unwrap()
        .id_typed()
}

fn sale(customer_id: Option<CustomerId>, product_ids: &[ProductId], paid: Decimal) -> SaleRequest {
    SaleRequest {
        customer_id,
        lines: product_ids
            .iter()
            .map(|id| SaleLineRequest {
                product_id: *id,
                quantity: 1,
                unit_price: None,
            })
            .collect(),
        amount_paid: paid,
        currency: "USD".parse().unwrap(),
        origin: None,
    }
}

fn bench_posting_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("posting_latency");

    group.bench_function("cash_sale_single_line", |b| {
        let (coordinator, _, actor) = setup();
        let product = register_product(&coordinator, &actor, 1_000_000_000);
        b.iter(|| {
            black_box(
                coordinator
                    .post_sale(&actor, sale(None, &[product], dec!(4.50)))
                    .unwrap(),
            );
        });
    });

    // Five lines, credit sale: six lock keys and a debt movement per posting.
    group.bench_function("credit_sale_five_lines", |b| {
        let (coordinator, _, actor) = setup();
        let products: Vec<ProductId> = (0..5)
            .map(|_| register_product(&coordinator, &actor, 1_000_000_000))
            .collect();
        let customer = register_customer(&coordinator, &actor);
        b.iter(|| {
            black_box(
                coordinator
                    .post_sale(&actor, sale(Some(customer), &products, Decimal::ZERO))
                    .unwrap(),
            );
        });
    });

    group.bench_function("payment", |b| {
        let (coordinator, _, actor) = setup();
        let product = register_product(&coordinator, &actor, 1_000_000_000);
        let customer = register_customer(&coordinator, &actor);
        b.iter(|| {
            coordinator
                .post_sale(&actor, sale(Some(customer), &[product], Decimal::ZERO))
                .unwrap();
            black_box(
                coordinator
                    .post_payment(
                        &actor,
                        PaymentRequest {
                            customer_id: customer,
                            amount: dec!(4.50),
                            note: None,
                            origin: None,
                        },
                    )
                    .unwrap(),
            );
        });
    });

    group.finish();
}

fn bench_verify_by_history_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify_by_history_length");
    group.sample_size(20);

    for movements in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*movements as u64));
        group.bench_with_input(
            BenchmarkId::new("single_product", movements),
            movements,
            |b, &count| {
                let (coordinator, engine, actor) = setup();
                let product = register_product(&coordinator, &actor, 1);
                for _ in 1..count {
                    coordinator
                        .restock(
                            &actor,
                            RestockRequest {
                                product_id: product,
                                quantity: 1,
                                note: None,
                                origin: None,
                            },
                        )
                        .unwrap();
                }
                let scope = ReconcileScope::Products(vec![product]);

                b.iter(|| {
                    let report = engine.verify(&actor, black_box(&scope)).unwrap();
                    assert!(report.is_clean());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_posting_latency, bench_verify_by_history_length);
criterion_main!(benches);
