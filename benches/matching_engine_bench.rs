use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ultimate_matching::domain::models::types::Side;
use ultimate_matching::domain::services::orderbook::OrderBook;

fn bench_resting_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_resting");

    group.bench_function("rest_non_crossing_limits", |b| {
        b.iter(|| {
            let mut book = OrderBook::new("BTC-USD");
            for i in 0..1_000u64 {
                let order = ultimate_matching::Order {
                    id: i,
                    seq: i,
                    symbol: "BTC-USD".to_string(),
                    side: Side::Buy,
                    order_type: ultimate_matching::OrderType::Limit,
                    quantity: 1,
                    price: Some(100_000_000 - i as i64),
                    user_ref: None,
                    created_at: chrono::Utc::now(),
                };
                black_box(book.add_limit(order).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_crossing_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_crossing");

    group.bench_function("alternating_cross", |b| {
        b.iter(|| {
            let mut book = OrderBook::new("BTC-USD");
            for i in 0..1_000u64 {
                let side = if i % 2 == 0 { Side::Sell } else { Side::Buy };
                let order = ultimate_matching::Order {
                    id: i,
                    seq: i,
                    symbol: "BTC-USD".to_string(),
                    side,
                    order_type: ultimate_matching::OrderType::Limit,
                    quantity: 1,
                    price: Some(100_000_000),
                    user_ref: None,
                    created_at: chrono::Utc::now(),
                };
                black_box(book.add_limit(order).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_resting_orders, bench_crossing_orders);
criterion_main!(benches);
