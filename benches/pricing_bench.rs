//! Pricing Benchmarks - Per-Cycle Hot Path
//!
//! Benchmarks the pure functions the reprice engine calls on every
//! poll cycle: maker price, drift check and quantity flooring.
//!
//! Run with: cargo bench --bench pricing_bench

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use postonly_executor::domain::filters::SymbolFilters;
use postonly_executor::domain::pricing::{BookTicker, has_drifted, maker_price};
use postonly_executor::domain::trade::OrderSide;

fn filters() -> SymbolFilters {
    SymbolFilters {
        tick_size: dec!(0.01),
        step_size: dec!(0.001),
        min_notional: dec!(5),
    }
}

/// Benchmark maker price on a grid-aligned book.
fn bench_maker_price(c: &mut Criterion) {
    let book = BookTicker::new(dec!(2500.10), dec!(2500.11));
    let filters = filters();

    c.bench_function("maker_price_buy", |b| {
        b.iter(|| {
            let _price = maker_price(
                black_box(OrderSide::Buy),
                black_box(&book),
                &filters,
                black_box(1),
            );
        });
    });
}

/// Benchmark maker price when the book is narrower than a tick.
fn bench_maker_price_off_grid(c: &mut Criterion) {
    let book = BookTicker::new(dec!(2500.105), dec!(2500.109));
    let filters = filters();

    c.bench_function("maker_price_sell_off_grid", |b| {
        b.iter(|| {
            let _price = maker_price(
                black_box(OrderSide::Sell),
                black_box(&book),
                &filters,
                black_box(0),
            );
        });
    });
}

/// Benchmark the drift check against a fresh quote.
fn bench_has_drifted(c: &mut Criterion) {
    let filters = filters();

    c.bench_function("has_drifted", |b| {
        b.iter(|| {
            let _drifted = has_drifted(
                black_box(dec!(2500.10)),
                black_box(dec!(2500.13)),
                black_box(2),
                &filters,
            );
        });
    });
}

/// Benchmark flooring a residual onto the lot step.
fn bench_floor_quantity(c: &mut Criterion) {
    let filters = filters();

    c.bench_function("floor_quantity", |b| {
        b.iter(|| {
            let _qty = filters.floor_quantity(black_box(dec!(0.0199)));
        });
    });
}

criterion_group!(
    benches,
    bench_maker_price,
    bench_maker_price_off_grid,
    bench_has_drifted,
    bench_floor_quantity,
);
criterion_main!(benches);
