use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;

use sector_monitor::history::{order_flow_history, symbol_history};
use sector_monitor::model::bar::{PriceSeries, RawBar};
use sector_monitor::model::period::{Period, PeriodTable};
use sector_monitor::model::symbol::Symbol;
use sector_monitor::order_flow::OrderFlowWeights;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

const SESSIONS: [u32; 6] = [2, 3, 4, 5, 8, 9];

fn series(symbol: &str, closes: &[f64]) -> Arc<PriceSeries> {
    Arc::new(PriceSeries::from_raw(
        Symbol::new(symbol),
        SESSIONS
            .iter()
            .zip(closes)
            .map(|(day, close)| RawBar::new(d(*day), Some(*close), Some(1_000)))
            .collect(),
    ))
}

fn universe() -> BTreeMap<Symbol, Arc<PriceSeries>> {
    let mut map = BTreeMap::new();
    map.insert(Symbol::new("UP"), series("UP", &[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]));
    map.insert(Symbol::new("DOWN"), series("DOWN", &[100.0, 99.0, 98.0, 97.0, 96.0, 95.0]));
    map
}

#[test]
fn replays_each_business_day_with_enough_bars() {
    let points = order_flow_history(
        &universe(),
        &[Period::OneDay],
        &PeriodTable::default(),
        &OrderFlowWeights::default(),
        d(1),
        d(9),
    );

    // Jan 1 and 2 lack two bars; Jan 6 and 7 are a weekend.
    let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
    assert_eq!(dates, vec![d(3), d(4), d(5), d(8), d(9)]);

    for point in &points {
        let up = point.scores[&Symbol::new("UP")];
        let down = point.scores[&Symbol::new("DOWN")];
        assert!(up.short_term > 0.0);
        // DOWN has the larger absolute move, so it normalizes to -1 at half weight.
        assert!((down.short_term + 0.5).abs() < 1e-9);
        assert!((point.net.short_term - (up.short_term + down.short_term) / 2.0).abs() < 1e-12);
        assert_eq!(point.net.long_term, 0.0);
    }
}

#[test]
fn later_bars_never_leak_into_earlier_days() {
    let full = order_flow_history(
        &universe(),
        &[Period::OneDay],
        &PeriodTable::default(),
        &OrderFlowWeights::default(),
        d(3),
        d(9),
    );

    let mut shocked = universe();
    shocked.insert(
        Symbol::new("UP"),
        series("UP", &[100.0, 101.0, 102.0, 103.0, 500.0, 1.0]),
    );
    let with_shock = order_flow_history(
        &shocked,
        &[Period::OneDay],
        &PeriodTable::default(),
        &OrderFlowWeights::default(),
        d(3),
        d(9),
    );

    let upto_fifth = |points: &[sector_monitor::history::FlowHistoryPoint]| {
        points.iter().filter(|p| p.date <= d(5)).cloned().collect::<Vec<_>>()
    };
    assert_eq!(upto_fifth(&full), upto_fifth(&with_shock));
    assert_ne!(full.last(), with_shock.last());
}

#[test]
fn symbol_history_follows_one_symbol() {
    let points = order_flow_history(
        &universe(),
        &[Period::OneDay],
        &PeriodTable::default(),
        &OrderFlowWeights::default(),
        d(1),
        d(9),
    );
    let up = symbol_history(&points, &Symbol::new("UP"));
    assert_eq!(up.len(), 5);
    assert_eq!(up[0].0, d(3));
    assert!(symbol_history(&points, &Symbol::new("XLK")).is_empty());
}
