use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use sector_monitor::error::DataError;
use sector_monitor::model::performance::{PerformanceRow, PeriodReturn};
use sector_monitor::model::period::Period;
use sector_monitor::model::symbol::Symbol;
use sector_monitor::order_flow::{score_rows, OrderFlowWeights};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()
}

fn cell(period: Period, change_pct: f64, avg_volume: f64) -> (Period, Result<PeriodReturn, DataError>) {
    (
        period,
        Ok(PeriodReturn {
            period,
            reference_date: date(),
            reference_close: 100.0,
            change_pct,
            volume: 0,
            avg_volume,
        }),
    )
}

fn row(symbol: &str, latest_volume: u64, cells: Vec<(Period, Result<PeriodReturn, DataError>)>) -> PerformanceRow {
    PerformanceRow {
        symbol: Symbol::new(symbol),
        sector: None,
        latest_close: Some(100.0),
        latest_date: Some(date()),
        latest_volume,
        changes: cells.into_iter().collect(),
    }
}

fn rows(list: Vec<PerformanceRow>) -> BTreeMap<Symbol, PerformanceRow> {
    list.into_iter().map(|r| (r.symbol.clone(), r)).collect()
}

#[test]
fn default_weights_split_groups_evenly() {
    let w = OrderFlowWeights::default();
    assert_eq!(w.short_term, vec![Period::OneDay, Period::FiveDays]);
    assert_eq!(w.long_term.len(), 4);
    assert!(w.short_term_weights.is_empty());
}

#[test]
fn change_is_normalized_by_cross_sectional_max() {
    // Relative volume is 1.0 everywhere, so the signal is change / max|change|.
    let table = rows(vec![
        row("A", 100, vec![cell(Period::OneDay, 4.0, 100.0), cell(Period::FiveDays, -2.0, 100.0)]),
        row("B", 100, vec![cell(Period::OneDay, -2.0, 100.0), cell(Period::FiveDays, 1.0, 100.0)]),
    ]);
    let scores = score_rows(&table, &[Period::OneDay, Period::FiveDays], &OrderFlowWeights::default());

    let a = scores[&Symbol::new("A")];
    let b = scores[&Symbol::new("B")];
    // A: 0.5 * (4/4) + 0.5 * (-2/2) = 0.0
    assert!(a.short_term.abs() < 1e-12);
    // B: 0.5 * (-2/4) + 0.5 * (1/2) = 0.0
    assert!(b.short_term.abs() < 1e-12);
    assert_eq!(a.long_term, 0.0);
}

#[test]
fn relative_volume_scales_signal() {
    let table = rows(vec![
        row("HOT", 300, vec![cell(Period::OneDay, 2.0, 100.0)]),
        row("COLD", 50, vec![cell(Period::OneDay, 2.0, 100.0)]),
    ]);
    let weights = OrderFlowWeights {
        short_term: vec![Period::OneDay],
        long_term: vec![],
        short_term_weights: HashMap::new(),
        long_term_weights: HashMap::new(),
    };
    let scores = score_rows(&table, &[Period::OneDay], &weights);

    assert!((scores[&Symbol::new("HOT")].short_term - 3.0).abs() < 1e-12);
    assert!((scores[&Symbol::new("COLD")].short_term - 0.5).abs() < 1e-12);
}

#[test]
fn undefined_cells_and_disabled_periods_contribute_nothing() {
    let table = rows(vec![
        row(
            "A",
            100,
            vec![
                cell(Period::OneMonth, 5.0, 100.0),
                (
                    Period::OneYear,
                    Err(DataError::InsufficientHistory {
                        period: Period::OneYear,
                        reference_date: Some(date()),
                    }),
                ),
            ],
        ),
        row("B", 100, vec![cell(Period::OneMonth, -5.0, 100.0)]),
    ]);
    let mut weights = OrderFlowWeights::default();
    weights.long_term_weights.insert(Period::OneMonth, 1.0);

    let scores = score_rows(&table, &[Period::OneMonth, Period::OneYear], &weights);
    assert!((scores[&Symbol::new("A")].long_term - 1.0).abs() < 1e-12);
    assert!((scores[&Symbol::new("B")].long_term + 1.0).abs() < 1e-12);

    // 1mo not enabled: no long-term contribution at all.
    let scores = score_rows(&table, &[Period::OneYear], &weights);
    assert_eq!(scores[&Symbol::new("A")].long_term, 0.0);
}

#[test]
fn zero_average_volume_yields_zero_signal() {
    let table = rows(vec![row("A", 100, vec![cell(Period::OneDay, 3.0, 0.0)])]);
    let scores = score_rows(&table, &[Period::OneDay], &OrderFlowWeights::default());
    assert_eq!(scores[&Symbol::new("A")].short_term, 0.0);
}
