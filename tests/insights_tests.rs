use std::collections::BTreeMap;

use sector_monitor::insights::{generate_insights, InsightThresholds, NO_INSIGHTS};
use sector_monitor::model::performance::{OrderFlowScore, PerformanceRow};
use sector_monitor::model::symbol::Symbol;

fn row(symbol: &str, sector: &str) -> (Symbol, PerformanceRow) {
    let symbol = Symbol::new(symbol);
    (
        symbol.clone(),
        PerformanceRow {
            symbol,
            sector: Some(sector.to_string()),
            latest_close: Some(10.0),
            latest_date: None,
            latest_volume: 0,
            changes: BTreeMap::new(),
        },
    )
}

fn score(short_term: f64, long_term: f64) -> OrderFlowScore {
    OrderFlowScore {
        short_term,
        long_term,
    }
}

#[test]
fn empty_scores_produce_single_placeholder() {
    let out = generate_insights(&BTreeMap::new(), &BTreeMap::new(), &InsightThresholds::default());
    assert_eq!(out, vec![NO_INSIGHTS.to_string()]);
}

#[test]
fn rotation_names_long_leader_and_short_leader() {
    let rows: BTreeMap<_, _> = [row("XLK", "Technology"), row("XLE", "Energy")].into_iter().collect();
    let scores: BTreeMap<_, _> = [
        (Symbol::new("XLK"), score(-0.4, 0.8)),
        (Symbol::new("XLE"), score(0.6, -0.2)),
    ]
    .into_iter()
    .collect();

    let out = generate_insights(&rows, &scores, &InsightThresholds::default());

    assert!(out[0].starts_with("Market is shifting out of Technology (long: 0.80) into Energy (short: 0.60)"));
    assert!(out.iter().any(|s| s.starts_with("Energy is experiencing accelerating momentum")));
    assert!(out.iter().any(|s| s.starts_with("Technology is experiencing reduced momentum")));
}

#[test]
fn strong_bullish_bias_when_both_averages_exceed_threshold() {
    let rows: BTreeMap<_, _> = [row("XLF", "Financials")].into_iter().collect();
    let scores: BTreeMap<_, _> = [(Symbol::new("XLF"), score(0.7, 0.6))].into_iter().collect();

    let out = generate_insights(&rows, &scores, &InsightThresholds::default());
    assert!(!out.iter().any(|s| s.starts_with("Market is shifting")));
    assert!(out.iter().any(|s| s.contains("strong bullish flow")));
}

#[test]
fn strong_bearish_and_neutral_bias() {
    let scores: BTreeMap<_, _> = [(Symbol::new("XLU"), score(-0.9, -0.8))].into_iter().collect();
    let out = generate_insights(&BTreeMap::new(), &scores, &InsightThresholds::default());
    assert!(out.iter().any(|s| s.contains("strong bearish flow")));

    let scores: BTreeMap<_, _> = [(Symbol::new("XLU"), score(0.05, -0.02))].into_iter().collect();
    let out = generate_insights(&BTreeMap::new(), &scores, &InsightThresholds::default());
    assert_eq!(out, vec!["Overall flow is neutral (short avg: 0.05, long avg: -0.02).".to_string()]);
}

#[test]
fn recovery_bias_when_short_term_leads() {
    let scores: BTreeMap<_, _> = [
        (Symbol::new("XLI"), score(0.5, 0.1)),
        (Symbol::new("XLB"), score(0.2, 0.3)),
    ]
    .into_iter()
    .collect();
    let thresholds = InsightThresholds {
        momentum: 0.5,
        ..InsightThresholds::default()
    };

    let out = generate_insights(&BTreeMap::new(), &scores, &thresholds);
    assert!(out.iter().any(|s| s.contains("potential recovery")));
    // Rows are absent, so labels fall back to symbols.
    assert!(out[0].starts_with("Market is shifting out of XLB (long: 0.30) into XLI (short: 0.50)"));
}
