use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::model::bar::PriceSeries;
use crate::model::performance::{OrderFlowScore, PerformanceRow};
use crate::model::period::{Period, PeriodTable};
use crate::model::symbol::Symbol;
use crate::order_flow::{score_rows, OrderFlowWeights};
use crate::performance::build_row;

/// A symbol needs at least this many bars up to a date to be scored on it.
const MIN_BARS: usize = 2;

/// Order-flow scores for every scored symbol on one business day.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowHistoryPoint {
    pub date: NaiveDate,
    pub scores: BTreeMap<Symbol, OrderFlowScore>,
    /// Mean short- and long-term score across `scores`.
    pub net: OrderFlowScore,
}

/// Weekdays from `start` through `end`, inclusive.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

fn mean_score(scores: &BTreeMap<Symbol, OrderFlowScore>) -> OrderFlowScore {
    if scores.is_empty() {
        return OrderFlowScore::default();
    }
    let n = scores.len() as f64;
    let (short, long) = scores
        .values()
        .fold((0.0, 0.0), |(s, l), score| (s + score.short_term, l + score.long_term));
    OrderFlowScore {
        short_term: short / n,
        long_term: long / n,
    }
}

/// Replays the cross-sectional scoring on every business day in
/// `start..=end`, each day seeing only the bars up to its own close.
/// Days on which no symbol has enough bars are skipped.
pub fn order_flow_history(
    series: &BTreeMap<Symbol, Arc<PriceSeries>>,
    periods: &[Period],
    table: &PeriodTable,
    weights: &OrderFlowWeights,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<FlowHistoryPoint> {
    let mut points = Vec::new();
    for date in business_days(start, end) {
        let rows: BTreeMap<Symbol, PerformanceRow> = series
            .iter()
            .filter_map(|(symbol, s)| {
                let visible = s.truncated(date);
                (visible.len() >= MIN_BARS)
                    .then(|| (symbol.clone(), build_row(&visible, None, periods, table, date)))
            })
            .collect();
        if rows.is_empty() {
            continue;
        }
        let scores = score_rows(&rows, periods, weights);
        let net = mean_score(&scores);
        points.push(FlowHistoryPoint { date, scores, net });
    }
    points
}

/// One symbol's score on each day it was scored.
pub fn symbol_history(points: &[FlowHistoryPoint], symbol: &Symbol) -> Vec<(NaiveDate, OrderFlowScore)> {
    points
        .iter()
        .filter_map(|p| p.scores.get(symbol).map(|s| (p.date, *s)))
        .collect()
}
