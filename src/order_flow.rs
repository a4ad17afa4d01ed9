use std::collections::{BTreeMap, HashMap};

use crate::model::performance::{OrderFlowScore, PerformanceRow};
use crate::model::period::Period;
use crate::model::symbol::Symbol;

/// Period groups and weights for the two order-flow horizons.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFlowWeights {
    pub short_term: Vec<Period>,
    pub long_term: Vec<Period>,
    pub short_term_weights: HashMap<Period, f64>,
    pub long_term_weights: HashMap<Period, f64>,
}

impl Default for OrderFlowWeights {
    fn default() -> Self {
        Self {
            short_term: vec![Period::OneDay, Period::FiveDays],
            long_term: vec![
                Period::OneMonth,
                Period::ThreeMonths,
                Period::SixMonths,
                Period::OneYear,
            ],
            short_term_weights: HashMap::new(),
            long_term_weights: HashMap::new(),
        }
    }
}

impl OrderFlowWeights {
    /// Configured weight, or an equal share of the group.
    fn weight(group: &[Period], weights: &HashMap<Period, f64>, period: Period) -> f64 {
        weights
            .get(&period)
            .copied()
            .unwrap_or(1.0 / group.len().max(1) as f64)
    }
}

/// Latest-session volume relative to the period's average daily volume.
fn relative_volume(row: &PerformanceRow, period: Period) -> Option<f64> {
    let cell = row.changes.get(&period)?.as_ref().ok()?;
    if cell.avg_volume > 0.0 {
        Some(row.latest_volume as f64 / cell.avg_volume)
    } else {
        Some(0.0)
    }
}

/// Per-period signal for every row: change normalized by the largest absolute
/// change across rows, times relative volume. Undefined cells yield 0.
fn period_signals(rows: &[&PerformanceRow], period: Period) -> Vec<f64> {
    let abs_max = rows
        .iter()
        .filter_map(|r| r.change_pct(period))
        .map(f64::abs)
        .fold(0.0_f64, f64::max);

    rows.iter()
        .map(|row| {
            let Some(change) = row.change_pct(period) else {
                return 0.0;
            };
            let norm_change = if abs_max > 0.0 { change / abs_max } else { 0.0 };
            let signal = norm_change * relative_volume(row, period).unwrap_or(0.0);
            if signal.is_finite() {
                signal
            } else {
                0.0
            }
        })
        .collect()
}

/// Cross-sectional short- and long-term order-flow scores for every row.
/// Only periods present in `periods` contribute.
pub fn score_rows(
    rows: &BTreeMap<Symbol, PerformanceRow>,
    periods: &[Period],
    weights: &OrderFlowWeights,
) -> BTreeMap<Symbol, OrderFlowScore> {
    let ordered: Vec<&PerformanceRow> = rows.values().collect();
    let mut scores = vec![OrderFlowScore::default(); ordered.len()];

    for &period in &weights.short_term {
        if !periods.contains(&period) {
            continue;
        }
        let w = OrderFlowWeights::weight(&weights.short_term, &weights.short_term_weights, period);
        for (score, signal) in scores.iter_mut().zip(period_signals(&ordered, period)) {
            score.short_term += w * signal;
        }
    }
    for &period in &weights.long_term {
        if !periods.contains(&period) {
            continue;
        }
        let w = OrderFlowWeights::weight(&weights.long_term, &weights.long_term_weights, period);
        for (score, signal) in scores.iter_mut().zip(period_signals(&ordered, period)) {
            score.long_term += w * signal;
        }
    }

    ordered
        .into_iter()
        .map(|row| row.symbol.clone())
        .zip(scores)
        .collect()
}
