use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::performance::{OrderFlowScore, PerformanceRow};
use crate::model::symbol::Symbol;

pub const NO_INSIGHTS: &str = "No significant market insights detected.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsightThresholds {
    pub momentum: f64,
    pub bias: f64,
    pub neutral: f64,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            momentum: 0.2,
            bias: 0.5,
            neutral: 0.1,
        }
    }
}

fn label(rows: &BTreeMap<Symbol, PerformanceRow>, symbol: &Symbol) -> String {
    rows.get(symbol)
        .and_then(|r| r.sector.clone())
        .unwrap_or_else(|| symbol.to_string())
}

fn top_by<F>(scores: &BTreeMap<Symbol, OrderFlowScore>, key: F) -> Option<(&Symbol, f64)>
where
    F: Fn(&OrderFlowScore) -> f64,
{
    // BTreeMap order makes ties resolve to the alphabetically first symbol.
    scores
        .iter()
        .map(|(s, score)| (s, key(score)))
        .fold(None, |best, (s, v)| match best {
            Some((_, bv)) if v.partial_cmp(&bv) != Some(Ordering::Greater) => best,
            _ => Some((s, v)),
        })
}

/// Rotation, momentum and overall-bias statements from order-flow scores.
pub fn generate_insights(
    rows: &BTreeMap<Symbol, PerformanceRow>,
    scores: &BTreeMap<Symbol, OrderFlowScore>,
    thresholds: &InsightThresholds,
) -> Vec<String> {
    if scores.is_empty() {
        return vec![NO_INSIGHTS.to_string()];
    }
    let mut insights = Vec::new();

    let short_top = top_by(scores, |s| s.short_term);
    let long_top = top_by(scores, |s| s.long_term);
    if let (Some((short_sym, short_val)), Some((long_sym, long_val))) = (short_top, long_top) {
        let short_label = label(rows, short_sym);
        let long_label = label(rows, long_sym);
        if short_label != long_label {
            insights.push(format!(
                "Market is shifting out of {} (long: {:.2}) into {} (short: {:.2}) in the short term.",
                long_label, long_val, short_label, short_val
            ));
        }
    }

    for (symbol, score) in scores {
        let name = label(rows, symbol);
        if score.short_term > score.long_term + thresholds.momentum {
            insights.push(format!(
                "{} is experiencing accelerating momentum (short: {:.2} > long: {:.2}).",
                name, score.short_term, score.long_term
            ));
        } else if score.short_term < score.long_term - thresholds.momentum {
            insights.push(format!(
                "{} is experiencing reduced momentum (short: {:.2} < long: {:.2}).",
                name, score.short_term, score.long_term
            ));
        }
    }

    let n = scores.len() as f64;
    let avg_short = scores.values().map(|s| s.short_term).sum::<f64>() / n;
    let avg_long = scores.values().map(|s| s.long_term).sum::<f64>() / n;
    let averages = format!("short avg: {:.2}, long avg: {:.2}", avg_short, avg_long);
    if avg_short > thresholds.bias && avg_long > thresholds.bias {
        insights.push(format!(
            "Overall market shows strong bullish flow in both short and long term ({}).",
            averages
        ));
    } else if avg_short < -thresholds.bias && avg_long < -thresholds.bias {
        insights.push(format!(
            "Overall market shows strong bearish flow in both short and long term ({}).",
            averages
        ));
    } else if avg_short.abs() < thresholds.neutral && avg_long.abs() < thresholds.neutral {
        insights.push(format!("Overall flow is neutral ({}).", averages));
    } else if avg_short > avg_long {
        insights.push(format!(
            "Short-term flow is more bullish than long-term, indicating potential recovery ({}).",
            averages
        ));
    } else if avg_short < avg_long {
        insights.push(format!(
            "Short-term flow is more bearish than long-term, indicating potential pullback ({}).",
            averages
        ));
    }

    if insights.is_empty() {
        insights.push(NO_INSIGHTS.to_string());
    }
    insights
}
