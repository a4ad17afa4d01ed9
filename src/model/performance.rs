use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::DataError;
use crate::history::FlowHistoryPoint;
use crate::indicators::TechnicalIndicators;
use crate::model::period::Period;
use crate::model::symbol::Symbol;

/// One defined performance cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodReturn {
    pub period: Period,
    pub reference_date: NaiveDate,
    pub reference_close: f64,
    pub change_pct: f64,
    /// Volume summed from the reference bar through the latest bar.
    pub volume: u64,
    pub avg_volume: f64,
}

pub type PeriodResult = Result<PeriodReturn, DataError>;

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceRow {
    pub symbol: Symbol,
    pub sector: Option<String>,
    pub latest_close: Option<f64>,
    pub latest_date: Option<NaiveDate>,
    pub latest_volume: u64,
    pub changes: BTreeMap<Period, PeriodResult>,
}

impl PerformanceRow {
    pub fn change_pct(&self, period: Period) -> Option<f64> {
        self.changes
            .get(&period)
            .and_then(|r| r.as_ref().ok())
            .map(|r| r.change_pct)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrderFlowScore {
    pub short_term: f64,
    pub long_term: f64,
}

/// Column the dashboard orders rows by, always descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Change(Period),
    ShortTermFlow,
    LongTermFlow,
}

impl SortKey {
    pub fn label(self) -> String {
        match self {
            SortKey::Change(p) => format!("{} change", p),
            SortKey::ShortTermFlow => "short-term flow".to_string(),
            SortKey::LongTermFlow => "long-term flow".to_string(),
        }
    }

    /// Next key in the cycle `LongTermFlow → ShortTermFlow → periods... → LongTermFlow`.
    pub fn next(self, periods: &[Period]) -> SortKey {
        match self {
            SortKey::LongTermFlow => SortKey::ShortTermFlow,
            SortKey::ShortTermFlow => periods
                .first()
                .map(|p| SortKey::Change(*p))
                .unwrap_or(SortKey::LongTermFlow),
            SortKey::Change(current) => periods
                .iter()
                .position(|p| *p == current)
                .and_then(|i| periods.get(i + 1))
                .map(|p| SortKey::Change(*p))
                .unwrap_or(SortKey::LongTermFlow),
        }
    }
}

/// Output of one successful refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceTable {
    pub as_of: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub periods: Vec<Period>,
    pub rows: BTreeMap<Symbol, PerformanceRow>,
    /// Symbols that produced no series this cycle, with their `SymbolUnavailable` error.
    pub missing: BTreeMap<Symbol, DataError>,
    pub order_flow: BTreeMap<Symbol, OrderFlowScore>,
    pub insights: Vec<String>,
    /// Daily replay of the order-flow scores, oldest first. Empty when disabled.
    pub flow_history: Vec<FlowHistoryPoint>,
    pub indicators: BTreeMap<Symbol, TechnicalIndicators>,
}

impl PerformanceTable {
    pub fn sort_value(&self, row: &PerformanceRow, key: SortKey) -> Option<f64> {
        match key {
            SortKey::Change(p) => row.change_pct(p),
            SortKey::ShortTermFlow => self.order_flow.get(&row.symbol).map(|s| s.short_term),
            SortKey::LongTermFlow => self.order_flow.get(&row.symbol).map(|s| s.long_term),
        }
    }

    /// Rows ordered by `key` descending; rows without a value go last, ties by symbol.
    pub fn sorted_rows(&self, key: SortKey) -> Vec<&PerformanceRow> {
        let mut rows: Vec<&PerformanceRow> = self.rows.values().collect();
        rows.sort_by(|a, b| {
            match (self.sort_value(a, key), self.sort_value(b, key)) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(|| a.symbol.cmp(&b.symbol))
        });
        rows
    }
}
