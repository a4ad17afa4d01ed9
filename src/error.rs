use chrono::NaiveDate;
use thiserror::Error;

use crate::model::period::Period;
use crate::model::symbol::Symbol;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("provider API error (status {status}): {msg}")]
    ProviderApi { status: u16, msg: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of a refresh cycle, from whole-cycle outages down to single cells.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("market data provider unavailable for all {attempted} symbols: {last_error}")]
    FetchUnavailable { attempted: usize, last_error: String },

    #[error("no data for {symbol}: {reason}")]
    SymbolUnavailable { symbol: Symbol, reason: String },

    /// `reference_date` is `None` when the lookback runs off the calendar.
    #[error("insufficient history for {period}{}", reference_suffix(.reference_date))]
    InsufficientHistory {
        period: Period,
        reference_date: Option<NaiveDate>,
    },

    #[error("invalid price data on {date}: close {close}")]
    InvalidPriceData { date: NaiveDate, close: f64 },
}

fn reference_suffix(reference_date: &Option<NaiveDate>) -> String {
    reference_date
        .map(|d| format!(" (reference {})", d))
        .unwrap_or_default()
}

impl DataError {
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(self, DataError::FetchUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_history_message_omits_unknown_reference() {
        let dated = DataError::InsufficientHistory {
            period: Period::OneDay,
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 3),
        };
        assert_eq!(dated.to_string(), "insufficient history for 1d (reference 2024-01-03)");

        let undated = DataError::InsufficientHistory {
            period: Period::OneYear,
            reference_date: None,
        };
        assert_eq!(undated.to_string(), "insufficient history for 1y");
    }
}
