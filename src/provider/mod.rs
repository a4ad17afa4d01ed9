pub mod alpaca;
pub mod yahoo;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};

use crate::config::{ProviderConfig, ProviderKind};
use crate::model::bar::RawBar;
use crate::model::period::Lookback;
use crate::model::symbol::Symbol;

/// Extra calendar days fetched before the longest lookback so the oldest
/// reference date can still carry back to an earlier session.
pub const SPAN_PADDING_DAYS: u64 = 10;

/// Inclusive calendar range of daily history to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistorySpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistorySpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Span ending at `as_of` that covers `lookback` plus padding.
    pub fn covering(as_of: NaiveDate, lookback: Lookback) -> Self {
        let start = lookback
            .reference_date(as_of)
            .and_then(|d| d.checked_sub_days(Days::new(SPAN_PADDING_DAYS)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: as_of }
    }

    /// Same end, start pushed back by `days`.
    pub fn extended_back(self, days: u64) -> Self {
        let start = self
            .start
            .checked_sub_days(Days::new(days))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: self.end }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for HistorySpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Source of daily closes for one symbol. Implementations may return bars in
/// any order and with gaps; the fetcher normalizes them.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn get_history(&self, symbol: &Symbol, span: HistorySpan) -> Result<Vec<RawBar>>;
}

#[async_trait]
impl<P: HistoryProvider + ?Sized> HistoryProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn get_history(&self, symbol: &Symbol, span: HistorySpan) -> Result<Vec<RawBar>> {
        (**self).get_history(symbol, span).await
    }
}

/// Build the configured provider behind a trait object.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn HistoryProvider>> {
    let provider: Arc<dyn HistoryProvider> = match config.kind {
        ProviderKind::Yahoo => Arc::new(yahoo::YahooChartClient::new(
            &config.yahoo_base_url,
            &config.user_agent,
            config.request_timeout(),
        )?),
        ProviderKind::Alpaca => Arc::new(alpaca::AlpacaBarsClient::new(
            &config.alpaca_data_base_url,
            &config.api_key,
            &config.api_secret,
            &config.alpaca_feed,
            config.request_timeout(),
        )?),
    };
    Ok(provider)
}

/// Shorten an error body for log lines.
pub(crate) fn compact_error_body(body: &str) -> String {
    let normalized = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() > 180 {
        let cut: String = normalized.chars().take(180).collect();
        format!("{}...", cut)
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_covers_lookback_with_padding() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let span = HistorySpan::covering(as_of, Lookback::Months(12));
        assert_eq!(span.end, as_of);
        assert_eq!(span.start, NaiveDate::from_ymd_opt(2023, 6, 20).unwrap());
    }

    #[test]
    fn compact_error_body_truncates() {
        let body = "x ".repeat(300);
        let out = compact_error_body(&body);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 183);
        assert_eq!(compact_error_body("  a \n b "), "a b");
    }
}
