use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};

use crate::cache::HistoryCache;
use crate::error::DataError;
use crate::model::bar::PriceSeries;
use crate::model::symbol::Symbol;
use crate::provider::{HistoryProvider, HistorySpan};

/// Series that were fetched, plus the symbols that could not be.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub series: BTreeMap<Symbol, Arc<PriceSeries>>,
    pub failures: BTreeMap<Symbol, DataError>,
}

enum SymbolFetch {
    Cached(Arc<PriceSeries>),
    Fetched(Arc<PriceSeries>),
    Empty,
    ProviderError(String),
}

/// Pulls and normalizes daily history for a set of symbols.
pub struct Fetcher<P> {
    provider: P,
    max_concurrency: usize,
}

impl<P: HistoryProvider> Fetcher<P> {
    pub fn new(provider: P, max_concurrency: usize) -> Self {
        Self {
            provider,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn fetch(&self, symbols: &[Symbol], span: HistorySpan) -> Result<FetchOutcome, DataError> {
        self.fetch_with_cache(symbols, span, None).await
    }

    /// Fetch every symbol, tolerating per-symbol failures.
    ///
    /// Returns `FetchUnavailable` only when the provider errored for every
    /// requested symbol. Symbols whose normalized series is empty are reported
    /// as `SymbolUnavailable` without counting as a provider error.
    pub async fn fetch_with_cache(
        &self,
        symbols: &[Symbol],
        span: HistorySpan,
        cache: Option<&HistoryCache>,
    ) -> Result<FetchOutcome, DataError> {
        let unique: BTreeSet<Symbol> = symbols.iter().filter(|s| !s.is_empty()).cloned().collect();
        let attempted = unique.len();
        let provider = &self.provider;

        let results: Vec<(Symbol, SymbolFetch)> = stream::iter(unique)
            .map(move |symbol| async move {
                if let Some(series) = cache.and_then(|c| c.get(&symbol, span, Instant::now())) {
                    return (symbol, SymbolFetch::Cached(series));
                }
                let outcome = match provider.get_history(&symbol, span).await {
                    Ok(raw) => {
                        let series = PriceSeries::from_raw(symbol.clone(), raw);
                        if series.is_empty() {
                            SymbolFetch::Empty
                        } else {
                            SymbolFetch::Fetched(Arc::new(series))
                        }
                    }
                    Err(e) => SymbolFetch::ProviderError(format!("{:#}", e)),
                };
                (symbol, outcome)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut outcome = FetchOutcome::default();
        let mut provider_errors = 0usize;
        let mut last_error = String::new();
        for (symbol, result) in results {
            match result {
                SymbolFetch::Cached(series) => {
                    tracing::debug!(symbol = %symbol, bars = series.len(), "history served from cache");
                    outcome.series.insert(symbol, series);
                }
                SymbolFetch::Fetched(series) => {
                    tracing::debug!(symbol = %symbol, bars = series.len(), "history fetched");
                    if let Some(cache) = cache {
                        cache.insert(span, series.clone(), Instant::now());
                    }
                    outcome.series.insert(symbol, series);
                }
                SymbolFetch::Empty => {
                    tracing::warn!(symbol = %symbol, span = %span, "provider returned no usable bars");
                    outcome.failures.insert(
                        symbol.clone(),
                        DataError::SymbolUnavailable {
                            symbol,
                            reason: "no usable bars in requested span".to_string(),
                        },
                    );
                }
                SymbolFetch::ProviderError(reason) => {
                    tracing::warn!(symbol = %symbol, error = %reason, provider = provider.name(), "history fetch failed");
                    provider_errors += 1;
                    last_error = reason.clone();
                    outcome
                        .failures
                        .insert(symbol.clone(), DataError::SymbolUnavailable { symbol, reason });
                }
            }
        }

        if attempted > 0 && provider_errors == attempted {
            tracing::error!(attempted, provider = provider.name(), "provider unavailable for every symbol");
            return Err(DataError::FetchUnavailable {
                attempted,
                last_error,
            });
        }

        tracing::info!(
            attempted,
            fetched = outcome.series.len(),
            failed = outcome.failures.len(),
            span = %span,
            "fetch cycle complete"
        );
        Ok(outcome)
    }
}
