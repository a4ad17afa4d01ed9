use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use crate::model::bar::PriceSeries;
use crate::model::symbol::Symbol;
use crate::provider::HistorySpan;

type CacheKey = (Symbol, HistorySpan);

#[derive(Debug)]
struct CacheEntry {
    stored_at: Instant,
    series: Arc<PriceSeries>,
}

/// Short-lived store of normalized series keyed by (symbol, span).
///
/// Entries expire after `ttl`, which is kept strictly below the auto-refresh
/// interval so a timer-driven refresh never reuses data from the previous cycle.
#[derive(Debug)]
pub struct HistoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl HistoryCache {
    pub fn new(ttl: Duration, refresh_interval: Duration) -> Result<Self> {
        if ttl >= refresh_interval {
            bail!(
                "cache ttl ({}s) must be shorter than the refresh interval ({}s)",
                ttl.as_secs(),
                refresh_interval.as_secs()
            );
        }
        Ok(Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, symbol: &Symbol, span: HistorySpan, now: Instant) -> Option<Arc<PriceSeries>> {
        let guard = match self.entries.lock() {
            Ok(g) => g,
            Err(_) => {
                tracing::warn!("history cache lock poisoned; bypassing cache");
                return None;
            }
        };
        let entry = guard.get(&(symbol.clone(), span))?;
        if now.saturating_duration_since(entry.stored_at) < self.ttl {
            Some(entry.series.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, span: HistorySpan, series: Arc<PriceSeries>, now: Instant) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.insert(
                (series.symbol().clone(), span),
                CacheEntry {
                    stored_at: now,
                    series,
                },
            );
        }
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let Ok(mut guard) = self.entries.lock() else {
            return 0;
        };
        let before = guard.len();
        guard.retain(|_, e| now.saturating_duration_since(e.stored_at) < self.ttl);
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bar::RawBar;
    use chrono::NaiveDate;

    fn span() -> HistorySpan {
        HistorySpan::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    fn series(symbol: &str) -> Arc<PriceSeries> {
        Arc::new(PriceSeries::from_raw(
            Symbol::new(symbol),
            vec![RawBar::new(
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                Some(10.0),
                None,
            )],
        ))
    }

    #[test]
    fn rejects_ttl_not_below_interval() {
        assert!(HistoryCache::new(Duration::from_secs(300), Duration::from_secs(300)).is_err());
        assert!(HistoryCache::new(Duration::from_secs(60), Duration::from_secs(300)).is_ok());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = HistoryCache::new(Duration::from_secs(60), Duration::from_secs(300)).unwrap();
        let t0 = Instant::now();
        cache.insert(span(), series("XLK"), t0);

        let sym = Symbol::new("XLK");
        assert!(cache.get(&sym, span(), t0 + Duration::from_secs(59)).is_some());
        assert!(cache.get(&sym, span(), t0 + Duration::from_secs(60)).is_none());
        assert!(cache.get(&Symbol::new("XLF"), span(), t0).is_none());

        assert_eq!(cache.purge_expired(t0 + Duration::from_secs(61)), 1);
        assert!(cache.is_empty());
    }
}
