use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{Days, Local, NaiveDate, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::cache::HistoryCache;
use crate::config::Config;
use crate::error::DataError;
use crate::event::{AppEvent, RefreshTrigger};
use crate::fetcher::Fetcher;
use crate::history::order_flow_history;
use crate::indicators::{compute_indicators, MIN_SESSIONS_FOR_ALL};
use crate::insights::{generate_insights, InsightThresholds};
use crate::model::performance::{PerformanceRow, PerformanceTable};
use crate::model::period::{Lookback, Period, PeriodTable};
use crate::model::symbol::{SectorEtf, Symbol};
use crate::order_flow::{score_rows, OrderFlowWeights};
use crate::performance::build_row;
use crate::provider::{build_provider, HistoryProvider, HistorySpan};

/// Calendar days that hold `MIN_SESSIONS_FOR_ALL` sessions with room to spare.
const INDICATOR_LOOKBACK_DAYS: u32 = (MIN_SESSIONS_FOR_ALL as u32) * 7 / 5 + 14;

/// Runs one fetch → compute → score → insights pass over the watchlist.
pub struct RefreshOrchestrator<P> {
    fetcher: Fetcher<P>,
    cache: Option<HistoryCache>,
    sectors: BTreeMap<Symbol, String>,
    period_table: PeriodTable,
    weights: OrderFlowWeights,
    thresholds: InsightThresholds,
    flow_history_days: u32,
    indicators: bool,
}

impl<P: HistoryProvider> RefreshOrchestrator<P> {
    pub fn new(fetcher: Fetcher<P>, period_table: PeriodTable) -> Self {
        Self {
            fetcher,
            cache: None,
            sectors: BTreeMap::new(),
            period_table,
            weights: OrderFlowWeights::default(),
            thresholds: InsightThresholds::default(),
            flow_history_days: 0,
            indicators: false,
        }
    }

    pub fn with_cache(mut self, cache: HistoryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_sectors(mut self, etfs: &[SectorEtf]) -> Self {
        self.sectors = etfs
            .iter()
            .map(|e| (e.symbol.clone(), e.sector.clone()))
            .collect();
        self
    }

    pub fn with_order_flow(mut self, weights: OrderFlowWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_thresholds(mut self, thresholds: InsightThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Replay order flow over the last `flow_history_days` (0 = off) and
    /// compute technical indicators per symbol.
    pub fn with_analytics(mut self, flow_history_days: u32, indicators: bool) -> Self {
        self.flow_history_days = flow_history_days;
        self.indicators = indicators;
        self
    }

    pub fn fetcher(&self) -> &Fetcher<P> {
        &self.fetcher
    }

    pub fn cache(&self) -> Option<&HistoryCache> {
        self.cache.as_ref()
    }

    /// Build a fresh performance table for `symbols` as of `as_of`.
    ///
    /// Per-symbol failures land in `PerformanceTable::missing` and per-cell
    /// failures stay inside each row; only a total provider outage is returned
    /// as an error.
    pub async fn refresh(
        &self,
        symbols: &[Symbol],
        periods: &[Period],
        as_of: NaiveDate,
    ) -> Result<PerformanceTable, DataError> {
        let mut lookback = self
            .period_table
            .max_lookback(periods)
            .unwrap_or(Lookback::Days(1));
        if self.indicators && lookback.approx_days() < INDICATOR_LOOKBACK_DAYS {
            lookback = Lookback::Days(INDICATOR_LOOKBACK_DAYS);
        }
        let span = HistorySpan::covering(as_of, lookback)
            .extended_back(u64::from(self.flow_history_days));

        if let Some(cache) = &self.cache {
            let purged = cache.purge_expired(Instant::now());
            if purged > 0 {
                tracing::debug!(purged, "expired history cache entries dropped");
            }
        }

        let outcome = self
            .fetcher
            .fetch_with_cache(symbols, span, self.cache.as_ref())
            .await?;

        let rows: BTreeMap<Symbol, PerformanceRow> = outcome
            .series
            .iter()
            .map(|(symbol, series)| {
                let sector = self.sectors.get(symbol).map(String::as_str);
                let row = build_row(series, sector, periods, &self.period_table, as_of);
                (symbol.clone(), row)
            })
            .collect();

        let order_flow = score_rows(&rows, periods, &self.weights);
        let insights = generate_insights(&rows, &order_flow, &self.thresholds);

        let flow_history = match as_of.checked_sub_days(Days::new(u64::from(self.flow_history_days))) {
            Some(start) if self.flow_history_days > 0 => order_flow_history(
                &outcome.series,
                periods,
                &self.period_table,
                &self.weights,
                start,
                as_of,
            ),
            _ => Vec::new(),
        };
        let indicators = if self.indicators {
            outcome
                .series
                .iter()
                .filter_map(|(symbol, series)| {
                    compute_indicators(series).map(|ind| (symbol.clone(), ind))
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        tracing::info!(
            as_of = %as_of,
            rows = rows.len(),
            missing = outcome.failures.len(),
            history_days = flow_history.len(),
            "performance table built"
        );

        Ok(PerformanceTable {
            as_of,
            generated_at: Utc::now(),
            periods: periods.to_vec(),
            rows,
            missing: outcome.failures,
            order_flow,
            insights,
            flow_history,
            indicators,
        })
    }
}

/// Wire provider, cache, watchlist sectors and scoring settings from `config`.
pub fn build_orchestrator(config: &Config) -> Result<RefreshOrchestrator<Arc<dyn HistoryProvider>>> {
    let provider = build_provider(&config.provider)?;
    let fetcher = Fetcher::new(provider, config.provider.max_concurrent_requests);
    let cache = HistoryCache::new(config.refresh.cache_ttl(), config.refresh.interval())?;
    Ok(RefreshOrchestrator::new(fetcher, config.period_table()?)
        .with_cache(cache)
        .with_sectors(&config.watchlist())
        .with_order_flow(config.order_flow_weights()?)
        .with_thresholds(config.insight_thresholds())
        .with_analytics(config.analytics.flow_history_days, config.analytics.indicators))
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Timer- and key-driven refresh loop. One cycle runs at a time; manual
/// triggers that queue up while a cycle is in flight collapse into nothing.
pub struct RefreshScheduler<P> {
    orchestrator: Arc<RefreshOrchestrator<P>>,
    symbols: Vec<Symbol>,
    periods: Vec<Period>,
    interval: Duration,
    timeout: Duration,
    today: fn() -> NaiveDate,
}

impl<P: HistoryProvider + 'static> RefreshScheduler<P> {
    pub fn new(
        orchestrator: Arc<RefreshOrchestrator<P>>,
        symbols: Vec<Symbol>,
        periods: Vec<Period>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            symbols,
            periods,
            interval,
            timeout,
            today: local_today,
        }
    }

    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub async fn run(
        self,
        app_tx: mpsc::Sender<AppEvent>,
        mut manual_rx: mpsc::Receiver<()>,
        mut auto_rx: watch::Receiver<bool>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        let mut auto_enabled = *auto_rx.borrow();
        self.run_cycle(RefreshTrigger::Startup, &app_tx).await;
        ticker.reset();

        loop {
            tokio::select! {
                _ = ticker.tick(), if auto_enabled => {
                    self.run_cycle(RefreshTrigger::Timer, &app_tx).await;
                    drain_pending(&mut manual_rx);
                }
                msg = manual_rx.recv() => {
                    if msg.is_none() {
                        tracing::info!("manual refresh channel closed, scheduler exiting");
                        break;
                    }
                    self.run_cycle(RefreshTrigger::Manual, &app_tx).await;
                    drain_pending(&mut manual_rx);
                    ticker.reset();
                }
                changed = auto_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    auto_enabled = *auto_rx.borrow_and_update();
                    if auto_enabled {
                        ticker.reset();
                    }
                    tracing::info!(auto_refresh = auto_enabled, "auto-refresh toggled");
                    let _ = app_tx.send(AppEvent::AutoRefreshChanged(auto_enabled)).await;
                }
                _ = shutdown_rx.changed() => {
                    tracing::info!("refresh scheduler shutting down");
                    break;
                }
            }
        }
    }

    async fn run_cycle(&self, trigger: RefreshTrigger, app_tx: &mpsc::Sender<AppEvent>) {
        let as_of = (self.today)();
        let _ = app_tx
            .send(AppEvent::RefreshStarted {
                trigger,
                at: Utc::now(),
            })
            .await;

        let started = Instant::now();
        let result = tokio::time::timeout(
            self.timeout,
            self.orchestrator.refresh(&self.symbols, &self.periods, as_of),
        )
        .await;

        let event = match result {
            Ok(Ok(table)) => {
                tracing::info!(
                    trigger = %trigger,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    rows = table.rows.len(),
                    "refresh complete"
                );
                AppEvent::RefreshCompleted(Arc::new(table))
            }
            Ok(Err(e)) => {
                tracing::error!(trigger = %trigger, error = %e, "refresh failed");
                AppEvent::RefreshFailed {
                    error: e.to_string(),
                    at: Utc::now(),
                }
            }
            Err(_) => {
                tracing::error!(
                    trigger = %trigger,
                    timeout_secs = self.timeout.as_secs(),
                    "refresh timed out"
                );
                AppEvent::RefreshFailed {
                    error: format!("refresh timed out after {}s", self.timeout.as_secs()),
                    at: Utc::now(),
                }
            }
        };
        let _ = app_tx.send(event).await;
    }
}

fn drain_pending(manual_rx: &mut mpsc::Receiver<()>) {
    let mut dropped = 0usize;
    while manual_rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        tracing::debug!(dropped, "manual refresh requests coalesced");
    }
}
