use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{mpsc, watch};

use sector_monitor::error::DataError;
use sector_monitor::event::{AppEvent, RefreshTrigger};
use sector_monitor::fetcher::Fetcher;
use sector_monitor::model::bar::RawBar;
use sector_monitor::model::period::{Period, PeriodTable};
use sector_monitor::model::symbol::{SectorEtf, Symbol};
use sector_monitor::provider::{HistoryProvider, HistorySpan};
use sector_monitor::refresh::{RefreshOrchestrator, RefreshScheduler};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn today() -> NaiveDate {
    d(4)
}

/// Serves three sessions for A and C; B always fails.
struct PartialProvider;

#[async_trait]
impl HistoryProvider for PartialProvider {
    fn name(&self) -> &str {
        "partial"
    }

    async fn get_history(&self, symbol: &Symbol, span: HistorySpan) -> Result<Vec<RawBar>> {
        if symbol.as_str() == "B" {
            bail!("connection reset");
        }
        assert!(span.end >= d(4));
        let base = if symbol.as_str() == "A" { 100.0 } else { 50.0 };
        Ok(vec![
            RawBar::new(d(2), Some(base), Some(1_000)),
            RawBar::new(d(3), Some(base * 1.02), Some(2_000)),
            RawBar::new(d(4), Some(base * 0.99), Some(3_000)),
        ])
    }
}

struct DownProvider;

#[async_trait]
impl HistoryProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    async fn get_history(&self, _symbol: &Symbol, _span: HistorySpan) -> Result<Vec<RawBar>> {
        bail!("503 service unavailable")
    }
}

struct SlowProvider;

#[async_trait]
impl HistoryProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn get_history(&self, _symbol: &Symbol, _span: HistorySpan) -> Result<Vec<RawBar>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

/// Takes longer than the refresh interval and records how many calls overlap.
struct LaggingProvider {
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl HistoryProvider for LaggingProvider {
    fn name(&self) -> &str {
        "lagging"
    }

    async fn get_history(&self, _symbol: &Symbol, _span: HistorySpan) -> Result<Vec<RawBar>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![
            RawBar::new(d(3), Some(100.0), Some(1_000)),
            RawBar::new(d(4), Some(101.0), Some(1_000)),
        ])
    }
}

fn symbols() -> Vec<Symbol> {
    vec![Symbol::new("A"), Symbol::new("B"), Symbol::new("C")]
}

async fn next_event(rx: &mut mpsc::Receiver<AppEvent>) -> AppEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event should arrive")
        .expect("channel should stay open")
}

#[tokio::test]
async fn partial_failure_marks_symbol_missing_and_keeps_others() {
    let orchestrator = RefreshOrchestrator::new(Fetcher::new(PartialProvider, 3), PeriodTable::default())
        .with_sectors(&[SectorEtf::new("A", "Alpha"), SectorEtf::new("C", "Gamma")]);

    let table = orchestrator
        .refresh(&symbols(), &[Period::OneDay, Period::OneMonth], d(4))
        .await
        .expect("one failing symbol must not fail the cycle");

    assert_eq!(table.as_of, d(4));
    assert_eq!(table.rows.len(), 2);
    assert!(table.missing.contains_key(&Symbol::new("B")));
    assert!(matches!(
        table.missing[&Symbol::new("B")],
        DataError::SymbolUnavailable { .. }
    ));

    let a = &table.rows[&Symbol::new("A")];
    assert_eq!(a.sector.as_deref(), Some("Alpha"));
    assert!((a.change_pct(Period::OneDay).unwrap() - (-2.941_176_470_588_235)).abs() < 1e-9);
    assert_eq!(a.change_pct(Period::OneMonth), None);

    assert_eq!(table.order_flow.len(), 2);
    assert!(!table.insights.is_empty());
}

#[tokio::test]
async fn analytics_add_flow_history_and_indicators() {
    let plain = RefreshOrchestrator::new(Fetcher::new(PartialProvider, 3), PeriodTable::default());
    let table = plain.refresh(&symbols(), &[Period::OneDay], d(4)).await.unwrap();
    assert!(table.flow_history.is_empty());
    assert!(table.indicators.is_empty());

    let orchestrator = RefreshOrchestrator::new(Fetcher::new(PartialProvider, 3), PeriodTable::default())
        .with_analytics(10, true);
    let table = orchestrator
        .refresh(&symbols(), &[Period::OneDay], d(4))
        .await
        .unwrap();

    let dates: Vec<NaiveDate> = table.flow_history.iter().map(|p| p.date).collect();
    assert_eq!(dates, vec![d(3), d(4)]);
    let last = table.flow_history.last().unwrap();
    assert_eq!(last.scores, table.order_flow);
    assert_eq!(table.indicators.len(), 2);
    assert_eq!(table.indicators[&Symbol::new("A")].latest_close, 99.0);
}

#[tokio::test]
async fn total_outage_propagates_fetch_unavailable() {
    let orchestrator = RefreshOrchestrator::new(Fetcher::new(DownProvider, 3), PeriodTable::default());
    let err = orchestrator
        .refresh(&symbols(), &Period::ALL, d(4))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::FetchUnavailable { attempted: 3, .. }));
}

#[tokio::test]
async fn scheduler_publishes_startup_and_manual_cycles() {
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        Fetcher::new(PartialProvider, 2),
        PeriodTable::default(),
    ));
    let scheduler = RefreshScheduler::new(
        orchestrator,
        symbols(),
        vec![Period::OneDay],
        Duration::from_secs(3600),
        Duration::from_secs(5),
    )
    .with_clock(today);

    let (app_tx, mut app_rx) = mpsc::channel(16);
    let (manual_tx, manual_rx) = mpsc::channel(4);
    let (auto_tx, auto_rx) = watch::channel(false);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(app_tx, manual_rx, auto_rx, shutdown_rx));

    match next_event(&mut app_rx).await {
        AppEvent::RefreshStarted { trigger, .. } => assert_eq!(trigger, RefreshTrigger::Startup),
        other => panic!("unexpected event {:?}", other),
    }
    match next_event(&mut app_rx).await {
        AppEvent::RefreshCompleted(table) => {
            assert_eq!(table.as_of, d(4));
            assert_eq!(table.rows.len(), 2);
        }
        other => panic!("unexpected event {:?}", other),
    }

    manual_tx.send(()).await.unwrap();
    match next_event(&mut app_rx).await {
        AppEvent::RefreshStarted { trigger, .. } => assert_eq!(trigger, RefreshTrigger::Manual),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(matches!(next_event(&mut app_rx).await, AppEvent::RefreshCompleted(_)));

    auto_tx.send(true).unwrap();
    assert!(matches!(
        next_event(&mut app_rx).await,
        AppEvent::AutoRefreshChanged(true)
    ));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop")
        .unwrap();
}

#[tokio::test]
async fn scheduler_reports_timeout_as_failed_cycle() {
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        Fetcher::new(SlowProvider, 2),
        PeriodTable::default(),
    ));
    let scheduler = RefreshScheduler::new(
        orchestrator,
        symbols(),
        vec![Period::OneDay],
        Duration::from_secs(3600),
        Duration::from_millis(50),
    )
    .with_clock(today);

    let (app_tx, mut app_rx) = mpsc::channel(16);
    let (_manual_tx, manual_rx) = mpsc::channel(4);
    let (_auto_tx, auto_rx) = watch::channel(false);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(app_tx, manual_rx, auto_rx, shutdown_rx));

    assert!(matches!(
        next_event(&mut app_rx).await,
        AppEvent::RefreshStarted { .. }
    ));
    match next_event(&mut app_rx).await {
        AppEvent::RefreshFailed { error, .. } => assert!(error.contains("timed out")),
        other => panic!("unexpected event {:?}", other),
    }

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn timer_cycles_never_overlap_when_provider_is_slower_than_interval() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let provider = LaggingProvider {
        delay: Duration::from_millis(150),
        in_flight: in_flight.clone(),
        peak: peak.clone(),
    };
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        Fetcher::new(provider, 1),
        PeriodTable::default(),
    ));
    let scheduler = RefreshScheduler::new(
        orchestrator,
        vec![Symbol::new("XLK")],
        vec![Period::OneDay],
        Duration::from_millis(100),
        Duration::from_secs(5),
    )
    .with_clock(today);

    let (app_tx, mut app_rx) = mpsc::channel(16);
    let (_manual_tx, manual_rx) = mpsc::channel(4);
    let (_auto_tx, auto_rx) = watch::channel(true);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(app_tx, manual_rx, auto_rx, shutdown_rx));

    let mut triggers = Vec::new();
    for _ in 0..4 {
        match next_event(&mut app_rx).await {
            AppEvent::RefreshStarted { trigger, .. } => triggers.push(trigger),
            other => panic!("expected a cycle start, got {:?}", other),
        }
        match next_event(&mut app_rx).await {
            AppEvent::RefreshCompleted(table) => assert_eq!(table.rows.len(), 1),
            other => panic!("expected the cycle to complete before the next one, got {:?}", other),
        }
    }

    assert_eq!(
        triggers,
        vec![
            RefreshTrigger::Startup,
            RefreshTrigger::Timer,
            RefreshTrigger::Timer,
            RefreshTrigger::Timer,
        ]
    );
    assert_eq!(peak.load(Ordering::SeqCst), 1);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}
