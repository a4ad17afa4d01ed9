use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::Event;
use tokio::sync::{mpsc, watch};

use sector_monitor::config::Config;
use sector_monitor::event::AppEvent;
use sector_monitor::input::{parse_main_command, UiCommand};
use sector_monitor::refresh::{build_orchestrator, RefreshScheduler};
use sector_monitor::ui::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set SECTOR_MONITOR_CONFIG or create config/default.toml");
            std::process::exit(1);
        }
    };

    // Log to file so it doesn't interfere with the TUI
    let log_file = std::fs::File::create(&config.logging.file)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    let watchlist = config.watchlist();
    let periods = config.periods()?;
    let symbols = watchlist.iter().map(|e| e.symbol.clone()).collect::<Vec<_>>();

    tracing::info!(
        provider = ?config.provider.kind,
        symbols = symbols.len(),
        periods = periods.len(),
        auto_refresh = config.refresh.auto_refresh,
        interval_secs = config.refresh.interval_secs,
        "Starting sector-monitor"
    );

    let orchestrator = Arc::new(build_orchestrator(&config)?);

    // Channels
    let (app_tx, mut app_rx) = mpsc::channel::<AppEvent>(64);
    let (manual_tx, manual_rx) = mpsc::channel::<()>(4);
    let (auto_tx, auto_rx) = watch::channel(config.refresh.auto_refresh);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = RefreshScheduler::new(
        orchestrator,
        symbols,
        periods.clone(),
        config.refresh.interval(),
        config.refresh.timeout(),
    );
    let scheduler_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        scheduler
            .run(app_tx, manual_rx, auto_rx, scheduler_shutdown)
            .await;
    });

    // Ctrl+C handler
    let ctrl_c_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received");
        let _ = ctrl_c_shutdown.send(true);
    });

    // TUI main loop
    let mut terminal = ratatui::init();
    let mut app_state = AppState::new(
        watchlist,
        periods,
        config.default_sort_key()?,
        config.refresh.auto_refresh,
        config.refresh.interval_secs,
    )
    .with_max_log_messages(config.ui.log_lines);
    app_state.push_log(format!(
        "sector-monitor started | {} symbols | {:?}",
        app_state.watchlist.len(),
        config.provider.kind
    ));

    let poll_rate = Duration::from_millis(config.ui.poll_rate_ms.max(10));
    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| ui::render(frame, &app_state)) {
            break Err(e.into());
        }

        match crossterm::event::poll(poll_rate) {
            Ok(true) => {
                if let Ok(Event::Key(key)) = crossterm::event::read() {
                    match parse_main_command(&key.code) {
                        Some(UiCommand::Quit) => {
                            tracing::info!("User quit");
                            let _ = shutdown_tx.send(true);
                            break Ok(());
                        }
                        Some(UiCommand::Refresh) => {
                            if manual_tx.try_send(()).is_err() {
                                app_state.push_log("Refresh already queued".to_string());
                            }
                        }
                        Some(UiCommand::ToggleAutoRefresh) => {
                            auto_tx.send_modify(|enabled| *enabled = !*enabled);
                        }
                        Some(UiCommand::CycleSort) => {
                            app_state.cycle_sort();
                            tracing::debug!(sort = %app_state.sort_key.label(), "sort changed");
                        }
                        Some(UiCommand::ToggleInsights) => {
                            app_state.show_insights = !app_state.show_insights;
                        }
                        Some(UiCommand::ToggleIndicators) => {
                            app_state.show_indicators = !app_state.show_indicators;
                        }
                        Some(UiCommand::CycleHistory) => app_state.cycle_history(),
                        Some(UiCommand::ScrollUp) => app_state.scroll_up(),
                        Some(UiCommand::ScrollDown) => app_state.scroll_down(),
                        None => {}
                    }
                }
            }
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }

        // Drain events from channel
        while let Ok(evt) = app_rx.try_recv() {
            app_state.apply(evt);
        }

        if *shutdown_rx.borrow() {
            break Ok(());
        }
    };

    ratatui::restore();
    tracing::info!("Shutdown complete");
    println!("Goodbye! Check {} for details.", config.logging.file);
    result
}
