use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};

use sector_monitor::config::Config;
use sector_monitor::refresh::build_orchestrator;
use sector_monitor::ui::format::{fmt_cell, fmt_price, fmt_score, fmt_volume, NO_DATA};

/// One refresh, printed as a plain table. Optional first argument: as-of date (YYYY-MM-DD).
#[tokio::main]
async fn main() -> Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    let config = Config::load().context("failed to load config")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let as_of = match std::env::args().nth(1) {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("invalid as-of date '{}', expected YYYY-MM-DD", raw))?,
        None => Local::now().date_naive(),
    };

    let watchlist = config.watchlist();
    let periods = config.periods()?;
    let symbols = watchlist.iter().map(|e| e.symbol.clone()).collect::<Vec<_>>();
    let orchestrator = build_orchestrator(&config)?;

    let table = orchestrator
        .refresh(&symbols, &periods, as_of)
        .await
        .context("refresh failed")?;

    println!("sector snapshot as of {}", table.as_of);
    println!("===========================");

    let mut header = format!("{:<6} {:<24} {:>9}", "ETF", "Sector", "Last");
    for period in &periods {
        header.push_str(&format!(" {:>8}", period.label()));
    }
    header.push_str(&format!(" {:>9} {:>6} {:>6}", "Vol", "Short", "Long"));
    println!("{}", header);

    for row in table.sorted_rows(config.default_sort_key()?) {
        let mut line = format!(
            "{:<6} {:<24} {:>9}",
            row.symbol,
            row.sector.as_deref().unwrap_or(""),
            fmt_price(row.latest_close)
        );
        for period in &periods {
            line.push_str(&format!(" {:>8}", fmt_cell(row.changes.get(period))));
        }
        let score = table.order_flow.get(&row.symbol);
        line.push_str(&format!(
            " {:>9} {:>6} {:>6}",
            fmt_volume(row.latest_volume),
            fmt_score(score.map(|s| s.short_term)),
            fmt_score(score.map(|s| s.long_term))
        ));
        println!("{}", line);
    }
    for (symbol, err) in &table.missing {
        println!("{:<6} {:<24} {:>9}  ({})", symbol, "", NO_DATA, err);
    }

    println!();
    println!("insights");
    println!("--------");
    for insight in &table.insights {
        println!("- {}", insight);
    }

    if let (Some(first), Some(last)) = (table.flow_history.first(), table.flow_history.last()) {
        println!();
        println!(
            "net order flow {}..{} ({} sessions): short {} long {}",
            first.date,
            last.date,
            table.flow_history.len(),
            fmt_score(Some(last.net.short_term)),
            fmt_score(Some(last.net.long_term))
        );
    }

    if !table.indicators.is_empty() {
        println!();
        println!("technicals");
        println!("----------");
        for (symbol, ind) in &table.indicators {
            println!("{:<6} {:>+6.1}  {}", symbol, ind.sentiment_score, ind.overall_label());
        }
    }

    Ok(())
}
