use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::insights::InsightThresholds;
use crate::model::performance::SortKey;
use crate::model::period::{parse_lookback, Lookback, Period, PeriodTable};
use crate::model::symbol::{default_sector_etfs, SectorEtf, Symbol};
use crate::order_flow::OrderFlowWeights;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "SECTOR_MONITOR_CONFIG";
const MAX_FLOW_HISTORY_DAYS: u32 = 3 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    /// `None` when the table is omitted; an explicit empty list is rejected.
    #[serde(default)]
    pub watchlist: Option<Vec<WatchlistEntry>>,
    #[serde(default)]
    pub periods: PeriodsConfig,
    #[serde(default)]
    pub order_flow: OrderFlowConfig,
    #[serde(default)]
    pub insights: InsightsConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Yahoo,
    Alpaca,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default = "default_yahoo_base_url")]
    pub yahoo_base_url: String,
    #[serde(default = "default_alpaca_data_base_url")]
    pub alpaca_data_base_url: String,
    #[serde(default = "default_alpaca_feed")]
    pub alpaca_feed: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(skip)]
    pub api_key: String,
    #[serde(skip)]
    pub api_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub sector: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeriodsConfig {
    #[serde(default = "default_enabled_periods")]
    pub enabled: Vec<String>,
    /// Lookback overrides keyed by period label, e.g. `"5d" = "7d"`.
    #[serde(default)]
    pub offsets: BTreeMap<String, String>,
}

impl Default for PeriodsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_periods(),
            offsets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderFlowConfig {
    #[serde(default = "default_short_term_periods")]
    pub short_term: Vec<String>,
    #[serde(default = "default_long_term_periods")]
    pub long_term: Vec<String>,
    #[serde(default)]
    pub short_term_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub long_term_weights: BTreeMap<String, f64>,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self {
            short_term: default_short_term_periods(),
            long_term: default_long_term_periods(),
            short_term_weights: BTreeMap::new(),
            long_term_weights: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightsConfig {
    #[serde(default = "default_momentum_threshold")]
    pub momentum_threshold: f64,
    #[serde(default = "default_bias_threshold")]
    pub bias_threshold: f64,
    #[serde(default = "default_neutral_threshold")]
    pub neutral_threshold: f64,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            momentum_threshold: default_momentum_threshold(),
            bias_threshold: default_bias_threshold(),
            neutral_threshold: default_neutral_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default)]
    pub auto_refresh: bool,
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_refresh_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            auto_refresh: false,
            interval_secs: default_refresh_interval_secs(),
            timeout_secs: default_refresh_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Calendar days of daily order-flow history to replay; 0 turns it off.
    #[serde(default = "default_flow_history_days")]
    pub flow_history_days: u32,
    #[serde(default = "default_true")]
    pub indicators: bool,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            flow_history_days: default_flow_history_days(),
            indicators: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_poll_rate_ms")]
    pub poll_rate_ms: u64,
    #[serde(default = "default_log_lines")]
    pub log_lines: usize,
    #[serde(default = "default_sort")]
    pub default_sort: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            poll_rate_ms: default_poll_rate_ms(),
            log_lines: default_log_lines(),
            default_sort: default_sort(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_yahoo_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}
fn default_alpaca_data_base_url() -> String {
    "https://data.alpaca.markets".to_string()
}
fn default_alpaca_feed() -> String {
    "iex".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; sector-monitor/0.1)".to_string()
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_max_concurrent_requests() -> usize {
    4
}
fn default_enabled_periods() -> Vec<String> {
    Period::ALL.iter().map(|p| p.label().to_string()).collect()
}
fn default_short_term_periods() -> Vec<String> {
    vec!["1d".to_string(), "5d".to_string()]
}
fn default_long_term_periods() -> Vec<String> {
    ["1mo", "3mo", "6mo", "1y"].iter().map(|s| s.to_string()).collect()
}
fn default_momentum_threshold() -> f64 {
    0.2
}
fn default_bias_threshold() -> f64 {
    0.5
}
fn default_neutral_threshold() -> f64 {
    0.1
}
fn default_refresh_interval_secs() -> u64 {
    300
}
fn default_refresh_timeout_secs() -> u64 {
    60
}
fn default_cache_ttl_secs() -> u64 {
    60
}
fn default_flow_history_days() -> u32 {
    365
}
fn default_true() -> bool {
    true
}
fn default_poll_rate_ms() -> u64 {
    200
}
fn default_log_lines() -> usize {
    200
}
fn default_sort() -> String {
    "long".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> String {
    "sector-monitor.log".to_string()
}

fn parse_period_list(labels: &[String], field: &str) -> Result<Vec<Period>> {
    let mut out = Vec::with_capacity(labels.len());
    for label in labels {
        let period: Period = label
            .parse()
            .with_context(|| format!("{} contains an invalid period", field))?;
        if !out.contains(&period) {
            out.push(period);
        }
    }
    Ok(out)
}

fn parse_weights(raw: &BTreeMap<String, f64>, field: &str) -> Result<HashMap<Period, f64>> {
    let mut out = HashMap::with_capacity(raw.len());
    for (label, weight) in raw {
        let period: Period = label
            .parse()
            .with_context(|| format!("{} contains an invalid period", field))?;
        if !weight.is_finite() {
            bail!("{}.{} must be a finite number", field, label);
        }
        out.insert(period, *weight);
    }
    Ok(out)
}

/// Parse the dashboard's default sort column: "long", "short" or a period label.
pub fn parse_sort_key(s: &str) -> Result<SortKey> {
    match s.trim().to_ascii_lowercase().as_str() {
        "long" | "long_term" => Ok(SortKey::LongTermFlow),
        "short" | "short_term" => Ok(SortKey::ShortTermFlow),
        other => {
            let period: Period = other
                .parse()
                .with_context(|| format!("invalid sort key '{}'", s))?;
            Ok(SortKey::Change(period))
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::from_path(&config_path)?;

        if config.provider.kind == ProviderKind::Alpaca {
            config.provider.api_key = std::env::var("ALPACA_API_KEY")
                .context("ALPACA_API_KEY not set in .env or environment")?;
            config.provider.api_secret = std::env::var("ALPACA_API_SECRET")
                .context("ALPACA_API_SECRET not set in .env or environment")?;
        }
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("invalid TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.watchlist.as_ref().is_some_and(Vec::is_empty) {
            bail!("watchlist is empty; omit it to use the default sector ETFs");
        }
        let watchlist = self.watchlist();
        let mut seen: Vec<&Symbol> = Vec::with_capacity(watchlist.len());
        for etf in &watchlist {
            if etf.symbol.is_empty() {
                bail!("watchlist contains an empty symbol");
            }
            if seen.contains(&&etf.symbol) {
                bail!("watchlist contains duplicate symbol {}", etf.symbol);
            }
            seen.push(&etf.symbol);
        }

        if self.periods()?.is_empty() {
            bail!("periods.enabled must list at least one period");
        }
        self.period_table()?;
        self.order_flow_weights()?;
        self.default_sort_key()?;

        if self.refresh.interval_secs == 0 {
            bail!("refresh.interval_secs must be > 0");
        }
        if self.refresh.timeout_secs == 0 {
            bail!("refresh.timeout_secs must be > 0");
        }
        if self.refresh.cache_ttl_secs >= self.refresh.interval_secs {
            bail!(
                "refresh.cache_ttl_secs ({}) must be shorter than refresh.interval_secs ({})",
                self.refresh.cache_ttl_secs,
                self.refresh.interval_secs
            );
        }
        if self.provider.max_concurrent_requests == 0 {
            bail!("provider.max_concurrent_requests must be > 0");
        }
        if self.analytics.flow_history_days > MAX_FLOW_HISTORY_DAYS {
            bail!(
                "analytics.flow_history_days must be <= {}",
                MAX_FLOW_HISTORY_DAYS
            );
        }
        Ok(())
    }

    /// Configured watchlist, or the default sector ETF set when none is given.
    pub fn watchlist(&self) -> Vec<SectorEtf> {
        match &self.watchlist {
            Some(entries) => entries
                .iter()
                .map(|e| SectorEtf::new(&e.symbol, &e.sector))
                .collect(),
            None => default_sector_etfs(),
        }
    }

    pub fn periods(&self) -> Result<Vec<Period>> {
        parse_period_list(&self.periods.enabled, "periods.enabled")
    }

    pub fn period_table(&self) -> Result<PeriodTable> {
        let mut overrides: BTreeMap<Period, Lookback> = BTreeMap::new();
        for (label, lookback) in &self.periods.offsets {
            let period: Period = label
                .parse()
                .context("periods.offsets contains an invalid period")?;
            let lookback = parse_lookback(lookback)
                .with_context(|| format!("periods.offsets.{} is invalid", label))?;
            overrides.insert(period, lookback);
        }
        Ok(PeriodTable::with_overrides(&overrides))
    }

    pub fn order_flow_weights(&self) -> Result<OrderFlowWeights> {
        Ok(OrderFlowWeights {
            short_term: parse_period_list(&self.order_flow.short_term, "order_flow.short_term")?,
            long_term: parse_period_list(&self.order_flow.long_term, "order_flow.long_term")?,
            short_term_weights: parse_weights(
                &self.order_flow.short_term_weights,
                "order_flow.short_term_weights",
            )?,
            long_term_weights: parse_weights(
                &self.order_flow.long_term_weights,
                "order_flow.long_term_weights",
            )?,
        })
    }

    pub fn insight_thresholds(&self) -> InsightThresholds {
        InsightThresholds {
            momentum: self.insights.momentum_threshold,
            bias: self.insights.bias_threshold,
            neutral: self.insights.neutral_threshold,
        }
    }

    pub fn default_sort_key(&self) -> Result<SortKey> {
        parse_sort_key(&self.ui.default_sort).context("ui.default_sort is invalid")
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
