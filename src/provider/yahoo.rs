use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;
use crate::model::bar::RawBar;
use crate::model::symbol::Symbol;

use super::{compact_error_body, HistoryProvider, HistorySpan};

/// Yahoo Finance v8 chart endpoint client for daily bars.
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
}

// `chart` response schema
#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds; bar timestamps are session opens in UTC.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

/// Split- and dividend-adjusted closes, parallel to `Quote::close`.
#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

impl YahooChartClient {
    pub fn new(base_url: &str, user_agent: &str, request_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .context("failed to build Yahoo HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn epoch_seconds(date: NaiveDate) -> i64 {
        date.and_time(NaiveTime::MIN).and_utc().timestamp()
    }
}

/// Decode a chart response body into raw daily bars in the exchange's local dates.
pub fn parse_chart_response(symbol: &Symbol, body: &str) -> Result<Vec<RawBar>> {
    let envelope: ChartEnvelope = serde_json::from_str(body).map_err(AppError::from)?;
    if let Some(err) = envelope.chart.error {
        bail!(
            "yahoo chart error for {}: {} {}",
            symbol,
            err.code,
            err.description
        );
    }
    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        bail!("yahoo chart response for {} has no result", symbol);
    };
    let quote = result.indicators.quote.into_iter().next();
    let (closes, volumes) = match quote {
        Some(q) => (q.close, q.volume),
        None => (Vec::new(), Vec::new()),
    };
    let adjusted = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let offset = result.meta.gmtoffset;
    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let Some(local) = DateTime::from_timestamp(ts.saturating_add(offset), 0) else {
            tracing::debug!(symbol = %symbol, timestamp = ts, "skipping out-of-range timestamp");
            continue;
        };
        bars.push(RawBar::new(
            local.date_naive(),
            adjusted
                .get(i)
                .copied()
                .flatten()
                .or_else(|| closes.get(i).copied().flatten()),
            volumes.get(i).copied().flatten(),
        ));
    }
    Ok(bars)
}

#[async_trait]
impl HistoryProvider for YahooChartClient {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn get_history(&self, symbol: &Symbol, span: HistorySpan) -> Result<Vec<RawBar>> {
        let endpoint = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let period1 = Self::epoch_seconds(span.start).to_string();
        // period2 is exclusive
        let period2 = span
            .end
            .checked_add_days(Days::new(1))
            .map(Self::epoch_seconds)
            .unwrap_or_else(|| Self::epoch_seconds(span.end))
            .to_string();

        let response = self
            .http
            .get(&endpoint)
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", "1d"),
                ("events", "history"),
                ("includePrePost", "false"),
            ])
            .send()
            .await
            .context("yahoo get_history HTTP failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("yahoo get_history body read failed")?;
        if !status.is_success() {
            tracing::warn!(
                status = %status,
                symbol = %symbol,
                detail = %compact_error_body(&body),
                "yahoo chart returned non-success"
            );
            return Err(AppError::ProviderApi {
                status: status.as_u16(),
                msg: compact_error_body(&body),
            }
            .into());
        }

        let bars = parse_chart_response(symbol, &body)
            .with_context(|| format!("yahoo get_history parse failed for {}", symbol))?;
        tracing::debug!(symbol = %symbol, span = %span, bars = bars.len(), "yahoo history received");
        Ok(bars)
    }
}
