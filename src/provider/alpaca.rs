use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

use crate::error::AppError;
use crate::model::bar::RawBar;
use crate::model::symbol::Symbol;

use super::{compact_error_body, HistoryProvider, HistorySpan};

const MAX_PAGES: usize = 20;

/// Alpaca market-data client for daily equity bars.
pub struct AlpacaBarsClient {
    http: reqwest::Client,
    data_base_url: String,
    feed: String,
}

impl AlpacaBarsClient {
    pub fn new(
        data_base_url: &str,
        api_key: &str,
        api_secret: &str,
        feed: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("APCA-API-KEY-ID", HeaderValue::from_str(api_key)?);
        headers.insert("APCA-API-SECRET-KEY", HeaderValue::from_str(api_secret)?);
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .context("failed to build Alpaca HTTP client")?;
        Ok(Self {
            http,
            data_base_url: data_base_url.trim_end_matches('/').to_string(),
            feed: feed.to_string(),
        })
    }
}

/// Decode one page of `/v2/stocks/bars`. Returns the bars and the next page token.
pub fn parse_bars_page(symbol: &Symbol, root: &Value) -> Result<(Vec<RawBar>, Option<String>)> {
    let bars = root
        .get("bars")
        .and_then(|b| b.get(symbol.as_str()))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut out = Vec::with_capacity(bars.len());
    for bar in bars {
        let ts = bar.get("t").and_then(Value::as_str).unwrap_or_default();
        // Daily bars are stamped at US/Eastern midnight expressed in UTC, so
        // the UTC calendar date is the session date.
        let date = DateTime::parse_from_rfc3339(ts)
            .with_context(|| format!("alpaca bar has invalid timestamp '{}'", ts))?
            .date_naive();
        let close = bar.get("c").and_then(Value::as_f64);
        let volume = bar.get("v").and_then(Value::as_u64);
        out.push(RawBar::new(date, close, volume));
    }

    let next = root
        .get("next_page_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    Ok((out, next))
}

/// A token still pending after `MAX_PAGES` means the series would be cut short.
fn ensure_pages_exhausted(symbol: &Symbol, pending: Option<&str>, bars: usize) -> Result<()> {
    if let Some(token) = pending {
        tracing::warn!(
            symbol = %symbol,
            bars,
            max_pages = MAX_PAGES,
            page_token = token,
            "alpaca pagination limit reached"
        );
        bail!(
            "alpaca bars for {} exceeded {} pages ({} bars read)",
            symbol,
            MAX_PAGES,
            bars
        );
    }
    Ok(())
}

#[async_trait]
impl HistoryProvider for AlpacaBarsClient {
    fn name(&self) -> &str {
        "alpaca"
    }

    async fn get_history(&self, symbol: &Symbol, span: HistorySpan) -> Result<Vec<RawBar>> {
        let endpoint = format!("{}/v2/stocks/bars", self.data_base_url);
        let start = span.start.to_string();
        let end = span.end.to_string();

        let mut all = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut request = self.http.get(&endpoint).query(&[
                ("symbols", symbol.as_str()),
                ("timeframe", "1Day"),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("limit", "10000"),
                ("adjustment", "all"),
                ("feed", self.feed.as_str()),
            ]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("page_token", token)]);
            }

            let response = request
                .send()
                .await
                .context("alpaca get_history HTTP failed")?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(
                    status = %status,
                    symbol = %symbol,
                    detail = %compact_error_body(&body),
                    "alpaca bars returned non-success"
                );
                return Err(AppError::ProviderApi {
                    status: status.as_u16(),
                    msg: compact_error_body(&body),
                }
                .into());
            }
            let root: Value = response
                .json()
                .await
                .context("alpaca get_history JSON parse failed")?;

            let (bars, next) = parse_bars_page(symbol, &root)?;
            all.extend(bars);
            page_token = next;
            if page_token.is_none() {
                break;
            }
        }
        ensure_pages_exhausted(symbol, page_token.as_deref(), all.len())?;
        tracing::debug!(symbol = %symbol, span = %span, bars = all.len(), "alpaca history received");
        Ok(all)
    }
}
