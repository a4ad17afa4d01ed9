use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::DataError;
use crate::model::bar::PriceSeries;
use crate::model::performance::{PerformanceRow, PeriodResult, PeriodReturn};
use crate::model::period::{Period, PeriodTable};

/// Close of the last bar in the series, regardless of `as_of`.
pub fn latest_close(series: &PriceSeries) -> Option<f64> {
    series.latest().map(|b| b.close)
}

/// Percent change per period from the reference bar to the latest bar.
///
/// The reference date is `as_of` minus the period's lookback. When no bar
/// exists on that date the closest earlier bar is used; when there is none,
/// the cell is `InsufficientHistory`. Pure: no clock reads besides `as_of`.
pub fn compute_performance(
    series: &PriceSeries,
    periods: &[Period],
    table: &PeriodTable,
    as_of: NaiveDate,
) -> BTreeMap<Period, PeriodResult> {
    periods
        .iter()
        .map(|&period| (period, period_return(series, period, table, as_of)))
        .collect()
}

fn period_return(
    series: &PriceSeries,
    period: Period,
    table: &PeriodTable,
    as_of: NaiveDate,
) -> PeriodResult {
    let Some(reference_date) = table.reference_date(period, as_of) else {
        return Err(DataError::InsufficientHistory {
            period,
            reference_date: None,
        });
    };
    let insufficient = || DataError::InsufficientHistory {
        period,
        reference_date: Some(reference_date),
    };

    let latest = series.latest().ok_or_else(insufficient)?;
    let ref_index = series
        .index_on_or_before(reference_date)
        .ok_or_else(insufficient)?;
    let reference = &series.bars()[ref_index];

    let change_pct = percent_change(reference.date, reference.close, latest.close)?;

    let window = &series.bars()[ref_index..];
    let volume: u64 = window.iter().map(|b| b.volume).fold(0u64, u64::saturating_add);
    let avg_volume = volume as f64 / window.len() as f64;

    Ok(PeriodReturn {
        period,
        reference_date: reference.date,
        reference_close: reference.close,
        change_pct,
        volume,
        avg_volume,
    })
}

/// `(latest - reference) / reference * 100`, refusing a non-positive reference.
pub fn percent_change(
    reference_date: NaiveDate,
    reference_close: f64,
    latest_close: f64,
) -> Result<f64, DataError> {
    if !reference_close.is_finite() || reference_close <= 0.0 {
        return Err(DataError::InvalidPriceData {
            date: reference_date,
            close: reference_close,
        });
    }
    Ok((latest_close - reference_close) / reference_close * 100.0)
}

/// Full row for one symbol: latest close plus every requested period.
pub fn build_row(
    series: &PriceSeries,
    sector: Option<&str>,
    periods: &[Period],
    table: &PeriodTable,
    as_of: NaiveDate,
) -> PerformanceRow {
    PerformanceRow {
        symbol: series.symbol().clone(),
        sector: sector.map(str::to_string),
        latest_close: latest_close(series),
        latest_date: series.latest().map(|b| b.date),
        latest_volume: series.latest().map(|b| b.volume).unwrap_or(0),
        changes: compute_performance(series, periods, table, as_of),
    }
}
