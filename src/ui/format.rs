use crate::error::DataError;
use crate::model::performance::PeriodResult;

pub const NOT_AVAILABLE: &str = "n/a";
pub const NO_DATA: &str = "no data";

pub fn fmt_change(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:+.2}%", v),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn fmt_cell(cell: Option<&PeriodResult>) -> String {
    match cell {
        Some(Ok(r)) => fmt_change(Some(r.change_pct)),
        Some(Err(DataError::InvalidPriceData { .. })) => "invalid".to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn fmt_price(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.2}", v),
        _ => "-".to_string(),
    }
}

/// Volumes in millions, e.g. `12.35M`.
pub fn fmt_volume(volume: u64) -> String {
    format!("{:.2}M", volume as f64 / 1_000_000.0)
}

pub fn fmt_score(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:+.2}", v),
        _ => "-".to_string(),
    }
}
