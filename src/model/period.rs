use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{Days, Months, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl Period {
    pub const ALL: [Period; 6] = [
        Period::OneDay,
        Period::FiveDays,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
        }
    }

    /// Calendar offset used when no override is configured.
    /// `5d` spans one calendar week, i.e. five sessions back from the same weekday.
    pub fn default_lookback(self) -> Lookback {
        match self {
            Period::OneDay => Lookback::Days(1),
            Period::FiveDays => Lookback::Days(7),
            Period::OneMonth => Lookback::Months(1),
            Period::ThreeMonths => Lookback::Months(3),
            Period::SixMonths => Lookback::Months(6),
            Period::OneYear => Lookback::Months(12),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        Period::ALL
            .into_iter()
            .find(|p| p.label() == needle)
            .with_context(|| {
                format!(
                    "unknown period '{}', expected one of 1d/5d/1mo/3mo/6mo/1y",
                    s
                )
            })
    }
}

/// Calendar distance between `as_of` and a period's reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Days(u32),
    Months(u32),
}

impl Lookback {
    /// Reference date for this lookback. Month arithmetic clamps to the end of
    /// shorter months (Mar 31 - 1mo = Feb 28/29).
    pub fn reference_date(self, as_of: NaiveDate) -> Option<NaiveDate> {
        match self {
            Lookback::Days(n) => as_of.checked_sub_days(Days::new(u64::from(n))),
            Lookback::Months(n) => as_of.checked_sub_months(Months::new(n)),
        }
    }

    /// Rough length in days, used only to pick the longest lookback.
    pub fn approx_days(self) -> u32 {
        match self {
            Lookback::Days(n) => n,
            Lookback::Months(n) => n.saturating_mul(31),
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::Days(n) => write!(f, "{}d", n),
            Lookback::Months(n) => write!(f, "{}mo", n),
        }
    }
}

/// Parse a lookback like "1d", "2w", "3mo" or "1y".
pub fn parse_lookback(s: &str) -> Result<Lookback> {
    let s = s.trim();
    let split_at = s
        .find(|c: char| !c.is_ascii_digit())
        .with_context(|| format!("invalid lookback '{}': missing unit (d/w/mo/y)", s))?;
    let (num_str, unit) = s.split_at(split_at);
    if num_str.is_empty() {
        bail!("invalid lookback '{}': expected format like '7d'", s);
    }
    let n: u32 = num_str
        .parse()
        .with_context(|| format!("invalid lookback '{}': quantity must be a positive integer", s))?;
    if n == 0 {
        bail!("invalid lookback '{}': quantity must be > 0", s);
    }

    let lookback = match unit {
        "d" => Lookback::Days(n),
        "w" => Lookback::Days(
            n.checked_mul(7)
                .with_context(|| format!("invalid lookback '{}': value is too large", s))?,
        ),
        "mo" => Lookback::Months(n),
        "y" => Lookback::Months(
            n.checked_mul(12)
                .with_context(|| format!("invalid lookback '{}': value is too large", s))?,
        ),
        _ => bail!(
            "invalid lookback '{}': unsupported unit '{}', expected one of d/w/mo/y",
            s,
            unit
        ),
    };
    Ok(lookback)
}

/// Period → lookback mapping, fixed for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodTable {
    offsets: BTreeMap<Period, Lookback>,
}

impl Default for PeriodTable {
    fn default() -> Self {
        Self {
            offsets: Period::ALL
                .into_iter()
                .map(|p| (p, p.default_lookback()))
                .collect(),
        }
    }
}

impl PeriodTable {
    pub fn with_overrides(overrides: &BTreeMap<Period, Lookback>) -> Self {
        let mut table = Self::default();
        for (period, lookback) in overrides {
            table.offsets.insert(*period, *lookback);
        }
        table
    }

    pub fn lookback(&self, period: Period) -> Lookback {
        self.offsets
            .get(&period)
            .copied()
            .unwrap_or_else(|| period.default_lookback())
    }

    pub fn reference_date(&self, period: Period, as_of: NaiveDate) -> Option<NaiveDate> {
        self.lookback(period).reference_date(as_of)
    }

    /// Longest lookback among `periods`; `None` when `periods` is empty.
    pub fn max_lookback(&self, periods: &[Period]) -> Option<Lookback> {
        periods
            .iter()
            .map(|p| self.lookback(*p))
            .max_by_key(|l| l.approx_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_labels_round_trip() {
        for p in Period::ALL {
            assert_eq!(p.label().parse::<Period>().unwrap(), p);
        }
        assert_eq!(" 1MO ".parse::<Period>().unwrap(), Period::OneMonth);
        assert!("2d".parse::<Period>().is_err());
    }

    #[test]
    fn parse_lookback_valid() {
        assert_eq!(parse_lookback("7d").unwrap(), Lookback::Days(7));
        assert_eq!(parse_lookback("2w").unwrap(), Lookback::Days(14));
        assert_eq!(parse_lookback("3mo").unwrap(), Lookback::Months(3));
        assert_eq!(parse_lookback("1y").unwrap(), Lookback::Months(12));
    }

    #[test]
    fn parse_lookback_rejects_invalid_inputs() {
        assert!(parse_lookback("").is_err());
        assert!(parse_lookback("d").is_err());
        assert!(parse_lookback("0d").is_err());
        assert!(parse_lookback("5").is_err());
        assert!(parse_lookback("1x").is_err());
    }

    #[test]
    fn month_lookback_clamps_to_month_end() {
        let l = Lookback::Months(1);
        assert_eq!(l.reference_date(date(2024, 3, 31)), Some(date(2024, 2, 29)));
    }

    #[test]
    fn max_lookback_picks_longest() {
        let table = PeriodTable::default();
        assert_eq!(
            table.max_lookback(&[Period::OneDay, Period::SixMonths, Period::FiveDays]),
            Some(Lookback::Months(6))
        );
        assert_eq!(table.max_lookback(&[]), None);
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut overrides = BTreeMap::new();
        overrides.insert(Period::FiveDays, Lookback::Days(5));
        let table = PeriodTable::with_overrides(&overrides);
        assert_eq!(table.lookback(Period::FiveDays), Lookback::Days(5));
        assert_eq!(table.lookback(Period::OneDay), Lookback::Days(1));
    }
}
