use chrono::NaiveDate;

use crate::model::symbol::Symbol;

/// A daily record exactly as the provider reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl RawBar {
    pub fn new(date: NaiveDate, close: Option<f64>, volume: Option<u64>) -> Self {
        Self {
            date,
            close,
            volume,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: u64,
}

/// Daily closes for one symbol. Dates are strictly increasing and every
/// close is finite and positive.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: Symbol,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Normalize provider output: drop null/zero/non-finite closes, sort by
    /// date, and keep the last reported bar for any repeated date.
    pub fn from_raw(symbol: Symbol, raw: Vec<RawBar>) -> Self {
        let mut usable: Vec<PriceBar> = raw
            .into_iter()
            .filter_map(|bar| {
                let close = bar.close?;
                if !close.is_finite() || close <= 0.0 {
                    return None;
                }
                Some(PriceBar {
                    date: bar.date,
                    close,
                    volume: bar.volume.unwrap_or(0),
                })
            })
            .collect();
        // Stable sort keeps provider order among same-day bars.
        usable.sort_by_key(|b| b.date);

        let mut bars: Vec<PriceBar> = Vec::with_capacity(usable.len());
        for bar in usable {
            match bars.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => bars.push(bar),
            }
        }
        Self { symbol, bars }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn latest(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    /// Index of the bar on `date`, or of the closest earlier bar.
    pub fn index_on_or_before(&self, date: NaiveDate) -> Option<usize> {
        let after = self.bars.partition_point(|b| b.date <= date);
        after.checked_sub(1)
    }

    pub fn bar_on_or_before(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.index_on_or_before(date).map(|i| &self.bars[i])
    }

    /// The series as it looked at the close of `date`.
    pub fn truncated(&self, date: NaiveDate) -> PriceSeries {
        let end = self.bars.partition_point(|b| b.date <= date);
        PriceSeries {
            symbol: self.symbol.clone(),
            bars: self.bars[..end].to_vec(),
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn normalization_drops_sorts_and_dedups() {
        let raw = vec![
            RawBar::new(date(4), Some(99.0), Some(10)),
            RawBar::new(date(2), Some(100.0), None),
            RawBar::new(date(3), None, Some(5)),
            RawBar::new(date(3), Some(0.0), Some(5)),
            RawBar::new(date(5), Some(101.0), Some(1)),
            RawBar::new(date(5), Some(103.0), Some(2)),
            RawBar::new(date(8), Some(f64::NAN), Some(2)),
        ];
        let series = PriceSeries::from_raw(Symbol::new("xlk"), raw);
        let dates: Vec<_> = series.bars().iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![date(2), date(4), date(5)]);
        assert_eq!(series.bars()[0].volume, 0);
        let last = series.latest().unwrap();
        assert!((last.close - 103.0).abs() < f64::EPSILON);
        assert_eq!(last.volume, 2);
        assert_eq!(series.symbol().as_str(), "XLK");
    }

    #[test]
    fn bar_lookup_walks_backward_only() {
        let raw = vec![
            RawBar::new(date(2), Some(100.0), None),
            RawBar::new(date(4), Some(99.0), None),
        ];
        let series = PriceSeries::from_raw(Symbol::new("XLF"), raw);
        assert_eq!(series.bar_on_or_before(date(3)).unwrap().date, date(2));
        assert_eq!(series.bar_on_or_before(date(4)).unwrap().date, date(4));
        assert_eq!(series.bar_on_or_before(date(9)).unwrap().date, date(4));
        assert!(series.bar_on_or_before(date(1)).is_none());
    }

    #[test]
    fn truncation_keeps_bars_through_date() {
        let raw = vec![
            RawBar::new(date(2), Some(100.0), None),
            RawBar::new(date(4), Some(99.0), None),
            RawBar::new(date(5), Some(98.0), None),
        ];
        let series = PriceSeries::from_raw(Symbol::new("XLB"), raw);
        assert_eq!(series.truncated(date(4)).closes(), vec![100.0, 99.0]);
        assert_eq!(series.truncated(date(3)).len(), 1);
        assert!(series.truncated(date(1)).is_empty());
    }
}
