use std::fmt;

/// Ticker identifying one tracked instrument. Always trimmed upper-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// One watchlist entry: an ETF and the sector it tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorEtf {
    pub symbol: Symbol,
    pub sector: String,
}

impl SectorEtf {
    pub fn new(symbol: &str, sector: &str) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            sector: sector.trim().to_string(),
        }
    }
}

/// The SPDR sector ETF set used when no watchlist is configured.
pub fn default_sector_etfs() -> Vec<SectorEtf> {
    [
        ("XLV", "Health Care"),
        ("XLI", "Industrials"),
        ("XLK", "Technology"),
        ("XLRE", "Real Estate"),
        ("XLE", "Energy"),
        ("XLP", "Consumer Staples"),
        ("XLY", "Consumer Discretionary"),
        ("XLF", "Financials"),
        ("XLC", "Communication Services"),
        ("XLU", "Utilities"),
        ("XLB", "Materials"),
        ("XBI", "Biotechnology"),
    ]
    .into_iter()
    .map(|(symbol, sector)| SectorEtf::new(symbol, sector))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_is_normalized() {
        assert_eq!(Symbol::new("  xlk ").as_str(), "XLK");
        assert!(Symbol::new("   ").is_empty());
    }

    #[test]
    fn default_watchlist_has_unique_symbols() {
        let etfs = default_sector_etfs();
        assert_eq!(etfs.len(), 12);
        let mut symbols: Vec<_> = etfs.iter().map(|e| e.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();
        assert_eq!(symbols.len(), 12);
    }
}
