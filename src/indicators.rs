use crate::model::bar::PriceSeries;

/// Percent distance from an SMA inside which price counts as neutral.
const SMA_NEUTRAL_BAND_PCT: f64 = 1.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
/// Weighted sentiment beyond this is called bullish or bearish overall.
const SENTIMENT_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    fn signal(self) -> f64 {
        match self {
            Bias::Bullish => 1.0,
            Bias::Bearish => -1.0,
            Bias::Neutral => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    SmaDistance(usize),
    Rsi(usize),
    RateOfChange(usize),
}

impl IndicatorKind {
    pub fn label(self) -> String {
        match self {
            IndicatorKind::SmaDistance(n) => format!("{}-day SMA %", n),
            IndicatorKind::Rsi(n) => format!("{}-day RSI", n),
            IndicatorKind::RateOfChange(n) => format!("{}-day ROC", n),
        }
    }
}

/// (indicator, weight in the overall sentiment). Short windows weigh double.
pub const INDICATOR_SET: [(IndicatorKind, f64); 7] = [
    (IndicatorKind::SmaDistance(20), 1.0),
    (IndicatorKind::SmaDistance(50), 0.5),
    (IndicatorKind::SmaDistance(200), 0.5),
    (IndicatorKind::Rsi(14), 1.0),
    (IndicatorKind::Rsi(50), 0.5),
    (IndicatorKind::RateOfChange(14), 1.0),
    (IndicatorKind::RateOfChange(50), 0.5),
];

/// Sessions needed for every indicator in `INDICATOR_SET` to be defined.
pub const MIN_SESSIONS_FOR_ALL: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorReading {
    pub kind: IndicatorKind,
    /// `None` while the window is longer than the available history.
    pub value: Option<f64>,
    pub bias: Bias,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TechnicalIndicators {
    pub latest_close: f64,
    pub readings: Vec<IndicatorReading>,
    pub sentiment_score: f64,
    pub overall: Bias,
}

impl TechnicalIndicators {
    pub fn overall_label(&self) -> &'static str {
        match self.overall {
            Bias::Bullish => "Bullish overall (short-term strength)",
            Bias::Bearish => "Bearish overall (long-term weakness)",
            Bias::Neutral => "Mixed/neutral signals",
        }
    }

    pub fn reading(&self, kind: IndicatorKind) -> Option<&IndicatorReading> {
        self.readings.iter().find(|r| r.kind == kind)
    }
}

/// Mean of the last `window` closes, once that many exist.
pub fn sma(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    let tail = &closes[closes.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

/// Simple-average RSI over the last `window` close-to-close moves.
/// A window with gains and no losses reads 100; a flat window is undefined.
pub fn rsi(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window + 1 {
        return None;
    }
    let tail = &closes[closes.len() - window - 1..];
    let (gain, loss) = tail.windows(2).fold((0.0, 0.0), |(g, l), pair| {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            (g + delta, l)
        } else {
            (g, l - delta)
        }
    });
    let avg_gain = gain / window as f64;
    let avg_loss = loss / window as f64;
    if avg_loss == 0.0 {
        return (avg_gain > 0.0).then_some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Percent change from the close `lag` sessions back to the latest close.
pub fn rate_of_change(closes: &[f64], lag: usize) -> Option<f64> {
    if lag == 0 || closes.len() <= lag {
        return None;
    }
    let latest = *closes.last()?;
    let base = closes[closes.len() - 1 - lag];
    if base <= 0.0 {
        return None;
    }
    Some((latest - base) / base * 100.0)
}

fn read(kind: IndicatorKind, closes: &[f64], latest: f64) -> IndicatorReading {
    let value = match kind {
        IndicatorKind::SmaDistance(n) => {
            sma(closes, n).filter(|m| *m > 0.0).map(|m| (latest - m) / m * 100.0)
        }
        IndicatorKind::Rsi(n) => rsi(closes, n),
        IndicatorKind::RateOfChange(n) => rate_of_change(closes, n),
    };
    let Some(v) = value else {
        return IndicatorReading {
            kind,
            value: None,
            bias: Bias::Neutral,
            interpretation: "n/a (not enough history)".to_string(),
        };
    };

    let (bias, interpretation) = match kind {
        IndicatorKind::SmaDistance(_) => {
            if v > SMA_NEUTRAL_BAND_PCT {
                (Bias::Bullish, format!("Bullish ({:.2}% above)", v))
            } else if v < -SMA_NEUTRAL_BAND_PCT {
                (Bias::Bearish, format!("Bearish ({:.2}% below)", v.abs()))
            } else {
                (Bias::Neutral, "Neutral/mixed (within ±1% of SMA)".to_string())
            }
        }
        IndicatorKind::Rsi(_) => {
            if v > RSI_OVERBOUGHT {
                (Bias::Bullish, format!("Overbought (sell signal, {:.2} > 70)", v))
            } else if v < RSI_OVERSOLD {
                (Bias::Bearish, format!("Oversold (buy signal, {:.2} < 30)", v))
            } else if v > 50.0 {
                (Bias::Bullish, "Neutral (momentum strengthening)".to_string())
            } else if v < 50.0 {
                (Bias::Bearish, "Neutral (momentum weakening)".to_string())
            } else {
                (Bias::Neutral, "Neutral (momentum stable)".to_string())
            }
        }
        IndicatorKind::RateOfChange(_) => {
            if v > 0.0 {
                (Bias::Bullish, format!("Bullish ({:.2}% change)", v))
            } else if v < 0.0 {
                (Bias::Bearish, format!("Bearish ({:.2}% change)", v.abs()))
            } else {
                (Bias::Neutral, "Neutral (no change)".to_string())
            }
        }
    };
    IndicatorReading {
        kind,
        value: Some(v),
        bias,
        interpretation,
    }
}

/// Moving-average, RSI and rate-of-change readings on the series' closes,
/// plus a weighted overall sentiment. `None` for an empty series.
pub fn compute_indicators(series: &PriceSeries) -> Option<TechnicalIndicators> {
    let closes = series.closes();
    let latest = *closes.last()?;

    let mut sentiment_score = 0.0;
    let readings: Vec<IndicatorReading> = INDICATOR_SET
        .iter()
        .map(|&(kind, weight)| {
            let reading = read(kind, &closes, latest);
            sentiment_score += weight * reading.bias.signal();
            reading
        })
        .collect();

    let overall = if sentiment_score > SENTIMENT_THRESHOLD {
        Bias::Bullish
    } else if sentiment_score < -SENTIMENT_THRESHOLD {
        Bias::Bearish
    } else {
        Bias::Neutral
    };

    Some(TechnicalIndicators {
        latest_close: latest,
        readings,
        sentiment_score,
        overall,
    })
}
