// =============================================================================
// EMA Alignment Classification
// =============================================================================
//
// Decision rule:
//   Bullish  = close > EMA20 > EMA50 > EMA100 > EMA200
//   Bearish  = close < EMA20 < EMA50 < EMA100 < EMA200
//   anything else, including a tie at any link, is Unclassified.

use serde::{Deserialize, Serialize};

use crate::indicators::ema::EmaSet;

/// Outcome of checking the close/EMA stack of one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Bullish,
    Bearish,
    Unclassified,
}

impl Classification {
    /// Status glyph shown next to aligned instruments.
    pub fn glyph(self) -> Option<&'static str> {
        match self {
            Self::Bullish => Some("🟢"),
            Self::Bearish => Some("🔴"),
            Self::Unclassified => None,
        }
    }

    pub fn is_aligned(self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
            Self::Unclassified => write!(f, "Unclassified"),
        }
    }
}

/// Classify a close price against the latest EMA-20/50/100/200 values.
pub fn classify(close: f64, ema20: f64, ema50: f64, ema100: f64, ema200: f64) -> Classification {
    if close > ema20 && ema20 > ema50 && ema50 > ema100 && ema100 > ema200 {
        Classification::Bullish
    } else if close < ema20 && ema20 < ema50 && ema50 < ema100 && ema100 < ema200 {
        Classification::Bearish
    } else {
        Classification::Unclassified
    }
}

/// Latest close together with the last value of each EMA series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaSnapshot {
    pub close: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub ema100: f64,
    pub ema200: f64,
}

impl EmaSnapshot {
    /// `None` when any of the EMA series is empty.
    pub fn latest(close: f64, emas: &EmaSet) -> Option<Self> {
        let [ema20, ema50, ema100, ema200] = emas.latest()?;
        Some(Self {
            close,
            ema20,
            ema50,
            ema100,
            ema200,
        })
    }

    pub fn classify(&self) -> Classification {
        classify(self.close, self.ema20, self.ema50, self.ema100, self.ema200)
    }

    /// False when the close or any EMA is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        [self.close, self.ema20, self.ema50, self.ema100, self.ema200]
            .iter()
            .all(|v| v.is_finite())
    }
}
