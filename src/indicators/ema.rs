// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   alpha  = 2 / (span + 1)
//   EMA_0  = close_0
//   EMA_t  = close_t * alpha + EMA_{t-1} * (1 - alpha)
//
// The series is seeded with the first close and carries no bias-correction
// warm-up, so the output is exactly as long as the input.
// =============================================================================

use serde::{Deserialize, Serialize};

/// Spans of the four EMAs in the alignment stack, shortest first.
pub const EMA_SPANS: [usize; 4] = [20, 50, 100, 200];

/// Smoothing factor for `span`.
pub fn smoothing_factor(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Compute the EMA series for the given `closes` slice and `span`.
///
/// Returns one value per close. An empty input (or a zero span) yields an
/// empty vec.
pub fn calculate_ema(closes: &[f64], span: usize) -> Vec<f64> {
    let Some((&first, rest)) = closes.split_first() else {
        return Vec::new();
    };
    if span == 0 {
        return Vec::new();
    }

    let alpha = smoothing_factor(span);
    let mut result = Vec::with_capacity(closes.len());
    result.push(first);

    let mut prev = first;
    for &close in rest {
        let ema = close * alpha + prev * (1.0 - alpha);
        result.push(ema);
        prev = ema;
    }

    result
}

/// The four EMA series of the alignment stack, each as long as the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmaSet {
    pub ema20: Vec<f64>,
    pub ema50: Vec<f64>,
    pub ema100: Vec<f64>,
    pub ema200: Vec<f64>,
}

impl EmaSet {
    /// Most recent value of each series as `[ema20, ema50, ema100, ema200]`.
    pub fn latest(&self) -> Option<[f64; 4]> {
        Some([
            *self.ema20.last()?,
            *self.ema50.last()?,
            *self.ema100.last()?,
            *self.ema200.last()?,
        ])
    }
}

/// Compute EMA-20/50/100/200 over the same close sequence.
pub fn compute_emas(closes: &[f64]) -> EmaSet {
    let [s20, s50, s100, s200] = EMA_SPANS;
    EmaSet {
        ema20: calculate_ema(closes, s20),
        ema50: calculate_ema(closes, s50),
        ema100: calculate_ema(closes, s100),
        ema200: calculate_ema(closes, s200),
    }
}
