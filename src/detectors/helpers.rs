//! Common helper functions shared by the range and break-of-structure detectors

use crate::OHLCV;

// ============================================================
// DEFAULT THRESHOLDS
// ============================================================

/// Minimum consolidation window length
pub const RANGE_MIN_WINDOW: usize = 15;
/// Narrowest accepted range: (high - low) / low
pub const RANGE_MIN_WIDTH: f64 = 0.015;
/// Widest accepted range: (high - low) / low
pub const RANGE_MAX_WIDTH: f64 = 0.03;
/// Touches required on each edge of a range
pub const RANGE_MIN_TOUCHES: usize = 2;
/// A price touches an extreme when within this fraction of it
pub const TOUCH_TOLERANCE: f64 = 0.01;
/// Stop placed this fraction beyond the range edge
pub const STOP_BUFFER: f64 = 0.001;

/// Trailing window for break-of-structure extremes
pub const BOS_LOOKBACK: usize = 5;

/// Candles scanned back for an opposite-colored order block
pub const ORDER_BLOCK_LOOKBACK: usize = 5;
/// Window (break candle included) inspected for clustered wicks
pub const WICK_CLUSTER_WINDOW: usize = 6;
/// Wicks needed in one cluster
pub const WICK_CLUSTER_MIN: usize = 3;
/// Wick distance tolerance as a fraction of the break candle's close
pub const WICK_CLUSTER_TOLERANCE: f64 = 0.0025;
/// Candles preceding the break considered for a base
pub const BASE_MAX_CANDLES: usize = 4;
/// Fewest candles that still form a base
pub const BASE_MIN_CANDLES: usize = 2;
/// Opens and closes of a base stay within this fraction of the reference close
pub const BASE_TOLERANCE: f64 = 0.01;

/// Candles after the break in which a retracement may trigger
pub const ENTRY_MAX_WAIT: usize = 9;
/// Reward:risk of the projected target
pub const REWARD_MULTIPLE: f64 = 3.0;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// `|value - reference| <= tolerance * reference`
#[inline]
pub fn within_tolerance(value: f64, reference: f64, tolerance: f64) -> bool {
    (value - reference).abs() <= tolerance * reference
}

/// Round to 2 decimal places
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Highest high of `bars` (`f64::NEG_INFINITY` when empty)
#[inline]
pub fn max_high<T: OHLCV>(bars: &[T]) -> f64 {
    bars.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max)
}

/// Lowest low of `bars` (`f64::INFINITY` when empty)
#[inline]
pub fn min_low<T: OHLCV>(bars: &[T]) -> f64 {
    bars.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min)
}
