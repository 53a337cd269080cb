//! Break-of-structure detection
//!
//! A candle breaks structure when its high exceeds the highest high of the
//! preceding `lookback` candles (bullish) or, failing that, its low undercuts
//! their lowest low (bearish).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::helpers::{max_high, min_low, BOS_LOOKBACK};
use crate::{
    params::{get_period, get_ratio, ParamMeta, ParameterizedDetector},
    Direction, OHLCVExt, Period, Ratio, Result, OHLCV,
};

impl_with_defaults!(BosDetector, ImpulseFilter);

/// A directional break at `index`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BreakSignal {
    pub index: usize,
    pub direction: Direction,
}

/// Keeps only breaks carried by a strong three-candle impulse.
///
/// Over candles `index-2..=index` the net move from the first open to the last
/// close must reach `min_move`, and bodies must make up at least
/// `min_body_ratio` of the combined high-low ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpulseFilter {
    pub min_move: Ratio,
    pub min_body_ratio: Ratio,
}

impl Default for ImpulseFilter {
    fn default() -> Self {
        Self {
            min_move: Ratio::new_const(0.015),
            min_body_ratio: Ratio::new_const(0.6),
        }
    }
}

impl ImpulseFilter {
    pub fn is_strong<T: OHLCV>(&self, bars: &[T], index: usize) -> bool {
        if index < 2 {
            return false;
        }
        let Some(window) = bars.get(index - 2..=index) else {
            return false;
        };

        let first_open = window[0].open();
        if first_open <= f64::EPSILON {
            return false;
        }
        let net_move = (window[2].close() - first_open).abs() / first_open;

        let bodies: f64 = window.iter().map(|b| b.body()).sum();
        let ranges: f64 = window.iter().map(|b| b.range()).sum();
        if ranges <= f64::EPSILON {
            return false;
        }

        net_move >= self.min_move.get() && bodies / ranges >= self.min_body_ratio.get()
    }
}

/// Break-of-structure detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BosDetector {
    pub lookback: Period,
    /// Disabled unless set
    pub impulse: Option<ImpulseFilter>,
}

impl Default for BosDetector {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(BOS_LOOKBACK),
            impulse: None,
        }
    }
}

impl BosDetector {
    pub fn id(&self) -> &'static str {
        "BREAK_OF_STRUCTURE"
    }

    pub fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    /// Check a single candle against its trailing window.
    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<BreakSignal> {
        let lookback = self.lookback.get();
        if index < lookback {
            return None;
        }
        let bar = bars.get(index)?;
        let prior = &bars[index - lookback..index];

        let direction = if bar.high() > max_high(prior) {
            Direction::Bullish
        } else if bar.low() < min_low(prior) {
            Direction::Bearish
        } else {
            return None;
        };

        if let Some(filter) = &self.impulse {
            if !filter.is_strong(bars, index) {
                trace!(index, ?direction, "break without impulse");
                return None;
            }
        }

        Some(BreakSignal { index, direction })
    }

    /// Every break in `bars`, in index order.
    pub fn detect<T: OHLCV>(&self, bars: &[T]) -> Vec<BreakSignal> {
        let signals: Vec<_> = (self.lookback.get()..bars.len())
            .filter_map(|i| self.detect_at(bars, i))
            .collect();
        debug!(breaks = signals.len(), "break of structure scan");
        signals
    }
}

/// Detect breaks with the given lookback (0 is treated as 1) and no impulse filter.
pub fn detect_breaks<T: OHLCV>(bars: &[T], lookback: usize) -> Vec<BreakSignal> {
    BosDetector {
        lookback: Period::new_const(lookback.max(1)),
        impulse: None,
    }
    .detect(bars)
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static BOS_PARAMS: &[ParamMeta] = &[
    ParamMeta::period(
        "lookback",
        BOS_LOOKBACK as f64,
        (2.0, 20.0, 1.0),
        "Trailing candles whose extremes must be broken",
    ),
    ParamMeta::ratio(
        "impulse_min_move",
        0.015,
        (0.005, 0.05, 0.005),
        "Net three-candle move required by the impulse filter",
    ),
    ParamMeta::ratio(
        "impulse_min_body_ratio",
        0.6,
        (0.3, 0.9, 0.1),
        "Body share of the three-candle range required by the impulse filter",
    ),
];

impl ParameterizedDetector for BosDetector {
    fn param_meta() -> &'static [ParamMeta] {
        BOS_PARAMS
    }

    /// The impulse filter is enabled when either of its keys is present.
    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let defaults = ImpulseFilter::default();
        let impulse = if params.contains_key("impulse_min_move")
            || params.contains_key("impulse_min_body_ratio")
        {
            Some(ImpulseFilter {
                min_move: get_ratio(params, "impulse_min_move", defaults.min_move.get())?,
                min_body_ratio: get_ratio(
                    params,
                    "impulse_min_body_ratio",
                    defaults.min_body_ratio.get(),
                )?,
            })
        } else {
            None
        };

        Ok(Self {
            lookback: get_period(params, "lookback", BOS_LOOKBACK)?,
            impulse,
        })
    }

    fn detector_id_str() -> &'static str {
        "BREAK_OF_STRUCTURE"
    }
}
