//! Consolidation range detection and limit-catch entries
//!
//! The scan walks the series with a single cursor. A window of `min_window`
//! candles qualifies as a range when it is not strictly trending, its width
//! sits inside the configured bounds and both edges are touched often enough.
//! A qualifying range is then extended candle by candle until a close leaves
//! the band; the scan resumes at the breakout candle, so ranges never overlap.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::helpers::{
    max_high, min_low, round2, within_tolerance, RANGE_MAX_WIDTH, RANGE_MIN_TOUCHES,
    RANGE_MIN_WIDTH, RANGE_MIN_WINDOW, STOP_BUFFER, TOUCH_TOLERANCE,
};
use super::trend::is_trending;
use crate::{
    params::{get_period, get_ratio, ParamMeta, ParameterizedDetector},
    EntrySignal, Period, Ratio, Result, Side, SignalError, Targets, OHLCV,
};

impl_with_defaults!(RangeDetector);

/// A detected consolidation range covering candles `start_index..end_index`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeRecord {
    pub start_index: usize,
    /// Breakout candle index (exclusive), or the series length
    pub end_index: usize,
    pub range_high: f64,
    pub range_low: f64,
    /// Midpoint rounded to 2 decimals
    pub range_mid: f64,
    /// Width as a percentage of `range_low`, rounded to 2 decimals
    pub width_pct: f64,
    pub duration: usize,
    pub top_touches: usize,
    pub bottom_touches: usize,
}

impl RangeRecord {
    /// Unrounded width as a fraction of `range_low`
    #[inline]
    pub fn width(&self) -> f64 {
        (self.range_high - self.range_low) / self.range_low
    }
}

/// Range detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeDetector {
    pub min_window: Period,
    pub min_range_pct: Ratio,
    pub max_range_pct: Ratio,
    pub min_touches: Period,
    pub touch_tolerance: Ratio,
    pub stop_buffer: Ratio,
}

impl Default for RangeDetector {
    fn default() -> Self {
        Self {
            min_window: Period::new_const(RANGE_MIN_WINDOW),
            min_range_pct: Ratio::new_const(RANGE_MIN_WIDTH),
            max_range_pct: Ratio::new_const(RANGE_MAX_WIDTH),
            min_touches: Period::new_const(RANGE_MIN_TOUCHES),
            touch_tolerance: Ratio::new_const(TOUCH_TOLERANCE),
            stop_buffer: Ratio::new_const(STOP_BUFFER),
        }
    }
}

impl RangeDetector {
    pub fn id(&self) -> &'static str {
        "RANGE_LIMIT_CATCH"
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.min_window.get() < 2 {
            return Err(SignalError::InvalidConfig(
                "min_window must be at least 2".into(),
            ));
        }
        if self.min_range_pct.get() <= 0.0 {
            return Err(SignalError::InvalidConfig(
                "min_range_pct must be greater than 0".into(),
            ));
        }
        if self.min_range_pct > self.max_range_pct {
            return Err(SignalError::InvalidConfig(format!(
                "min_range_pct {} exceeds max_range_pct {}",
                self.min_range_pct.get(),
                self.max_range_pct.get()
            )));
        }
        if self.min_touches.get() > self.min_window.get() {
            return Err(SignalError::InvalidConfig(format!(
                "min_touches {} exceeds min_window {}",
                self.min_touches.get(),
                self.min_window.get()
            )));
        }
        Ok(())
    }

    /// Scan `bars` for ranges and the edge entries they produce.
    pub fn detect<T: OHLCV>(&self, bars: &[T]) -> (Vec<RangeRecord>, Vec<EntrySignal>) {
        let window_len = self.min_window.get();
        let mut ranges = Vec::new();
        let mut entries = Vec::new();
        let mut i = 0;

        while i + window_len <= bars.len() {
            let Some(record) = self.qualify(bars, i) else {
                i += 1;
                continue;
            };

            debug!(
                start = record.start_index,
                end = record.end_index,
                high = record.range_high,
                low = record.range_low,
                width_pct = record.width_pct,
                "range detected"
            );

            let last = record.end_index - 1;
            self.edge_entries(bars, last, &record, &mut entries);
            ranges.push(record);
            i = last + 1;
        }

        (ranges, entries)
    }

    /// Test the window starting at `start` and, when it qualifies, extend it
    /// to its breakout.
    fn qualify<T: OHLCV>(&self, bars: &[T], start: usize) -> Option<RangeRecord> {
        let window_len = self.min_window.get();
        let window = bars.get(start..start + window_len)?;

        if is_trending(window) {
            trace!(start, "window trending");
            return None;
        }

        let range_high = max_high(window);
        let range_low = min_low(window);
        if range_low <= f64::EPSILON {
            return None;
        }

        if range_high <= range_low {
            return None;
        }

        let width = (range_high - range_low) / range_low;
        if width < self.min_range_pct.get() || width > self.max_range_pct.get() {
            trace!(start, width, "window width out of bounds");
            return None;
        }

        let tolerance = self.touch_tolerance.get();
        let top_touches = window
            .iter()
            .filter(|b| within_tolerance(b.high(), range_high, tolerance))
            .count();
        let bottom_touches = window
            .iter()
            .filter(|b| within_tolerance(b.low(), range_low, tolerance))
            .count();

        let min_touches = self.min_touches.get();
        if top_touches < min_touches || bottom_touches < min_touches {
            trace!(start, top_touches, bottom_touches, "not enough edge touches");
            return None;
        }

        let end = extend_range(bars, start + window_len, range_high, range_low);

        Some(RangeRecord {
            start_index: start,
            end_index: end,
            range_high,
            range_low,
            range_mid: round2((range_high + range_low) / 2.0),
            width_pct: round2(width * 100.0),
            duration: end - start,
            top_touches,
            bottom_touches,
        })
    }

    /// Long and/or short entries off the last candle inside the range.
    fn edge_entries<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        record: &RangeRecord,
        entries: &mut Vec<EntrySignal>,
    ) {
        let bar = &bars[index];
        let tolerance = self.touch_tolerance.get();
        let buffer = self.stop_buffer.get();

        if within_tolerance(bar.low(), record.range_low, tolerance) {
            debug!(index, price = record.range_low, "long limit entry");
            entries.push(EntrySignal {
                bar_index: index,
                entry_time: bar.timestamp(),
                side: Side::Long,
                entry_price: record.range_low,
                stop_loss: record.range_low * (1.0 - buffer),
                targets: Targets::Range {
                    tp1: record.range_mid,
                    tp2: record.range_high,
                },
            });
        }

        if within_tolerance(bar.high(), record.range_high, tolerance) {
            debug!(index, price = record.range_high, "short limit entry");
            entries.push(EntrySignal {
                bar_index: index,
                entry_time: bar.timestamp(),
                side: Side::Short,
                entry_price: record.range_high,
                stop_loss: record.range_high * (1.0 + buffer),
                targets: Targets::Range {
                    tp1: record.range_mid,
                    tp2: record.range_low,
                },
            });
        }
    }
}

/// First index at or after `from` whose close leaves `[low, high]`, or
/// `bars.len()` when the band holds to the end of the data.
///
/// Closes inside the qualifying window never exceed its own extremes, so
/// checking each new candle is equivalent to re-checking the cumulative window.
pub fn extend_range<T: OHLCV>(bars: &[T], from: usize, high: f64, low: f64) -> usize {
    let mut end = from;
    while let Some(bar) = bars.get(end) {
        let close = bar.close();
        if close > high || close < low {
            break;
        }
        end += 1;
    }
    end.min(bars.len())
}

/// Detect ranges with the default parameters.
pub fn detect_ranges<T: OHLCV>(bars: &[T]) -> (Vec<RangeRecord>, Vec<EntrySignal>) {
    RangeDetector::default().detect(bars)
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static RANGE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period(
        "min_window",
        RANGE_MIN_WINDOW as f64,
        (5.0, 60.0, 5.0),
        "Candles in the qualifying window",
    ),
    ParamMeta::ratio(
        "min_range_pct",
        RANGE_MIN_WIDTH,
        (0.005, 0.03, 0.005),
        "Narrowest accepted range width",
    ),
    ParamMeta::ratio(
        "max_range_pct",
        RANGE_MAX_WIDTH,
        (0.01, 0.06, 0.005),
        "Widest accepted range width",
    ),
    ParamMeta::period(
        "min_touches",
        RANGE_MIN_TOUCHES as f64,
        (1.0, 5.0, 1.0),
        "Touches required on each edge",
    ),
    ParamMeta::ratio(
        "touch_tolerance",
        TOUCH_TOLERANCE,
        (0.0025, 0.02, 0.0025),
        "Distance from an extreme that still counts as a touch",
    ),
    ParamMeta::ratio(
        "stop_buffer",
        STOP_BUFFER,
        (0.0005, 0.005, 0.0005),
        "Stop distance beyond the range edge",
    ),
];

impl ParameterizedDetector for RangeDetector {
    fn param_meta() -> &'static [ParamMeta] {
        RANGE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            min_window: get_period(params, "min_window", RANGE_MIN_WINDOW)?,
            min_range_pct: get_ratio(params, "min_range_pct", RANGE_MIN_WIDTH)?,
            max_range_pct: get_ratio(params, "max_range_pct", RANGE_MAX_WIDTH)?,
            min_touches: get_period(params, "min_touches", RANGE_MIN_TOUCHES)?,
            touch_tolerance: get_ratio(params, "touch_tolerance", TOUCH_TOLERANCE)?,
            stop_buffer: get_ratio(params, "stop_buffer", STOP_BUFFER)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn detector_id_str() -> &'static str {
        "RANGE_LIMIT_CATCH"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    /// Alternating candles between 98.2 and 100.0
    fn consolidation(n: usize) -> Vec<Candle> {
        (0..n as i64)
            .map(|i| {
                if i % 2 == 0 {
                    Candle::new(i, 99.0, 100.0, 98.2, 99.5)
                } else {
                    Candle::new(i, 99.5, 99.8, 98.5, 99.0)
                }
            })
            .collect()
    }

    #[test]
    fn test_range_with_breakout() {
        let mut bars = consolidation(15);
        bars.push(Candle::new(15, 99.0, 99.9, 98.6, 99.4));
        bars.push(Candle::new(16, 99.5, 101.5, 99.3, 101.0));

        let (ranges, entries) = RangeDetector::with_defaults().detect(&bars);
        assert_eq!(ranges.len(), 1);

        let r = &ranges[0];
        assert_eq!(r.start_index, 0);
        assert_eq!(r.end_index, 16);
        assert_eq!(r.duration, 16);
        assert_eq!(r.range_high, 100.0);
        assert_eq!(r.range_low, 98.2);
        assert_eq!(r.range_mid, 99.1);
        assert_eq!(r.width_pct, 1.83);
        assert_eq!(r.top_touches, 15);
        assert_eq!(r.bottom_touches, 15);

        // Candle 15 sits near both edges
        assert_eq!(entries.len(), 2);
        let long = &entries[0];
        assert_eq!(long.side, Side::Long);
        assert_eq!(long.bar_index, 15);
        assert_eq!(long.entry_time, Some(15));
        assert_eq!(long.entry_price, 98.2);
        assert!((long.stop_loss - 98.2 * 0.999).abs() < 1e-9);
        assert_eq!(long.targets, Targets::Range { tp1: 99.1, tp2: 100.0 });

        let short = &entries[1];
        assert_eq!(short.side, Side::Short);
        assert_eq!(short.entry_price, 100.0);
        assert!((short.stop_loss - 100.1).abs() < 1e-9);
        assert_eq!(short.targets, Targets::Range { tp1: 99.1, tp2: 98.2 });
    }

    #[test]
    fn test_range_without_breakout_runs_to_end() {
        let bars = consolidation(25);
        let (ranges, entries) = detect_ranges(&bars);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].end_index, 25);
        // Last candle (index 24) is the even shape: touches both edges
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.bar_index == 24));
    }

    #[test]
    fn test_only_short_when_last_candle_far_from_low() {
        let mut bars = consolidation(15);
        // Stays high in the band, low well above the bottom tolerance
        bars.push(Candle::new(15, 99.6, 99.95, 99.4, 99.8));
        bars.push(Candle::new(16, 99.8, 100.9, 99.7, 100.6));

        let (_, entries) = detect_ranges(&bars);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].side, Side::Short);
    }

    #[test]
    fn test_downside_breakout() {
        let mut bars = consolidation(15);
        bars.push(Candle::new(15, 98.8, 99.0, 97.0, 97.5));

        let (ranges, _) = detect_ranges(&bars);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].end_index, 15);
    }

    #[test]
    fn test_scan_resumes_at_breakout() {
        let mut bars = consolidation(15);
        bars.push(Candle::new(15, 99.5, 106.0, 99.4, 105.0));
        // Second consolidation around 105..107
        bars.extend((0..16).map(|k| {
            let t = 16 + k as i64;
            if k % 2 == 0 {
                Candle::new(t, 106.0, 107.0, 105.2, 106.5)
            } else {
                Candle::new(t, 106.5, 106.8, 105.5, 106.0)
            }
        }));

        let (ranges, _) = detect_ranges(&bars);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].end_index, 15);
        // The window starting at the breakout candle is too wide
        assert_eq!(ranges[1].start_index, 16);
        assert_eq!(ranges[1].end_index, 32);
        assert!(ranges[0].end_index <= ranges[1].start_index);
    }

    #[test]
    fn test_too_wide_rejected() {
        let bars: Vec<_> = (0..20i64)
            .map(|i| {
                if i % 2 == 0 {
                    Candle::new(i, 98.0, 100.0, 97.0, 99.0)
                } else {
                    Candle::new(i, 99.0, 99.5, 97.5, 98.0)
                }
            })
            .collect();
        let (ranges, entries) = detect_ranges(&bars);
        assert!(ranges.is_empty());
        assert!(entries.is_empty());
    }

    #[test]
    fn test_too_narrow_rejected() {
        let bars: Vec<_> = (0..20i64)
            .map(|i| Candle::new(i, 99.5, 100.0, 99.0, 99.6 + (i % 2) as f64 * 0.1))
            .collect();
        assert!(detect_ranges(&bars).0.is_empty());
    }

    #[test]
    fn test_single_touch_rejected() {
        // Only one candle reaches the top of the band
        let mut bars: Vec<_> = (0..15i64)
            .map(|i| {
                if i % 2 == 0 {
                    Candle::new(i, 98.6, 98.8, 98.2, 98.5)
                } else {
                    Candle::new(i, 98.5, 98.7, 98.3, 98.6)
                }
            })
            .collect();
        bars[7] = Candle::new(7, 98.6, 100.0, 98.4, 98.7);
        assert!(detect_ranges(&bars).0.is_empty());
    }

    #[test]
    fn test_short_series() {
        let bars = consolidation(14);
        let (ranges, entries) = detect_ranges(&bars);
        assert!(ranges.is_empty());
        assert!(entries.is_empty());
    }

    #[test]
    fn test_extend_range() {
        let bars = consolidation(10);
        assert_eq!(extend_range(&bars, 3, 100.0, 98.2), 10);
        // Candle 4 closes at 99.5, above 99.2
        assert_eq!(extend_range(&bars, 3, 99.2, 98.2), 4);
        assert_eq!(extend_range(&bars, 12, 100.0, 98.2), 10);
    }

    #[test]
    fn test_validate_config() {
        assert!(RangeDetector::default().validate_config().is_ok());
        let bad = RangeDetector {
            min_window: Period::new_const(1),
            ..Default::default()
        };
        assert!(bad.validate_config().is_err());
        let bad = RangeDetector {
            min_touches: Period::new_const(20),
            ..Default::default()
        };
        assert!(bad.validate_config().is_err());
        let bad = RangeDetector {
            min_range_pct: Ratio::new_const(0.0),
            ..Default::default()
        };
        assert!(bad.validate_config().is_err());
    }

    #[test]
    fn test_flat_window_is_not_a_range() {
        let bars: Vec<_> = (0..20i64)
            .map(|i| Candle::new(i, 100.0, 100.0, 100.0, 100.0))
            .collect();
        // Skip config validation to reach the scan with a zero lower bound
        let detector = RangeDetector {
            min_range_pct: Ratio::new_const(0.0),
            ..Default::default()
        };
        let (ranges, entries) = detector.detect(&bars);
        assert!(ranges.is_empty());
        assert!(entries.is_empty());

        let config =
            crate::AnalyzerConfig::from_json_str(r#"{"range":{"min_range_pct":0.0}}"#).unwrap();
        assert!(crate::AnalyzerBuilder::from_config(config).build().is_err());
    }

    #[test]
    fn test_with_params() {
        let params = HashMap::from([("min_window", 10.0), ("max_range_pct", 0.04)]);
        let detector = RangeDetector::with_params(&params).unwrap();
        assert_eq!(detector.min_window.get(), 10);
        assert_eq!(detector.max_range_pct.get(), 0.04);
        assert_eq!(detector.min_touches.get(), 2);

        let inverted = HashMap::from([("min_range_pct", 0.05), ("max_range_pct", 0.02)]);
        assert!(RangeDetector::with_params(&inverted).is_err());
        assert_eq!(RangeDetector::param_meta().len(), 6);
    }
}
