//! # entryscan - range and break-of-structure entry detection
//!
//! Scans an ordered series of OHLC candles with two independent strategies:
//!
//! - **Limit catch**: finds sideways consolidation ranges, extends them until a
//!   close breaks out, and emits reversion entries at the range edges.
//! - **In-price**: finds breaks of structure, locates the supply/demand zone
//!   behind each break, and emits a retracement entry with a 3R target.
//!
//! ## Quick Start
//!
//! ```rust
//! use entryscan::prelude::*;
//!
//! let candles: CandleSeries = (0..40)
//!     .map(|i| {
//!         let base = 100.0 + (i % 3) as f64 * 0.5;
//!         Candle::new(i, base, base + 1.0, base - 1.0, base + 0.2)
//!     })
//!     .collect();
//!
//! let analyzer = AnalyzerBuilder::new().build().unwrap();
//! let report = analyzer.analyze(&candles).unwrap();
//! println!("{}", serde_json::to_string(&report.to_response()).unwrap());
//! ```

use std::{fmt, ops::Deref, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub mod data;
pub mod detectors;
pub mod params;
pub mod report;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Parameters
        params::{get_multiple, get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
        // Report
        report::{AnalysisReport, Response, ResultPayload, StrategyEntries},
        // Parallel
        analyze_parallel,
        AnalysisError,
        AnalysisResult,
        // Engine
        Analyzer,
        AnalyzerBuilder,
        AnalyzerConfig,
        // Types
        Candle,
        CandleSeries,
        Direction,
        EntrySignal,
        OHLCVExt,
        Period,
        Ratio,
        Result,
        Side,
        // Errors
        SignalError,
        Strategy,
        Targets,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors raised by parameter validation, configuration and data checks.
///
/// The detectors themselves never fail: short inputs simply produce no signals.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Fraction in range 0.0..=1.0 (percent widths, tolerances, buffers)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(SignalError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(SignalError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Window length or count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(SignalError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLC TRAITS
// ============================================================

/// Core candle data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for candle data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn body_low(&self) -> f64 {
        self.open().min(self.close())
    }

    #[inline]
    fn body_high(&self) -> f64 {
        self.open().max(self.close())
    }

    #[inline]
    fn upper_wick(&self) -> f64 {
        self.high() - self.body_high()
    }

    #[inline]
    fn lower_wick(&self) -> f64 {
        self.body_low() - self.low()
    }

    /// Wick on the side a move in `direction` retraces into:
    /// lower wick for bullish, upper wick for bearish.
    #[inline]
    fn directional_wick(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Bullish => self.lower_wick(),
            Direction::Bearish => self.upper_wick(),
        }
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate candle consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(SignalError::InvalidCandle {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(SignalError::InvalidCandle {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        if prices.iter().any(|p| *p <= 0.0) {
            return Err(SignalError::InvalidCandle {
                index: 0,
                reason: "non-positive price",
            });
        }
        if self.high() < self.low() {
            return Err(SignalError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// CANDLES
// ============================================================

/// One interval's open/high/low/close summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }
}

/// Immutable, time-ordered candle sequence with O(1) positional access.
///
/// Dereferences to `[T]`, so every detector accepts it directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSeries<T = Candle> {
    bars: Vec<T>,
}

impl<T> CandleSeries<T> {
    pub fn new(bars: Vec<T>) -> Self {
        Self { bars }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.bars.get(index)
    }

    /// Candles in `range`, clipped to the series bounds.
    pub fn slice(&self, range: std::ops::Range<usize>) -> &[T] {
        let end = range.end.min(self.bars.len());
        let start = range.start.min(end);
        &self.bars[start..end]
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.bars
    }

    pub fn into_inner(self) -> Vec<T> {
        self.bars
    }
}

impl<T> Deref for CandleSeries<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.bars
    }
}

impl<T> From<Vec<T>> for CandleSeries<T> {
    fn from(bars: Vec<T>) -> Self {
        Self::new(bars)
    }
}

impl<T> FromIterator<T> for CandleSeries<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ============================================================
// SIGNALS
// ============================================================

/// Direction of a break of structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    /// Trade side taken after a break in this direction
    #[inline]
    pub fn side(self) -> Side {
        match self {
            Direction::Bullish => Side::Long,
            Direction::Bearish => Side::Short,
        }
    }
}

/// Trade side of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

/// Take-profit levels attached to an entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Targets {
    /// Range entries: range mid first, then the opposite extreme
    Range { tp1: f64, tp2: f64 },
    /// Break-of-structure entries: reward-multiple projection
    Projected { tp_level: f64 },
}

/// A trade entry produced by either strategy, serialized as a flat record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntrySignal {
    pub bar_index: usize,
    pub entry_time: Option<i64>,
    #[serde(rename = "type")]
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    #[serde(flatten)]
    pub targets: Targets,
}

/// Entry strategy family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Range-edge reversion entries
    LimitCatch,
    /// Break-of-structure retracement entries
    InPrice,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::LimitCatch, Strategy::InPrice];

    /// Label used in the analysis response
    pub fn label(self) -> &'static str {
        match self {
            Strategy::LimitCatch => "Limit Catch Entry",
            Strategy::InPrice => "In-Price Entry",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::LimitCatch => "limit-catch",
            Strategy::InPrice => "in-price",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "limit-catch" => Ok(Strategy::LimitCatch),
            "in-price" => Ok(Strategy::InPrice),
            _ => Err(SignalError::InvalidConfig(format!("unknown strategy '{s}'"))),
        }
    }
}

// ============================================================
// CONFIGURATION
// ============================================================

/// Full detector configuration, loadable from JSON.
///
/// Every section is optional; missing fields fall back to the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub range: RangeDetector,
    pub bos: BosDetector,
    pub zones: ZoneIdentifier,
    pub entry: EntryTrigger,
    pub validate_data: bool,
    pub strategies: Option<Vec<Strategy>>,
}

impl AnalyzerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SignalError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SignalError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }
}

// ============================================================
// ANALYZER
// ============================================================

use detectors::*;
use report::AnalysisReport;

/// Runs both strategy pipelines over one candle series
#[derive(Debug, Clone)]
pub struct Analyzer {
    range: RangeDetector,
    bos: BosDetector,
    zones: ZoneIdentifier,
    entry: EntryTrigger,
    validate_data: bool,
    strategies: Option<Vec<Strategy>>,
}

impl Analyzer {
    pub fn range_detector(&self) -> &RangeDetector {
        &self.range
    }

    pub fn bos_detector(&self) -> &BosDetector {
        &self.bos
    }

    pub fn zone_identifier(&self) -> &ZoneIdentifier {
        &self.zones
    }

    pub fn entry_trigger(&self) -> &EntryTrigger {
        &self.entry
    }

    pub fn is_enabled(&self, strategy: Strategy) -> bool {
        self.strategies
            .as_ref()
            .map_or(true, |enabled| enabled.contains(&strategy))
    }

    /// Run every enabled strategy and collect the results.
    pub fn analyze<T: OHLCV>(&self, bars: &[T]) -> Result<AnalysisReport> {
        if self.validate_data {
            validate_bars(bars)?;
        }

        let mut report = AnalysisReport::default();

        if self.is_enabled(Strategy::LimitCatch) {
            let (ranges, entries) = self.range.detect(bars);
            report.ranges = ranges;
            report.limit_entries = entries;
        }

        if self.is_enabled(Strategy::InPrice) {
            let (breaks, entries) = scan_in_price(bars, &self.bos, &self.zones, &self.entry);
            report.breaks = breaks;
            report.in_price_entries = entries;
        }

        info!(
            candles = bars.len(),
            ranges = report.ranges.len(),
            limit_entries = report.limit_entries.len(),
            breaks = report.breaks.len(),
            in_price_entries = report.in_price_entries.len(),
            "analysis complete"
        );

        Ok(report)
    }

    fn validate(&self) -> Result<()> {
        self.range.validate_config()?;
        self.bos.validate_config()?;
        self.zones.validate_config()?;
        self.entry.validate_config()?;
        if matches!(&self.strategies, Some(s) if s.is_empty()) {
            return Err(SignalError::InvalidConfig(
                "strategy filter must enable at least one strategy".into(),
            ));
        }
        Ok(())
    }
}

/// Check every candle and require strictly increasing timestamps.
pub fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    let mut previous: Option<i64> = None;
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            SignalError::InvalidCandle { reason, .. } => {
                SignalError::InvalidCandle { index: i, reason }
            }
            other => other,
        })?;
        if let Some(ts) = bar.timestamp() {
            if previous.is_some_and(|prev| ts <= prev) {
                return Err(SignalError::InvalidCandle {
                    index: i,
                    reason: "timestamps not strictly increasing",
                });
            }
            previous = Some(ts);
        }
    }
    Ok(())
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating Analyzer instances
#[derive(Debug, Clone, Default)]
pub struct AnalyzerBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration
    pub fn from_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn range_detector(mut self, detector: RangeDetector) -> Self {
        self.config.range = detector;
        self
    }

    pub fn bos_detector(mut self, detector: BosDetector) -> Self {
        self.config.bos = detector;
        self
    }

    pub fn zone_identifier(mut self, identifier: ZoneIdentifier) -> Self {
        self.config.zones = identifier;
        self
    }

    pub fn entry_trigger(mut self, trigger: EntryTrigger) -> Self {
        self.config.entry = trigger;
        self
    }

    /// Enable/disable candle validation before analysis
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Run only the given strategies
    pub fn only_strategies(mut self, strategies: impl IntoIterator<Item = Strategy>) -> Self {
        self.config.strategies = Some(strategies.into_iter().collect());
        self
    }

    /// Build the analyzer, validating every detector configuration
    pub fn build(self) -> Result<Analyzer> {
        let AnalyzerConfig {
            range,
            bos,
            zones,
            entry,
            validate_data,
            strategies,
        } = self.config;
        let analyzer = Analyzer {
            range,
            bos,
            zones,
            entry,
            validate_data,
            strategies,
        };
        analyzer.validate()?;
        Ok(analyzer)
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

use rayon::prelude::*;

/// Result of analyzing a single instrument
#[derive(Debug)]
pub struct AnalysisResult {
    pub symbol: String,
    pub report: AnalysisReport,
}

/// Error from analyzing a single instrument
#[derive(Debug)]
pub struct AnalysisError {
    pub symbol: String,
    pub error: SignalError,
}

/// Parallel analysis of multiple instruments
pub fn analyze_parallel<'a, T, I>(
    analyzer: &Analyzer,
    instruments: I,
) -> (Vec<AnalysisResult>, Vec<AnalysisError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            analyzer
                .analyze(bars)
                .map(|report| AnalysisResult {
                    symbol: symbol.to_string(),
                    report,
                })
                .map_err(|error| AnalysisError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => {
                warn!(symbol = %e.symbol, error = %e.error, "instrument analysis failed");
                errors.push(e)
            }
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
