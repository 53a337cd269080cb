//! Zone identification behind a break of structure
//!
//! Three heuristics are tried in order and the first zone found wins:
//! the most recent opposite-colored candle body ([`OrderBlock`]), a cluster of
//! similar directional wicks ([`WickCluster`]) and a tight base of candles
//! right before the break ([`CandleBase`]).

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::helpers::{
    max_high, min_low, within_tolerance, BASE_MAX_CANDLES, BASE_MIN_CANDLES, BASE_TOLERANCE,
    ORDER_BLOCK_LOOKBACK, WICK_CLUSTER_MIN, WICK_CLUSTER_TOLERANCE, WICK_CLUSTER_WINDOW,
};
use crate::{Direction, OHLCVExt, Period, Ratio, Result, SignalError, OHLCV};

impl_with_defaults!(OrderBlock, WickCluster, CandleBase, ZoneIdentifier);

/// Heuristic that produced a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSource {
    OrderBlock,
    WickCluster,
    CandleBase,
}

/// Price band a retracement entry waits for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub low: f64,
    pub high: f64,
    pub source: ZoneSource,
}

impl Zone {
    /// Inclusive on both bounds
    #[inline]
    pub fn contains(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }
}

/// Shared contract of the zone heuristics
pub trait ZoneHeuristic: Send + Sync {
    fn source(&self) -> ZoneSource;

    /// Zone behind the break at `index`, if this heuristic finds one
    fn try_identify<T: OHLCV>(&self, bars: &[T], index: usize, direction: Direction)
        -> Option<Zone>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// ORDER BLOCK
// ============================================================

/// Most recent candle of the opposite color within `lookback` candles
/// before the break. The zone is its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBlock {
    pub lookback: Period,
}

impl Default for OrderBlock {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(ORDER_BLOCK_LOOKBACK),
        }
    }
}

impl ZoneHeuristic for OrderBlock {
    fn source(&self) -> ZoneSource {
        ZoneSource::OrderBlock
    }

    fn try_identify<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        direction: Direction,
    ) -> Option<Zone> {
        if index >= bars.len() {
            return None;
        }
        let earliest = index.saturating_sub(self.lookback.get());

        bars[earliest..index]
            .iter()
            .rev()
            .find(|bar| match direction {
                Direction::Bullish => bar.is_bearish(),
                Direction::Bearish => bar.is_bullish(),
            })
            .map(|bar| Zone {
                low: bar.body_low(),
                high: bar.body_high(),
                source: ZoneSource::OrderBlock,
            })
    }
}

// ============================================================
// WICK CLUSTER
// ============================================================

/// At least `min_cluster` directional wicks of similar length within the
/// `window` candles ending at the break. The zone is the break candle's range.
///
/// Wick lengths are compared against `tolerance × close` of the break candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WickCluster {
    pub window: Period,
    pub min_cluster: Period,
    pub tolerance: Ratio,
}

impl Default for WickCluster {
    fn default() -> Self {
        Self {
            window: Period::new_const(WICK_CLUSTER_WINDOW),
            min_cluster: Period::new_const(WICK_CLUSTER_MIN),
            tolerance: Ratio::new_const(WICK_CLUSTER_TOLERANCE),
        }
    }
}

impl ZoneHeuristic for WickCluster {
    fn source(&self) -> ZoneSource {
        ZoneSource::WickCluster
    }

    fn try_identify<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        direction: Direction,
    ) -> Option<Zone> {
        let brk = bars.get(index)?;
        let start = (index + 1).saturating_sub(self.window.get());
        let wicks: Vec<f64> = bars[start..=index]
            .iter()
            .map(|bar| bar.directional_wick(direction))
            .collect();
        let tol = self.tolerance.get() * brk.close();
        let needed = self.min_cluster.get();

        let clustered = wicks.iter().any(|&anchor| {
            wicks.iter().filter(|&&w| (w - anchor).abs() <= tol).count() >= needed
        });

        clustered.then(|| Zone {
            low: brk.low(),
            high: brk.high(),
            source: ZoneSource::WickCluster,
        })
    }

    fn validate_config(&self) -> Result<()> {
        if self.min_cluster.get() > self.window.get() {
            return Err(SignalError::InvalidConfig(
                "wick cluster size cannot exceed its window".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// CANDLE BASE
// ============================================================

/// Up to `max_candles` candles right before the break whose opens and closes
/// all sit within `tolerance` of the last close. The zone spans their
/// combined range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandleBase {
    pub max_candles: Period,
    pub min_candles: Period,
    pub tolerance: Ratio,
}

impl Default for CandleBase {
    fn default() -> Self {
        Self {
            max_candles: Period::new_const(BASE_MAX_CANDLES),
            min_candles: Period::new_const(BASE_MIN_CANDLES),
            tolerance: Ratio::new_const(BASE_TOLERANCE),
        }
    }
}

impl ZoneHeuristic for CandleBase {
    fn source(&self) -> ZoneSource {
        ZoneSource::CandleBase
    }

    fn try_identify<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _direction: Direction,
    ) -> Option<Zone> {
        bars.get(index)?;
        let base = &bars[index.saturating_sub(self.max_candles.get())..index];
        if base.len() < self.min_candles.get() {
            return None;
        }

        let reference = base.last()?.close();
        let tol = self.tolerance.get();
        let tight = base.iter().all(|bar| {
            within_tolerance(bar.open(), reference, tol)
                && within_tolerance(bar.close(), reference, tol)
        });

        tight.then(|| Zone {
            low: min_low(base),
            high: max_high(base),
            source: ZoneSource::CandleBase,
        })
    }

    fn validate_config(&self) -> Result<()> {
        if self.min_candles.get() > self.max_candles.get() {
            return Err(SignalError::InvalidConfig(
                "candle base min_candles cannot exceed max_candles".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// DISPATCH
// ============================================================

/// Generate the `ZoneMethod` enum with one variant per heuristic and
/// forwarding impls.
macro_rules! define_zone_methods {
  ($($variant:ident($heuristic:ty)),* $(,)?) => {
    /// One step of the zone identification chain
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "method", rename_all = "snake_case")]
    pub enum ZoneMethod {
      $($variant($heuristic),)*
    }

    impl ZoneMethod {
      pub fn source(&self) -> ZoneSource {
        match self {
          $(Self::$variant(h) => h.source(),)*
        }
      }

      #[inline]
      pub fn try_identify<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        direction: Direction,
      ) -> Option<Zone> {
        match self {
          $(Self::$variant(h) => h.try_identify(bars, index, direction),)*
        }
      }

      pub fn validate_config(&self) -> Result<()> {
        match self {
          $(Self::$variant(h) => h.validate_config(),)*
        }
      }
    }

    $(impl From<$heuristic> for ZoneMethod {
      fn from(h: $heuristic) -> Self { Self::$variant(h) }
    })*
  };
}

define_zone_methods! {
    OrderBlock(OrderBlock),
    WickCluster(WickCluster),
    CandleBase(CandleBase),
}

/// Ordered chain of zone heuristics; the first match wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneIdentifier {
    pub chain: Vec<ZoneMethod>,
}

impl Default for ZoneIdentifier {
    fn default() -> Self {
        Self {
            chain: vec![
                OrderBlock::default().into(),
                WickCluster::default().into(),
                CandleBase::default().into(),
            ],
        }
    }
}

impl ZoneIdentifier {
    pub fn new(chain: impl IntoIterator<Item = ZoneMethod>) -> Self {
        Self {
            chain: chain.into_iter().collect(),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.chain.is_empty() {
            return Err(SignalError::InvalidConfig(
                "zone chain must contain at least one method".into(),
            ));
        }
        self.chain.iter().try_for_each(ZoneMethod::validate_config)
    }

    pub fn identify<T: OHLCV>(&self, bars: &[T], index: usize, direction: Direction) -> Option<Zone> {
        let zone = self
            .chain
            .iter()
            .find_map(|method| method.try_identify(bars, index, direction));
        match &zone {
            Some(z) => debug!(index, source = ?z.source, low = z.low, high = z.high, "zone"),
            None => trace!(index, ?direction, "no zone"),
        }
        zone
    }
}

/// Identify a zone with the default chain.
pub fn identify_zone<T: OHLCV>(bars: &[T], index: usize, direction: Direction) -> Option<Zone> {
    ZoneIdentifier::default().identify(bars, index, direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    /// Four flat bullish candles, one bearish candle, then a bullish break.
    fn order_block_setup() -> Vec<Candle> {
        let mut bars: Vec<_> = (0..4i64)
            .map(|i| Candle::new(i, 49.0, 50.0, 48.0, 49.5))
            .collect();
        bars.push(Candle::new(4, 49.5, 50.0, 48.5, 48.8));
        bars.push(Candle::new(5, 49.0, 55.0, 48.9, 54.5));
        bars
    }

    fn wick_cluster_setup() -> Vec<Candle> {
        let mut bars: Vec<_> = (0..5i64)
            .map(|i| Candle::new(i, 100.0, 101.0, 99.5, 100.8))
            .collect();
        bars.push(Candle::new(5, 100.8, 103.0, 100.5, 102.5));
        bars
    }

    fn candle_base_setup() -> Vec<Candle> {
        let mut bars: Vec<_> = [99.9, 99.4, 98.8, 98.1, 97.3]
            .iter()
            .enumerate()
            .map(|(i, &low)| Candle::new(i as i64, 100.0, 100.6, low, 100.4))
            .collect();
        bars.push(Candle::new(5, 100.4, 102.0, 100.35, 101.5));
        bars
    }

    #[test]
    fn test_order_block() {
        let bars = order_block_setup();
        let zone = OrderBlock::default()
            .try_identify(&bars, 5, Direction::Bullish)
            .unwrap();
        assert_eq!(zone.source, ZoneSource::OrderBlock);
        assert!((zone.low - 48.8).abs() < 1e-9);
        assert!((zone.high - 49.5).abs() < 1e-9);
    }

    #[test]
    fn test_order_block_most_recent() {
        let mut bars = order_block_setup();
        bars[2] = Candle::new(2, 49.8, 50.0, 48.0, 49.1);
        let zone = OrderBlock::default()
            .try_identify(&bars, 5, Direction::Bullish)
            .unwrap();
        assert!((zone.low - 48.8).abs() < 1e-9);
    }

    #[test]
    fn test_order_block_bearish_needs_bullish_candle() {
        let bars: Vec<_> = (0..6i64)
            .map(|i| Candle::new(i, 50.0, 50.5, 48.0, 49.0))
            .collect();
        assert!(OrderBlock::default()
            .try_identify(&bars, 5, Direction::Bearish)
            .is_none());
        assert!(OrderBlock::default()
            .try_identify(&bars, 5, Direction::Bullish)
            .is_some());
    }

    #[test]
    fn test_bearish_order_block() {
        let mut bars: Vec<_> = (0..4i64)
            .map(|i| Candle::new(i, 50.0, 51.0, 49.0, 49.5))
            .collect();
        bars.push(Candle::new(4, 49.5, 50.5, 49.2, 50.2));
        bars.push(Candle::new(5, 50.0, 50.2, 44.0, 44.5));

        let zone = identify_zone(&bars, 5, Direction::Bearish).unwrap();
        assert_eq!(zone.source, ZoneSource::OrderBlock);
        assert!((zone.low - 49.5).abs() < 1e-9);
        assert!((zone.high - 50.2).abs() < 1e-9);
    }

    #[test]
    fn test_bearish_wick_cluster() {
        // Upper wicks of 0.5 on the bearish candles, 0.3 on the break
        let mut bars: Vec<_> = (0..5i64)
            .map(|i| Candle::new(i, 100.0, 100.5, 99.0, 99.2))
            .collect();
        bars.push(Candle::new(5, 99.2, 99.5, 97.0, 97.5));

        assert!(OrderBlock::default()
            .try_identify(&bars, 5, Direction::Bearish)
            .is_none());
        let zone = identify_zone(&bars, 5, Direction::Bearish).unwrap();
        assert_eq!(zone.source, ZoneSource::WickCluster);
        assert!((zone.low - 97.0).abs() < 1e-9);
        assert!((zone.high - 99.5).abs() < 1e-9);

        // Lower wicks are spread out, so the bullish reading finds no cluster
        let mut spread = bars.clone();
        for (k, bar) in spread.iter_mut().take(5).enumerate() {
            bar.low = 99.2 - 0.5 * (k + 1) as f64;
        }
        assert!(WickCluster::default()
            .try_identify(&spread, 5, Direction::Bearish)
            .is_some());
        assert!(WickCluster::default()
            .try_identify(&spread, 5, Direction::Bullish)
            .is_none());
    }

    #[test]
    fn test_order_block_lookback_limit() {
        let mut bars = vec![Candle::new(0, 50.0, 50.5, 48.0, 49.0)];
        bars.extend((1..7i64).map(|i| Candle::new(i, 49.0, 50.0, 48.0, 49.5)));
        // Bearish candle at 0 is six candles before the break at 6
        assert!(OrderBlock::default()
            .try_identify(&bars, 6, Direction::Bullish)
            .is_none());
    }

    #[test]
    fn test_wick_cluster() {
        let bars = wick_cluster_setup();
        assert!(OrderBlock::default()
            .try_identify(&bars, 5, Direction::Bullish)
            .is_none());

        let zone = identify_zone(&bars, 5, Direction::Bullish).unwrap();
        assert_eq!(zone.source, ZoneSource::WickCluster);
        assert!((zone.low - 100.5).abs() < 1e-9);
        assert!((zone.high - 103.0).abs() < 1e-9);
    }

    #[test]
    fn test_wick_cluster_dispersed() {
        let bars = candle_base_setup();
        assert!(WickCluster::default()
            .try_identify(&bars, 5, Direction::Bullish)
            .is_none());
    }

    #[test]
    fn test_candle_base() {
        let bars = candle_base_setup();
        let zone = identify_zone(&bars, 5, Direction::Bullish).unwrap();
        assert_eq!(zone.source, ZoneSource::CandleBase);
        assert!((zone.low - 97.3).abs() < 1e-9);
        assert!((zone.high - 100.6).abs() < 1e-9);
    }

    #[test]
    fn test_candle_base_too_few() {
        let bars = candle_base_setup();
        assert!(CandleBase::default()
            .try_identify(&bars, 1, Direction::Bullish)
            .is_none());
        assert!(CandleBase::default()
            .try_identify(&bars, 2, Direction::Bullish)
            .is_some());
    }

    #[test]
    fn test_no_zone() {
        let bars: Vec<_> = (0..6i64)
            .map(|k| {
                let o = 100.0 + 2.0 * k as f64;
                let c = o + 1.5;
                Candle::new(k, o, c + 0.1 * k as f64, o - 0.3 * (k + 1) as f64, c)
            })
            .collect();
        assert!(identify_zone(&bars, 5, Direction::Bullish).is_none());
    }

    #[test]
    fn test_custom_chain() {
        let bars = candle_base_setup();
        let order_blocks_only = ZoneIdentifier::new([OrderBlock::default().into()]);
        assert!(order_blocks_only.identify(&bars, 5, Direction::Bullish).is_none());

        let reordered = ZoneIdentifier::new([
            CandleBase::default().into(),
            OrderBlock::default().into(),
        ]);
        let zone = reordered.identify(&order_block_setup(), 5, Direction::Bullish).unwrap();
        // 49.5 closes sit more than 1% from 48.8, so the base fails and the order block applies
        assert_eq!(zone.source, ZoneSource::OrderBlock);
    }

    #[test]
    fn test_validate_config() {
        assert!(ZoneIdentifier::default().validate_config().is_ok());
        assert!(ZoneIdentifier { chain: vec![] }.validate_config().is_err());

        let bad = WickCluster {
            window: Period::new_const(2),
            ..Default::default()
        };
        assert!(ZoneIdentifier::new([bad.into()]).validate_config().is_err());
    }

    #[test]
    fn test_chain_serde() {
        let json = r#"{"chain":[{"method":"candle_base","tolerance":0.02},{"method":"order_block"}]}"#;
        let identifier: ZoneIdentifier = serde_json::from_str(json).unwrap();
        assert_eq!(identifier.chain.len(), 2);
        assert_eq!(identifier.chain[0].source(), ZoneSource::CandleBase);
        match &identifier.chain[0] {
            ZoneMethod::CandleBase(base) => assert_eq!(base.tolerance.get(), 0.02),
            other => panic!("unexpected method {other:?}"),
        }
    }
}
