//! Retracement entries into the zone behind a break of structure

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bos::{BosDetector, BreakSignal};
use super::helpers::{ENTRY_MAX_WAIT, REWARD_MULTIPLE};
use super::zone::{Zone, ZoneIdentifier};
use crate::{
    params::{get_multiple, get_period, ParamMeta, ParameterizedDetector},
    Direction, EntrySignal, Period, Result, SignalError, Targets, OHLCV,
};

impl_with_defaults!(EntryTrigger);

/// Waits up to `max_wait` candles after a break for price to revisit the zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryTrigger {
    pub max_wait: Period,
    /// Target distance as a multiple of the break extreme to zone distance
    pub reward_multiple: f64,
}

impl Default for EntryTrigger {
    fn default() -> Self {
        Self {
            max_wait: Period::new_const(ENTRY_MAX_WAIT),
            reward_multiple: REWARD_MULTIPLE,
        }
    }
}

impl EntryTrigger {
    pub fn id(&self) -> &'static str {
        "IN_PRICE_ENTRY"
    }

    pub fn validate_config(&self) -> Result<()> {
        if !self.reward_multiple.is_finite() || self.reward_multiple <= 0.0 {
            return Err(SignalError::InvalidConfig(format!(
                "reward_multiple must be positive, got {}",
                self.reward_multiple
            )));
        }
        Ok(())
    }

    /// First candle after the break whose retracement extreme lands in `zone`.
    ///
    /// Bullish breaks enter long at the candle low with the stop at the zone
    /// low; bearish breaks enter short at the candle high with the stop at the
    /// zone high. The target projects from the break candle's extreme.
    pub fn trigger<T: OHLCV>(
        &self,
        bars: &[T],
        signal: &BreakSignal,
        zone: &Zone,
    ) -> Option<EntrySignal> {
        let brk = bars.get(signal.index)?;
        let last = signal
            .index
            .saturating_add(self.max_wait.get())
            .min(bars.len() - 1);
        let m = self.reward_multiple;

        (signal.index + 1..=last).find_map(|i| {
            let bar = &bars[i];
            let (entry_price, stop_loss, tp_level) = match signal.direction {
                Direction::Bullish if zone.contains(bar.low()) => (
                    bar.low(),
                    zone.low,
                    brk.high() + m * (brk.high() - zone.low),
                ),
                Direction::Bearish if zone.contains(bar.high()) => (
                    bar.high(),
                    zone.high,
                    brk.low() - m * (zone.high - brk.low()),
                ),
                _ => return None,
            };

            debug!(
                break_index = signal.index,
                bar_index = i,
                entry_price,
                stop_loss,
                tp_level,
                "in-price entry"
            );
            Some(EntrySignal {
                bar_index: i,
                entry_time: bar.timestamp(),
                side: signal.direction.side(),
                entry_price,
                stop_loss,
                targets: Targets::Projected { tp_level },
            })
        })
    }
}

/// Trigger an entry with the default wait and reward multiple.
pub fn trigger_entry<T: OHLCV>(
    bars: &[T],
    break_index: usize,
    direction: Direction,
    zone: &Zone,
) -> Option<EntrySignal> {
    let signal = BreakSignal {
        index: break_index,
        direction,
    };
    EntryTrigger::default().trigger(bars, &signal, zone)
}

/// Full in-price pipeline: breaks, then a zone and an entry per break.
///
/// Breaks without a zone or without a retracement contribute no entry.
pub fn scan_in_price<T: OHLCV>(
    bars: &[T],
    bos: &BosDetector,
    zones: &ZoneIdentifier,
    trigger: &EntryTrigger,
) -> (Vec<BreakSignal>, Vec<EntrySignal>) {
    let breaks = bos.detect(bars);
    let entries = breaks
        .iter()
        .filter_map(|signal| {
            let zone = zones.identify(bars, signal.index, signal.direction)?;
            trigger.trigger(bars, signal, &zone)
        })
        .collect();
    (breaks, entries)
}

/// Run the in-price pipeline with default settings and return its entries.
pub fn detect_in_price_entries<T: OHLCV>(bars: &[T]) -> Vec<EntrySignal> {
    scan_in_price(
        bars,
        &BosDetector::default(),
        &ZoneIdentifier::default(),
        &EntryTrigger::default(),
    )
    .1
}

static ENTRY_PARAMS: &[ParamMeta] = &[
    ParamMeta::period(
        "max_wait",
        ENTRY_MAX_WAIT as f64,
        (3.0, 20.0, 1.0),
        "Candles after the break in which a retracement may trigger",
    ),
    ParamMeta::multiple(
        "reward_multiple",
        REWARD_MULTIPLE,
        (1.0, 5.0, 0.5),
        "Target distance as a multiple of the zone distance",
    ),
];

impl ParameterizedDetector for EntryTrigger {
    fn param_meta() -> &'static [ParamMeta] {
        ENTRY_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            max_wait: get_period(params, "max_wait", ENTRY_MAX_WAIT)?,
            reward_multiple: get_multiple(params, "reward_multiple", REWARD_MULTIPLE)?,
        })
    }

    fn detector_id_str() -> &'static str {
        "IN_PRICE_ENTRY"
    }
}
