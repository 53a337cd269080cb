//! Trend filter: classifies a window as strictly trending or ranging

use serde::{Deserialize, Serialize};

use crate::OHLCV;

/// Market trend classification of a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    /// Every candle makes a higher high and a higher low
    Up,
    /// Every candle makes a lower high and a lower low
    Down,
    #[default]
    Ranging,
}

impl Trend {
    #[inline]
    pub fn is_trending(self) -> bool {
        !matches!(self, Trend::Ranging)
    }
}

/// Classify `window`. A single pair of candles breaking the sequence makes
/// the whole window ranging; windows shorter than 2 are ranging.
pub fn classify_trend<T: OHLCV>(window: &[T]) -> Trend {
    if window.len() < 2 {
        return Trend::Ranging;
    }

    let mut up = true;
    let mut down = true;

    for pair in window.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        up &= cur.high() > prev.high() && cur.low() > prev.low();
        down &= cur.high() < prev.high() && cur.low() < prev.low();
        if !up && !down {
            return Trend::Ranging;
        }
    }

    if up {
        Trend::Up
    } else {
        Trend::Down
    }
}

/// True when `window` is a strict uptrend or a strict downtrend
#[inline]
pub fn is_trending<T: OHLCV>(window: &[T]) -> bool {
    classify_trend(window).is_trending()
}
