//! Range and break-of-structure detectors
//!
//! # Pipelines
//!
//! - **Limit catch**: [`is_trending`] rejects directional windows, then
//!   [`RangeDetector`] finds, extends and trades consolidation ranges.
//! - **In-price**: [`BosDetector`] finds breaks of structure, [`ZoneIdentifier`]
//!   locates the zone behind each break (order block, wick cluster, candle base),
//!   and [`EntryTrigger`] waits for the retracement into it.

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod bos;
pub mod entry;
pub mod range;
pub mod trend;
pub mod zone;

// Re-export all detectors for convenience
pub use bos::*;
pub use entry::*;
pub use helpers::*;
pub use range::*;
pub use trend::*;
pub use zone::*;
