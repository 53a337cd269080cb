//! Property tests for detector invariants.
//!
//! Uses proptest over random-walk candle series to verify:
//! 1. Range bounds: width, touches and edges come from the qualifying window
//! 2. Ranges never overlap and extensions stay inside the series
//! 3. Break conditions hold against the trailing lookback window
//! 4. Entries follow their break within the wait window
//! 5. Analysis is deterministic

use entryscan::prelude::{
    detect_breaks, detect_ranges, identify_zone, max_high, min_low, trigger_entry,
    AnalyzerBuilder, Candle, Direction, Side, Targets,
};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

/// Random walk with small bodies so consolidations show up regularly.
fn arb_series() -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((-1.0..1.0_f64, 0.0..1.0_f64, 0.0..1.0_f64), 20..200).prop_map(
        |steps| {
            let mut price = 100.0;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (change, up_wick, down_wick))| {
                    let open = price;
                    let close = open * (1.0 + change * 0.004);
                    let high = open.max(close) * (1.0 + up_wick * 0.002);
                    let low = open.min(close) * (1.0 - down_wick * 0.002);
                    price = close;
                    Candle::new(i as i64, open, high, low, close)
                })
                .collect()
        },
    )
}

// ── 1. Range Bounds ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn range_bounds_hold(bars in arb_series()) {
        let (ranges, _) = detect_ranges(&bars);
        for range in &ranges {
            let window = &bars[range.start_index..range.start_index + 15];
            prop_assert_eq!(range.range_high, max_high(window));
            prop_assert_eq!(range.range_low, min_low(window));
            prop_assert!(range.range_low < range.range_high);

            let width = range.width();
            prop_assert!((0.015..=0.03).contains(&width), "width {}", width);
            prop_assert!(range.top_touches >= 2);
            prop_assert!(range.bottom_touches >= 2);
            prop_assert!(range.top_touches <= 15 && range.bottom_touches <= 15);
        }
    }

    // ── 2. Non-overlap and Extension ─────────────────────────────────

    #[test]
    fn ranges_do_not_overlap(bars in arb_series()) {
        let (ranges, _) = detect_ranges(&bars);
        for pair in ranges.windows(2) {
            prop_assert!(pair[0].end_index <= pair[1].start_index);
        }
    }

    #[test]
    fn extension_stays_in_series(bars in arb_series()) {
        let (ranges, _) = detect_ranges(&bars);
        for range in &ranges {
            prop_assert!(range.end_index >= range.start_index + 15);
            prop_assert!(range.end_index <= bars.len());
            prop_assert_eq!(range.duration, range.end_index - range.start_index);

            // Every close up to the breakout stays inside the band
            for bar in &bars[range.start_index..range.end_index] {
                prop_assert!(bar.close >= range.range_low && bar.close <= range.range_high);
            }
            if let Some(breakout) = bars.get(range.end_index) {
                prop_assert!(breakout.close > range.range_high || breakout.close < range.range_low);
            }
        }
    }

    #[test]
    fn limit_entries_sit_on_range_edges(bars in arb_series()) {
        let (ranges, entries) = detect_ranges(&bars);
        for entry in &entries {
            let range = ranges
                .iter()
                .find(|r| r.end_index - 1 == entry.bar_index)
                .expect("entry belongs to a range");
            match (entry.side, entry.targets) {
                (Side::Long, Targets::Range { tp2, .. }) => {
                    prop_assert_eq!(entry.entry_price, range.range_low);
                    prop_assert_eq!(tp2, range.range_high);
                    prop_assert!(entry.stop_loss < entry.entry_price);
                }
                (Side::Short, Targets::Range { tp2, .. }) => {
                    prop_assert_eq!(entry.entry_price, range.range_high);
                    prop_assert_eq!(tp2, range.range_low);
                    prop_assert!(entry.stop_loss > entry.entry_price);
                }
                (_, other) => prop_assert!(false, "unexpected targets {:?}", other),
            }
        }
    }

    // ── 3. Break Conditions ──────────────────────────────────────────

    #[test]
    fn breaks_exceed_lookback(bars in arb_series(), lookback in 1usize..10) {
        for signal in detect_breaks(&bars, lookback) {
            let i = signal.index;
            prop_assert!(i >= lookback);
            let prior = &bars[i - lookback..i];
            let bullish = bars[i].high > max_high(prior);
            match signal.direction {
                Direction::Bullish => prop_assert!(bullish),
                Direction::Bearish => {
                    prop_assert!(!bullish);
                    prop_assert!(bars[i].low < min_low(prior));
                }
            }
        }
    }

    // ── 4. Entry Window ──────────────────────────────────────────────

    #[test]
    fn entries_follow_break(bars in arb_series()) {
        for signal in detect_breaks(&bars, 5) {
            let Some(zone) = identify_zone(&bars, signal.index, signal.direction) else {
                continue;
            };
            if let Some(entry) = trigger_entry(&bars, signal.index, signal.direction, &zone) {
                prop_assert!(entry.bar_index > signal.index);
                prop_assert!(entry.bar_index <= signal.index + 9);
                prop_assert!(zone.contains(entry.entry_price));
                match entry.side {
                    Side::Long => prop_assert_eq!(entry.stop_loss, zone.low),
                    Side::Short => prop_assert_eq!(entry.stop_loss, zone.high),
                }
            }
        }
    }

    // ── 5. Determinism ───────────────────────────────────────────────

    #[test]
    fn analysis_is_deterministic(bars in arb_series()) {
        let analyzer = AnalyzerBuilder::new().build().unwrap();
        let first = analyzer.analyze(&bars).unwrap();
        let second = analyzer.analyze(&bars).unwrap();
        prop_assert_eq!(first, second);
    }
}
