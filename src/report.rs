//! Analysis results and the response payload built from them

use serde::Serialize;

use crate::{
    detectors::{BreakSignal, RangeRecord},
    EntrySignal, Strategy,
};

/// Returned instead of an empty strategy list
pub const NO_STRATEGY_APPLICABLE: &str = "No strategy applicable";

/// Everything one analysis run found
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub ranges: Vec<RangeRecord>,
    pub breaks: Vec<BreakSignal>,
    pub limit_entries: Vec<EntrySignal>,
    pub in_price_entries: Vec<EntrySignal>,
}

impl AnalysisReport {
    /// No entries from either strategy
    pub fn is_empty(&self) -> bool {
        self.limit_entries.is_empty() && self.in_price_entries.is_empty()
    }

    pub fn entries(&self, strategy: Strategy) -> &[EntrySignal] {
        match strategy {
            Strategy::LimitCatch => &self.limit_entries,
            Strategy::InPrice => &self.in_price_entries,
        }
    }

    /// Tagged payload: one block per strategy with entries, or the
    /// "No strategy applicable" message.
    pub fn to_response(&self) -> Response {
        let blocks: Vec<_> = Strategy::ALL
            .iter()
            .filter(|&&s| !self.entries(s).is_empty())
            .map(|&s| StrategyEntries {
                strategy: s.label(),
                entries: self.entries(s).to_vec(),
            })
            .collect();

        let result = if blocks.is_empty() {
            ResultPayload::Message(NO_STRATEGY_APPLICABLE)
        } else {
            ResultPayload::Strategies(blocks)
        };
        Response { result }
    }
}

/// Entries of one strategy, tagged with its label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyEntries {
    pub strategy: &'static str,
    pub entries: Vec<EntrySignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Strategies(Vec<StrategyEntries>),
    Message(&'static str),
}

/// Top-level payload: `{"result": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub result: ResultPayload,
}
