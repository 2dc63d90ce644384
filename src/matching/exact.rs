// Strategy 1: Exact Match
// Raw roster name present verbatim among master names.

use super::{MatchRecord, MatchStage};
use crate::table::MasterRecord;
use std::collections::{BTreeMap, BTreeSet};

/// Output of the exact stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExactMatches {
    /// One record per matched roster name (first master row with a code)
    pub records: Vec<MatchRecord>,

    /// Every distinct code carried by an exact-matched master row
    pub codes: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl ExactMatcher {
    pub fn new() -> Self {
        ExactMatcher
    }

    /// Master rows whose raw name is in the roster set, in master order.
    /// A blank name is never a candidate.
    pub fn find<'a>(
        &self,
        roster_names: &BTreeSet<String>,
        master: &'a [MasterRecord],
    ) -> Vec<&'a MasterRecord> {
        master
            .iter()
            .filter(|record| !record.name.trim().is_empty())
            .filter(|record| roster_names.contains(&record.name))
            .collect()
    }

    pub fn match_names(
        &self,
        roster_names: &BTreeSet<String>,
        master: &[MasterRecord],
    ) -> ExactMatches {
        let mut first_hit: BTreeMap<&str, &MasterRecord> = BTreeMap::new();
        let mut codes = BTreeSet::new();

        for record in self.find(roster_names, master) {
            if record.code.is_empty() {
                continue;
            }
            codes.insert(record.code.clone());
            first_hit.entry(record.name.as_str()).or_insert(record);
        }

        let records = first_hit
            .into_iter()
            .map(|(name, record)| MatchRecord::new(name, &record.code, &record.name, MatchStage::Exact))
            .collect();

        ExactMatches { records, codes }
    }
}
