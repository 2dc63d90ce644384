// Strategy 3: Substring Match
// Last resort: the stripped roster name is contained in a master name, or the
// other way round. Master order decides ties, so the scan stops at the first hit.

use super::{probe_all, MatchRecord, MatchStage};
use crate::normalize::Normalizer;
use crate::table::MasterRecord;

pub struct SubstringMatcher<'a> {
    master: &'a [MasterRecord],
    normalizer: &'a Normalizer,
}

impl<'a> SubstringMatcher<'a> {
    pub fn new(master: &'a [MasterRecord], normalizer: &'a Normalizer) -> Self {
        SubstringMatcher { master, normalizer }
    }

    /// Scan master rows in source order; first containment hit wins
    pub fn probe(&self, roster_name: &str) -> Option<MatchRecord> {
        let base = self.normalizer.normalize(roster_name);

        // An empty base is contained in every name
        if base.is_empty() {
            return None;
        }

        for record in self.master {
            if record.name.is_empty() || record.code.is_empty() {
                continue;
            }

            if record.name.contains(base.as_str()) || base.contains(record.name.as_str()) {
                return Some(MatchRecord::new(
                    roster_name,
                    &record.code,
                    &record.name,
                    MatchStage::Substring,
                ));
            }
        }

        None
    }

    pub fn match_names(&self, unmatched: &[String], workers: usize) -> Vec<MatchRecord> {
        probe_all(unmatched, workers, |name| self.probe(name))
    }
}
