// Strategy 2: Normalized Match
// Roster and master names compared after suffix tokens are stripped.
//
// The index keeps every (name, code) per key instead of overwriting, so a
// shared key is visible and the collision policy decides what a lookup means.

use super::{probe_all, CollisionPolicy, MatchRecord, MatchStage};
use crate::normalize::Normalizer;
use crate::table::MasterRecord;
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// INDEX
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub code: String,

    /// Row of the first occurrence in the master table
    pub first_row: usize,

    /// Row of the latest occurrence in the master table
    pub last_row: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedIndex {
    /// Normalized key → entries ordered by latest occurrence
    entries: HashMap<String, Vec<IndexEntry>>,
}

impl NormalizedIndex {
    /// Build over the whole master table. Rows with an empty key or an empty
    /// code are skipped; a repeated (name, code) moves to the back of its
    /// bucket and keeps its first row.
    pub fn build(master: &[MasterRecord], normalizer: &Normalizer) -> Self {
        let mut entries: HashMap<String, Vec<IndexEntry>> = HashMap::new();

        for (row, record) in master.iter().enumerate() {
            let key = normalizer.normalize(&record.name);
            if key.is_empty() || record.code.is_empty() {
                continue;
            }

            let bucket = entries.entry(key).or_default();
            let first_row = match bucket
                .iter()
                .position(|e| e.name == record.name && e.code == record.code)
            {
                Some(pos) => bucket.remove(pos).first_row,
                None => row,
            };
            bucket.push(IndexEntry {
                name: record.name.clone(),
                code: record.code.clone(),
                first_row,
                last_row: row,
            });
        }

        NormalizedIndex { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry recorded for a key
    pub fn candidates(&self, key: &str) -> &[IndexEntry] {
        self.entries.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Resolve a key under the given policy
    pub fn lookup(&self, key: &str, policy: CollisionPolicy) -> Option<&IndexEntry> {
        if key.is_empty() {
            return None;
        }
        let candidates = self.candidates(key);

        match policy {
            CollisionPolicy::LastWriterWins => candidates.last(),
            CollisionPolicy::FirstWriterWins => candidates.iter().min_by_key(|e| e.first_row),
            CollisionPolicy::RejectAmbiguous => {
                if distinct_codes(candidates) > 1 {
                    None
                } else {
                    candidates.last()
                }
            }
        }
    }

    /// Keys shared by more than one distinct code, sorted
    pub fn ambiguous_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, candidates)| distinct_codes(candidates) > 1)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

fn distinct_codes(candidates: &[IndexEntry]) -> usize {
    candidates
        .iter()
        .map(|e| e.code.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

// ============================================================================
// MATCHER
// ============================================================================

pub struct NormalizedMatcher<'a> {
    index: &'a NormalizedIndex,
    normalizer: &'a Normalizer,
    policy: CollisionPolicy,
}

impl<'a> NormalizedMatcher<'a> {
    pub fn new(index: &'a NormalizedIndex, normalizer: &'a Normalizer, policy: CollisionPolicy) -> Self {
        NormalizedMatcher {
            index,
            normalizer,
            policy,
        }
    }

    /// Probe one roster name; a hit is accepted unconditionally
    pub fn probe(&self, roster_name: &str) -> Option<MatchRecord> {
        let key = self.normalizer.normalize(roster_name);
        self.index
            .lookup(&key, self.policy)
            .map(|entry| MatchRecord::new(roster_name, &entry.code, &entry.name, MatchStage::Normalized))
    }

    pub fn match_names(&self, unmatched: &[String], workers: usize) -> Vec<MatchRecord> {
        probe_all(unmatched, workers, |name| self.probe(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(master: &[MasterRecord]) -> NormalizedIndex {
        NormalizedIndex::build(master, &Normalizer::default())
    }

    #[test]
    fn test_normalized_match_on_suffix_divergence() {
        let master = vec![
            MasterRecord::new("001010", "略阳县"),
            MasterRecord::new("001020", "宁强县"),
        ];
        let index = index(&master);
        let normalizer = Normalizer::default();
        let matcher = NormalizedMatcher::new(&index, &normalizer, CollisionPolicy::LastWriterWins);

        let record = matcher.probe("宁强").unwrap();
        assert_eq!(record.code, "001020");
        assert_eq!(record.master_name, "宁强县");
        assert_eq!(record.roster_name, "宁强");
        assert_eq!(record.stage, MatchStage::Normalized);

        // Roster carries a token the master omits
        let master = vec![MasterRecord::new("002", "韩城")];
        let index = NormalizedIndex::build(&master, &normalizer);
        let matcher = NormalizedMatcher::new(&index, &normalizer, CollisionPolicy::LastWriterWins);
        assert_eq!(matcher.probe("韩城市").unwrap().code, "002");
    }

    #[test]
    fn test_empty_key_never_matches() {
        let master = vec![MasterRecord::new("001", "县")];
        let index = index(&master);
        assert!(index.is_empty());

        let normalizer = Normalizer::default();
        let matcher = NormalizedMatcher::new(&index, &normalizer, CollisionPolicy::LastWriterWins);
        assert!(matcher.probe("区").is_none());
        assert!(matcher.probe("").is_none());
    }

    #[test]
    fn test_rows_without_code_are_not_indexed() {
        let index = index(&[MasterRecord::new("", "略阳县")]);
        assert!(index.lookup("略阳", CollisionPolicy::LastWriterWins).is_none());
    }

    #[test]
    fn test_collision_policies() {
        // "城区" and "城县" share the key "城"
        let master = vec![
            MasterRecord::new("100", "城区"),
            MasterRecord::new("200", "城县"),
        ];
        let index = index(&master);

        assert_eq!(index.candidates("城").len(), 2);
        assert_eq!(index.lookup("城", CollisionPolicy::LastWriterWins).unwrap().code, "200");
        assert_eq!(index.lookup("城", CollisionPolicy::FirstWriterWins).unwrap().code, "100");
        assert!(index.lookup("城", CollisionPolicy::RejectAmbiguous).is_none());
        assert_eq!(index.ambiguous_keys(), vec!["城".to_string()]);
    }

    #[test]
    fn test_panel_repeats_are_not_collisions() {
        let master = vec![
            MasterRecord::new("100", "城区"),
            MasterRecord::new("200", "城县"),
            MasterRecord::new("100", "城区"),
        ];
        let index = index(&master);

        // Repeated (name, code) moves to its latest row, so it wins again
        assert_eq!(index.candidates("城").len(), 2);
        assert_eq!(index.lookup("城", CollisionPolicy::LastWriterWins).unwrap().code, "100");
        assert_eq!(index.lookup("城", CollisionPolicy::FirstWriterWins).unwrap().code, "100");
        assert_eq!(index.candidates("城")[1].first_row, 0);
        assert_eq!(index.candidates("城")[1].last_row, 2);

        let same_county = vec![
            MasterRecord::new("100", "宁强县"),
            MasterRecord::new("100", "宁强"),
        ];
        let index = NormalizedIndex::build(&same_county, &Normalizer::default());
        assert!(index.ambiguous_keys().is_empty());
        assert_eq!(index.lookup("宁强", CollisionPolicy::RejectAmbiguous).unwrap().code, "100");
    }

    #[test]
    fn test_match_names_parallel_equals_sequential() {
        let master: Vec<MasterRecord> = (0..50)
            .map(|i| MasterRecord::new(&format!("{:06}", i), &format!("测{}县", i)))
            .collect();
        let index = index(&master);
        let normalizer = Normalizer::default();
        let matcher = NormalizedMatcher::new(&index, &normalizer, CollisionPolicy::LastWriterWins);

        let names: Vec<String> = (0..80).map(|i| format!("测{}", i)).collect();
        let sequential = matcher.match_names(&names, 1);
        assert_eq!(sequential.len(), 50);
        assert_eq!(matcher.match_names(&names, 4), sequential);
    }
}
