// 🗺️ Mapping Builder - County code → delisting info
//
// An independent second pass over the two tables: it keeps its own
// name → code index so it never depends on the resolver's internal state.

use crate::normalize::Normalizer;
use crate::table::{MasterRecord, RosterEntry};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

// ============================================================================
// DELISTING INFO
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelistingInfo {
    pub name: String,

    /// Year the county was delisted (摘帽), None when the field has none
    pub year: Option<i32>,
}

// ============================================================================
// YEAR EXTRACTION
// ============================================================================

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"20[0-9]{2}").expect("year pattern is valid"))
}

/// Extract a year from a free-text status field.
///
/// 1. first "20xx" token anywhere in the text
/// 2. otherwise the whole field read as a number, truncated
/// 3. otherwise None
pub fn extract_year(value: Option<&str>) -> Option<i32> {
    let value = value?;

    if let Some(m) = year_pattern().find(value) {
        return m.as_str().parse::<i32>().ok();
    }

    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(f64::trunc)
        .filter(|v| *v >= i32::MIN as f64 && *v <= i32::MAX as f64)
        .map(|v| v as i32)
}

// ============================================================================
// NAME INDEX
// ============================================================================

/// name → code in first-insertion order; a later row overwrites the code
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    order: Vec<String>,
    codes: HashMap<String, String>,
}

impl NameIndex {
    pub fn build(master: &[MasterRecord]) -> Self {
        let mut index = NameIndex::default();

        for record in master {
            if record.name.is_empty() || record.code.is_empty() {
                continue;
            }
            if !index.codes.contains_key(&record.name) {
                index.order.push(record.name.clone());
            }
            index.codes.insert(record.name.clone(), record.code.clone());
        }

        index
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.codes.get(name).map(|c| c.as_str())
    }

    /// (name, code) pairs in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(move |name| (name.as_str(), self.codes[name].as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ============================================================================
// MAPPING BUILDER
// ============================================================================

pub struct MappingBuilder {
    normalizer: Normalizer,
}

impl MappingBuilder {
    pub fn new(normalizer: Normalizer) -> Self {
        MappingBuilder { normalizer }
    }

    pub fn build(
        &self,
        master: &[MasterRecord],
        roster: &[RosterEntry],
    ) -> BTreeMap<String, DelistingInfo> {
        let index = NameIndex::build(master);

        // Normalized keys of the index, computed once, same order as the index
        let normalized: Vec<(String, &str, &str)> = index
            .iter()
            .map(|(name, code)| (self.normalizer.normalize(name), name, code))
            .collect();

        let mut mapping = BTreeMap::new();
        let mut fallback_hits = 0usize;

        for entry in roster {
            if entry.name.is_empty() {
                continue;
            }
            let year = extract_year(entry.status_date.as_deref());

            if let Some(code) = index.get(&entry.name) {
                mapping.insert(
                    code.to_string(),
                    DelistingInfo {
                        name: entry.name.clone(),
                        year,
                    },
                );
                continue;
            }

            let key = self.normalizer.normalize(&entry.name);
            if key.is_empty() {
                continue;
            }

            if let Some((_, name, code)) = normalized.iter().find(|(k, _, _)| *k == key) {
                fallback_hits += 1;
                mapping.insert(
                    code.to_string(),
                    DelistingInfo {
                        name: name.to_string(),
                        year,
                    },
                );
            }
        }

        tracing::info!(
            entries = mapping.len(),
            fallback = fallback_hits,
            with_year = mapping.values().filter(|i: &&DelistingInfo| i.year.is_some()).count(),
            "built delisting mapping"
        );

        mapping
    }
}

impl Default for MappingBuilder {
    fn default() -> Self {
        MappingBuilder::new(Normalizer::default())
    }
}
