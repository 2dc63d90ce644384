// 🧭 Resolver - Roster names → county codes
//
// Runs the three strategies in strict priority order:
//   Exact → Normalized → Substring
// Each stage only sees what the previous stages left unmatched, and a match
// is never revisited.

use crate::config::MatchingConfig;
use crate::matching::{
    CollisionPolicy, ExactMatcher, MatchRecord, MatchStage, NormalizedIndex, NormalizedMatcher,
    SubstringMatcher,
};
use crate::normalize::Normalizer;
use crate::table::MasterRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// RESOLUTION RESULT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionDiagnostics {
    pub roster_count: usize,
    pub exact_count: usize,
    pub normalized_count: usize,
    pub substring_count: usize,

    /// Normalized keys shared by more than one county code
    pub ambiguous_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// One record per matched roster name, ordered by roster name
    pub records: Vec<MatchRecord>,

    /// Deduplicated county codes
    pub matched_codes: BTreeSet<String>,

    /// Earliest stage that accepted each matched code, homonym codes included
    pub code_stages: BTreeMap<String, MatchStage>,

    /// Master names that were accepted by some stage
    pub matched_master_names: BTreeSet<String>,

    /// Roster names that were matched
    pub matched_roster_names: BTreeSet<String>,

    /// Roster names left for manual follow-up
    pub unmatched: BTreeSet<String>,

    pub diagnostics: ResolutionDiagnostics,
}

impl ResolutionResult {
    pub fn matched_count(&self) -> usize {
        self.matched_codes.len()
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched.len()
    }

    /// Zero matches is a valid result; callers decide whether it is fatal
    pub fn is_empty(&self) -> bool {
        self.matched_codes.is_empty()
    }

    pub fn record_for(&self, roster_name: &str) -> Option<&MatchRecord> {
        self.records.iter().find(|r| r.roster_name == roster_name)
    }

    pub fn stage_of(&self, roster_name: &str) -> Option<MatchStage> {
        self.record_for(roster_name).map(|r| r.stage)
    }

    pub fn stage_for_code(&self, code: &str) -> Option<MatchStage> {
        self.code_stages.get(code).copied()
    }

    pub fn summary(&self) -> String {
        format!(
            "Resolved {} of {} roster names → {} codes (exact {}, normalized {}, substring {}), {} unmatched",
            self.matched_roster_names.len(),
            self.diagnostics.roster_count,
            self.matched_count(),
            self.diagnostics.exact_count,
            self.diagnostics.normalized_count,
            self.diagnostics.substring_count,
            self.unmatched_count()
        )
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct Resolver {
    normalizer: Normalizer,
    collision_policy: CollisionPolicy,
    workers: usize,
}

impl Resolver {
    /// Create resolver with default tokens, last-writer-wins, single thread
    pub fn new() -> Self {
        Resolver::from_config(&MatchingConfig::default())
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Resolver {
            normalizer: Normalizer::new(config.suffix_tokens.iter().cloned()),
            collision_policy: config.collision_policy,
            workers: config.workers.max(1),
        }
    }

    pub fn with_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Resolve every roster name. Blank names are dropped before matching and
    /// appear in neither the matched nor the unmatched set.
    pub fn resolve(
        &self,
        roster_names: &BTreeSet<String>,
        master: &[MasterRecord],
    ) -> ResolutionResult {
        let blank = roster_names.iter().filter(|n| n.trim().is_empty()).count();
        if blank > 0 {
            tracing::debug!(blank, "dropped blank roster names");
        }
        let owned: BTreeSet<String> = roster_names
            .iter()
            .filter(|n| !n.trim().is_empty())
            .cloned()
            .collect();
        let roster_names = &owned;

        let mut records: BTreeMap<String, MatchRecord> = BTreeMap::new();
        let mut code_stages: BTreeMap<String, MatchStage> = BTreeMap::new();
        let mut diagnostics = ResolutionDiagnostics {
            roster_count: roster_names.len(),
            ..Default::default()
        };

        // Stage 1: exact
        let exact = ExactMatcher::new().match_names(roster_names, master);
        diagnostics.exact_count = exact.records.len();
        for code in exact.codes {
            code_stages.entry(code).or_insert(MatchStage::Exact);
        }
        for record in exact.records {
            records.insert(record.roster_name.clone(), record);
        }
        tracing::info!(matched = diagnostics.exact_count, "exact stage complete");

        // Stage 2: normalized
        let remaining = residual(roster_names, &records);
        if !remaining.is_empty() {
            let index = NormalizedIndex::build(master, &self.normalizer);
            diagnostics.ambiguous_keys = index.ambiguous_keys();
            for key in &diagnostics.ambiguous_keys {
                let codes: Vec<&str> = index.candidates(key).iter().map(|e| e.code.as_str()).collect();
                tracing::warn!(key = %key, codes = ?codes, policy = ?self.collision_policy, "normalized key shared by several counties");
            }

            let found = NormalizedMatcher::new(&index, &self.normalizer, self.collision_policy)
                .match_names(&remaining, self.workers);
            diagnostics.normalized_count = found.len();
            accept(found, &mut records, &mut code_stages);
        }
        tracing::info!(matched = diagnostics.normalized_count, "normalized stage complete");

        // Stage 3: substring
        let remaining = residual(roster_names, &records);
        if !remaining.is_empty() {
            let found = SubstringMatcher::new(master, &self.normalizer)
                .match_names(&remaining, self.workers);
            diagnostics.substring_count = found.len();
            accept(found, &mut records, &mut code_stages);
        }
        tracing::info!(matched = diagnostics.substring_count, "substring stage complete");

        let unmatched: BTreeSet<String> = residual(roster_names, &records).into_iter().collect();
        if !unmatched.is_empty() {
            tracing::warn!(count = unmatched.len(), names = ?unmatched, "roster names left unmatched");
        }

        let records: Vec<MatchRecord> = records.into_values().collect();
        let matched_codes = code_stages.keys().cloned().collect();
        let matched_master_names = records.iter().map(|r| r.master_name.clone()).collect();
        let matched_roster_names = records.iter().map(|r| r.roster_name.clone()).collect();

        ResolutionResult {
            records,
            matched_codes,
            code_stages,
            matched_master_names,
            matched_roster_names,
            unmatched,
            diagnostics,
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Roster names without a record yet, in roster order
fn residual(roster_names: &BTreeSet<String>, records: &BTreeMap<String, MatchRecord>) -> Vec<String> {
    roster_names
        .iter()
        .filter(|name| !records.contains_key(*name))
        .cloned()
        .collect()
}

fn accept(
    found: Vec<MatchRecord>,
    records: &mut BTreeMap<String, MatchRecord>,
    code_stages: &mut BTreeMap<String, MatchStage>,
) {
    for record in found {
        tracing::debug!(roster = %record.roster_name, master = %record.master_name, code = %record.code, stage = %record.stage, "matched");
        code_stages.entry(record.code.clone()).or_insert(record.stage);
        records.entry(record.roster_name.clone()).or_insert(record);
    }
}

// ============================================================================
// TESTS
// ============================================================================
