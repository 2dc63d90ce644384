// 🔍 Matching Strategies - Roster name → county code
// Three strategies, strict priority: Exact, Normalized, Substring

pub mod exact;
pub mod normalized;
pub mod substring;

pub use exact::ExactMatcher;
pub use normalized::{IndexEntry, NormalizedIndex, NormalizedMatcher};
pub use substring::SubstringMatcher;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// MATCH STAGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchStage {
    /// Raw roster name equals a raw master name
    Exact,

    /// Normalized keys are equal
    Normalized,

    /// One name contains the other (first master row wins)
    Substring,
}

impl MatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStage::Exact => "exact",
            MatchStage::Normalized => "normalized",
            MatchStage::Substring => "substring",
        }
    }

    pub fn all() -> [MatchStage; 3] {
        [MatchStage::Exact, MatchStage::Normalized, MatchStage::Substring]
    }
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MATCH RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Name as written in the roster
    pub roster_name: String,

    /// County code of the accepted master row
    pub code: String,

    /// Name as written in the master table
    pub master_name: String,

    /// Which strategy accepted the pair
    pub stage: MatchStage,
}

impl MatchRecord {
    pub fn new(roster_name: &str, code: &str, master_name: &str, stage: MatchStage) -> Self {
        MatchRecord {
            roster_name: roster_name.to_string(),
            code: code.to_string(),
            master_name: master_name.to_string(),
            stage,
        }
    }
}

// ============================================================================
// COLLISION POLICY
// ============================================================================

/// What a normalized-key lookup does when several counties share the key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The most recently enumerated master row wins
    #[default]
    LastWriterWins,

    /// The first enumerated master row wins
    FirstWriterWins,

    /// A key carrying more than one distinct code matches nothing
    RejectAmbiguous,
}

// ============================================================================
// PROBING
// ============================================================================

/// Run `probe` over every name, optionally on a dedicated rayon pool.
///
/// The parallel collect is indexed, so the output equals the sequential run.
pub fn probe_all<F>(names: &[String], workers: usize, probe: F) -> Vec<MatchRecord>
where
    F: Fn(&str) -> Option<MatchRecord> + Sync,
{
    if workers <= 1 || names.len() < 2 {
        return names.iter().filter_map(|name| probe(name.as_str())).collect();
    }

    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(|| {
            names
                .par_iter()
                .filter_map(|name| probe(name.as_str()))
                .collect()
        }),
        Err(e) => {
            tracing::warn!(error = %e, workers, "failed to build probe pool, probing inline");
            names.iter().filter_map(|name| probe(name.as_str())).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("县{:03}", i)).collect()
    }

    fn probe_even(name: &str) -> Option<MatchRecord> {
        let n: usize = name.trim_start_matches('县').parse().ok()?;
        if n % 2 == 0 {
            Some(MatchRecord::new(name, &n.to_string(), name, MatchStage::Substring))
        } else {
            None
        }
    }

    #[test]
    fn test_parallel_probe_matches_sequential() {
        let input = names(101);
        let sequential = probe_all(&input, 1, probe_even);

        for workers in [2, 3, 8, 200] {
            assert_eq!(probe_all(&input, workers, probe_even), sequential);
        }
        assert_eq!(sequential.len(), 51);
    }

    #[test]
    fn test_probe_empty_input() {
        assert!(probe_all(&[], 4, probe_even).is_empty());
    }

    #[test]
    fn test_stage_priority_order() {
        let stages = MatchStage::all();
        assert!(stages[0] < stages[1] && stages[1] < stages[2]);
        assert_eq!(MatchStage::Normalized.to_string(), "normalized");
    }

    #[test]
    fn test_collision_policy_serde_names() {
        let json = serde_json::to_string(&CollisionPolicy::RejectAmbiguous).unwrap();
        assert_eq!(json, "\"reject_ambiguous\"");
        assert_eq!(CollisionPolicy::default(), CollisionPolicy::LastWriterWins);
    }
}
