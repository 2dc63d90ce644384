// ⚙️ Pipeline Configuration - Settings as Data
// Every knob of a run lives in one struct passed into the pipeline entry point.

use crate::matching::CollisionPolicy;
use crate::normalize::DEFAULT_SUFFIX_TOKENS;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// ============================================================================
// MATCHING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Administrative tokens removed by the normalizer (county, district, city)
    pub suffix_tokens: Vec<String>,

    /// How a normalized key shared by several counties is resolved
    pub collision_policy: CollisionPolicy,

    /// Worker threads for the Normalized and Substring probe loops (1 = inline)
    pub workers: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        MatchingConfig {
            suffix_tokens: strings(&DEFAULT_SUFFIX_TOKENS),
            collision_policy: CollisionPolicy::default(),
            workers: 1,
        }
    }
}

// ============================================================================
// COLUMNS
// ============================================================================

/// Candidate header names per logical field, first present header wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub master_name: Vec<String>,
    pub master_code: Vec<String>,
    pub roster_name: Vec<String>,
    pub roster_status: Vec<String>,

    /// Panel year column used by the statistics
    pub year_column: String,

    /// Panel province column used by the statistics
    pub province_column: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig {
            master_name: strings(&["区县", "县名", "县", "县域名称"]),
            master_code: strings(&["区县代码", "县代码", "代码"]),
            roster_name: strings(&["贫困县", "县名", "区县", "县", "县域名称", "名称"]),
            roster_status: strings(&["摘帽时间"]),
            year_column: "年份".to_string(),
            province_column: "省份".to_string(),
        }
    }
}

// ============================================================================
// ANALYSIS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Indicators compared before and after delisting
    pub key_indicators: Vec<String>,

    /// Header fragments that mark an economic indicator column
    pub economic_keywords: Vec<String>,

    /// Header fragments that mark a population indicator column
    pub population_keywords: Vec<String>,

    /// Years on each side of the delisting year
    pub comparison_window_years: i32,

    /// Counties considered by the before/after comparison
    pub comparison_county_limit: usize,

    /// Indicator columns summarized per keyword group
    pub indicator_column_limit: usize,

    /// Column appended to the designated panel export
    pub delisting_year_column: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            key_indicators: strings(&[
                "地区生产总值_万元",
                "人均地区生产总值_元/人",
                "地方财政一般预算收入_万元",
                "城镇居民人均可支配收入_元",
                "农村居民人均可支配收入_元",
            ]),
            economic_keywords: strings(&["GDP", "gdp", "生产总值", "收入", "财政"]),
            population_keywords: strings(&["人口", "population"]),
            comparison_window_years: 3,
            comparison_county_limit: 100,
            indicator_column_limit: 10,
            delisting_year_column: "摘帽年份".to_string(),
        }
    }
}

// ============================================================================
// PATHS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub master: PathBuf,
    pub roster: PathBuf,
    pub output_dir: PathBuf,
    pub database: Option<PathBuf>,
}

impl Default for PathConfig {
    fn default() -> Self {
        PathConfig {
            master: PathBuf::from("data/county_panel.csv"),
            roster: PathBuf::from("data/poverty_counties.csv"),
            output_dir: PathBuf::from("data/poverty_analysis_output"),
            database: None,
        }
    }
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub matching: MatchingConfig,
    pub columns: ColumnConfig,
    pub analysis: AnalysisConfig,
    pub paths: PathConfig,
}

impl PipelineConfig {
    /// Load configuration from a JSON file; absent keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        PipelineConfig::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse config JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use std::io::Write;

    #[test]
    fn test_defaults_match_source_headers() {
        let config = PipelineConfig::default();

        assert_eq!(config.matching.suffix_tokens, vec!["县", "区", "市"]);
        assert_eq!(config.matching.collision_policy, CollisionPolicy::LastWriterWins);
        assert_eq!(config.columns.master_code[0], "区县代码");
        assert_eq!(config.columns.roster_name[0], "贫困县");
        assert_eq!(config.analysis.comparison_window_years, 3);
    }

    #[test]
    fn test_default_tokens_follow_normalizer() {
        let config = MatchingConfig::default();
        let normalizer = Normalizer::new(config.suffix_tokens.iter().cloned());

        assert_eq!(normalizer.tokens(), Normalizer::default().tokens());
        assert_eq!(config.suffix_tokens.len(), DEFAULT_SUFFIX_TOKENS.len());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json(
            r#"{ "matching": { "workers": 4, "collision_policy": "reject_ambiguous" } }"#,
        )
        .unwrap();

        assert_eq!(config.matching.workers, 4);
        assert_eq!(config.matching.collision_policy, CollisionPolicy::RejectAmbiguous);
        assert_eq!(config.matching.suffix_tokens, vec!["县", "区", "市"]);
        assert_eq!(config.columns, ColumnConfig::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "paths": {{ "output_dir": "out" }} }}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.paths.output_dir, PathBuf::from("out"));
        assert!(config.paths.database.is_none());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(PipelineConfig::from_json("{ not json").is_err());
    }
}
