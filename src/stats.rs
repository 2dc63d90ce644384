// 📈 Statistics - Aggregates over the designated panel
//
// Counts per year / province / delisting year, indicator summaries, and the
// before/after delisting comparison of key indicators.

use crate::config::{AnalysisConfig, ColumnConfig};
use crate::panel::{DesignatedPanel, DesignatedRow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// REPORT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub county_count: usize,
    pub row_count: usize,

    /// "min-max" of the panel year column, "未知" when unavailable
    pub year_range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSummary {
    pub column: String,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,

    /// Sample standard deviation; only reported for economic indicators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorChange {
    pub before_mean: f64,
    pub after_mean: f64,
    pub growth_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyComparison {
    pub code: String,
    pub delisting_year: i32,
    pub changes: BTreeMap<String, IndicatorChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub indicator: String,
    pub mean_growth_pct: f64,
    pub median_growth_pct: f64,
    pub before_mean: f64,
    pub after_mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelistingComparison {
    pub summary: Vec<ComparisonSummary>,
    pub details: Vec<CountyComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub basic: BasicInfo,

    /// Distinct counties per panel year (None without a year column)
    pub by_year: Option<BTreeMap<i32, usize>>,

    /// Distinct counties per province, largest first (None without a province column)
    pub by_province: Option<Vec<(String, usize)>>,

    /// Distinct counties per delisting year
    pub by_delisting_year: BTreeMap<i32, usize>,

    pub delisting_comparison: Option<DelistingComparison>,
    pub economic: Vec<IndicatorSummary>,
    pub population: Vec<IndicatorSummary>,
}

// ============================================================================
// ANALYSIS
// ============================================================================

pub fn analyze(
    panel: &DesignatedPanel,
    columns: &ColumnConfig,
    config: &AnalysisConfig,
) -> AnalysisReport {
    let has_year = panel.headers.contains(&columns.year_column);
    let has_province = panel.headers.contains(&columns.province_column);

    let basic = BasicInfo {
        county_count: panel.codes().len(),
        row_count: panel.len(),
        year_range: year_range(panel, &columns.year_column, has_year),
    };

    let by_year = has_year.then(|| {
        distinct_by(panel, |row| row.record.year(&columns.year_column))
    });

    let by_province = has_province.then(|| {
        let counts = distinct_by(panel, |row| {
            row.record.field(&columns.province_column).map(|p| p.to_string())
        });
        let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted
    });

    let by_delisting_year = distinct_by(panel, |row| row.delisting_year);

    let delisting_comparison = if has_year {
        compare_delisting(panel, &columns.year_column, config)
    } else {
        None
    };

    let economic = summarize_columns(panel, &config.economic_keywords, config.indicator_column_limit, true);
    let population = summarize_columns(panel, &config.population_keywords, config.indicator_column_limit, false);

    tracing::info!(
        counties = basic.county_count,
        rows = basic.row_count,
        economic = economic.len(),
        population = population.len(),
        comparison = delisting_comparison.is_some(),
        "analysis complete"
    );

    AnalysisReport {
        basic,
        by_year,
        by_province,
        by_delisting_year,
        delisting_comparison,
        economic,
        population,
    }
}

/// Count distinct county codes per group key; rows without a key are dropped
fn distinct_by<K, F>(panel: &DesignatedPanel, key: F) -> BTreeMap<K, usize>
where
    K: Ord,
    F: Fn(&DesignatedRow) -> Option<K>,
{
    let mut groups: BTreeMap<K, BTreeSet<&str>> = BTreeMap::new();
    for row in &panel.rows {
        if let Some(k) = key(row) {
            groups.entry(k).or_default().insert(row.record.code.as_str());
        }
    }
    groups.into_iter().map(|(k, codes)| (k, codes.len())).collect()
}

fn year_range(panel: &DesignatedPanel, year_column: &str, has_year: bool) -> String {
    let years: Vec<i32> = if has_year {
        panel.rows.iter().filter_map(|r| r.record.year(year_column)).collect()
    } else {
        Vec::new()
    };

    match (years.iter().min(), years.iter().max()) {
        (Some(min), Some(max)) => format!("{}-{}", min, max),
        _ => "未知".to_string(),
    }
}

// ============================================================================
// INDICATOR SUMMARIES
// ============================================================================

/// Values of a column, or None when some non-blank value is not a number
fn numeric_column(panel: &DesignatedPanel, column: &str) -> Option<Vec<f64>> {
    let mut values = Vec::new();
    for row in &panel.rows {
        if let Some(raw) = row.record.field(column) {
            values.push(raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())?);
        }
    }
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn summarize_columns(
    panel: &DesignatedPanel,
    keywords: &[String],
    limit: usize,
    with_std_dev: bool,
) -> Vec<IndicatorSummary> {
    panel
        .headers
        .iter()
        .filter(|h| keywords.iter().any(|k| h.contains(k.as_str())))
        .take(limit)
        .filter_map(|column| {
            let values = numeric_column(panel, column)?;
            Some(IndicatorSummary {
                column: column.clone(),
                mean: mean(&values)?,
                median: median(&values)?,
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                std_dev: if with_std_dev { sample_std_dev(&values) } else { None },
            })
        })
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample (n - 1) standard deviation; None below two values
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

// ============================================================================
// BEFORE / AFTER DELISTING
// ============================================================================

fn compare_delisting(
    panel: &DesignatedPanel,
    year_column: &str,
    config: &AnalysisConfig,
) -> Option<DelistingComparison> {
    let indicators: Vec<&String> = config
        .key_indicators
        .iter()
        .filter(|i| panel.headers.contains(i))
        .collect();
    if indicators.is_empty() {
        return None;
    }

    let window = config.comparison_window_years;
    let mut details = Vec::new();

    let delisted: Vec<(&str, i32)> = panel
        .codes()
        .into_iter()
        .filter_map(|code| {
            panel
                .rows_for(code)
                .next()
                .and_then(|row| row.delisting_year)
                .map(|year| (code, year))
        })
        .take(config.comparison_county_limit)
        .collect();

    for (code, year) in delisted {
        let rows: Vec<(i32, &DesignatedRow)> = panel
            .rows_for(code)
            .filter_map(|row| row.record.year(year_column).map(|y| (y, row)))
            .collect();

        let before: Vec<&DesignatedRow> = rows
            .iter()
            .filter(|(y, _)| *y >= year - window && *y < year)
            .map(|(_, row)| *row)
            .collect();
        let after: Vec<&DesignatedRow> = rows
            .iter()
            .filter(|(y, _)| *y > year && *y <= year + window)
            .map(|(_, row)| *row)
            .collect();

        if before.is_empty() || after.is_empty() {
            continue;
        }

        let mut changes = BTreeMap::new();
        for indicator in &indicators {
            let before_mean = window_mean(&before, indicator);
            let after_mean = window_mean(&after, indicator);

            if let (Some(before_mean), Some(after_mean)) = (before_mean, after_mean) {
                if before_mean > 0.0 {
                    changes.insert(
                        indicator.to_string(),
                        IndicatorChange {
                            before_mean,
                            after_mean,
                            growth_pct: (after_mean - before_mean) / before_mean * 100.0,
                        },
                    );
                }
            }
        }

        details.push(CountyComparison {
            code: code.to_string(),
            delisting_year: year,
            changes,
        });
    }

    if details.is_empty() {
        return None;
    }

    let summary = indicators
        .iter()
        .filter_map(|indicator| {
            let changes: Vec<&IndicatorChange> = details
                .iter()
                .filter_map(|d| d.changes.get(indicator.as_str()))
                .collect();
            let growth: Vec<f64> = changes.iter().map(|c| c.growth_pct).collect();
            let befores: Vec<f64> = changes.iter().map(|c| c.before_mean).collect();
            let afters: Vec<f64> = changes.iter().map(|c| c.after_mean).collect();

            Some(ComparisonSummary {
                indicator: indicator.to_string(),
                mean_growth_pct: mean(&growth)?,
                median_growth_pct: median(&growth)?,
                before_mean: mean(&befores)?,
                after_mean: mean(&afters)?,
            })
        })
        .collect();

    Some(DelistingComparison { summary, details })
}

fn window_mean(rows: &[&DesignatedRow], indicator: &str) -> Option<f64> {
    let values: Vec<f64> = rows.iter().filter_map(|r| r.record.numeric(indicator)).collect();
    mean(&values)
}
