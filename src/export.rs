// 📤 Export - Result files for manual follow-up
// Designated panel CSV, code list, mapping CSV, text and JSON reports.

use crate::mapping::DelistingInfo;
use crate::panel::DesignatedPanel;
use crate::resolver::ResolutionResult;
use crate::stats::{AnalysisReport, IndicatorSummary};
use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Paths of everything written by one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedFiles {
    pub panel_csv: PathBuf,
    pub codes_txt: PathBuf,
    pub mapping_csv: PathBuf,
    pub report_txt: PathBuf,
    pub report_json: PathBuf,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    resolution: &'a ResolutionResult,
    mapping: &'a BTreeMap<String, DelistingInfo>,
    analysis: &'a AnalysisReport,
}

pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Write every output file into `output_dir`, creating it when missing
pub fn export_all(
    output_dir: &Path,
    stamp: &str,
    panel: &DesignatedPanel,
    delisting_column: &str,
    result: &ResolutionResult,
    mapping: &BTreeMap<String, DelistingInfo>,
    analysis: &AnalysisReport,
) -> Result<ExportedFiles> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    let files = ExportedFiles {
        panel_csv: output_dir.join(format!("poverty_counties_data_{}.csv", stamp)),
        codes_txt: output_dir.join(format!("poverty_county_codes_{}.txt", stamp)),
        mapping_csv: output_dir.join(format!("poverty_county_mapping_{}.csv", stamp)),
        report_txt: output_dir.join(format!("poverty_analysis_report_{}.txt", stamp)),
        report_json: output_dir.join(format!("poverty_analysis_report_{}.json", stamp)),
    };

    write_panel_csv(&files.panel_csv, panel, delisting_column)?;
    write_codes(&files.codes_txt, &result.matched_codes)?;
    write_mapping_csv(&files.mapping_csv, mapping, result)?;
    fs::write(&files.report_txt, render_text_report(result, analysis))
        .with_context(|| format!("Failed to write report: {:?}", files.report_txt))?;
    write_json_report(&files.report_json, result, mapping, analysis)?;

    tracing::info!(dir = ?output_dir, "exported result files");
    Ok(files)
}

/// Master columns in source order plus the delisting year column
pub fn write_panel_csv(path: &Path, panel: &DesignatedPanel, delisting_column: &str) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV: {:?}", path))?;

    let mut header: Vec<&str> = panel.headers.iter().map(|h| h.as_str()).collect();
    header.push(delisting_column);
    wtr.write_record(&header)?;

    for row in &panel.rows {
        let mut record: Vec<String> = panel
            .headers
            .iter()
            .map(|h| row.record.fields.get(h).cloned().unwrap_or_default())
            .collect();
        record.push(row.delisting_year.map(|y| y.to_string()).unwrap_or_default());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// One code per line, sorted
pub fn write_codes(path: &Path, codes: &BTreeSet<String>) -> Result<()> {
    let mut content = String::new();
    for code in codes {
        content.push_str(code);
        content.push('\n');
    }
    fs::write(path, content).with_context(|| format!("Failed to write codes: {:?}", path))
}

pub fn write_mapping_csv(
    path: &Path,
    mapping: &BTreeMap<String, DelistingInfo>,
    result: &ResolutionResult,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV: {:?}", path))?;
    wtr.write_record(["code", "name", "delisting_year", "match_stage"])?;

    for (code, info) in mapping {
        let year = info.year.map(|y| y.to_string()).unwrap_or_default();
        let stage = result.stage_for_code(code).map(|s| s.as_str()).unwrap_or("");
        wtr.write_record([code.as_str(), info.name.as_str(), year.as_str(), stage])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_json_report(
    path: &Path,
    result: &ResolutionResult,
    mapping: &BTreeMap<String, DelistingInfo>,
    analysis: &AnalysisReport,
) -> Result<()> {
    let report = JsonReport {
        generated_at: Local::now().to_rfc3339(),
        resolution: result,
        mapping,
        analysis,
    };
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(path, json).with_context(|| format!("Failed to write JSON report: {:?}", path))
}

fn render_summaries(summaries: &[IndicatorSummary]) -> String {
    let mut out = String::new();
    for s in summaries {
        out.push_str(&format!("\n  {}:\n", s.column));
        out.push_str(&format!("    平均值: {}\n", s.mean));
        out.push_str(&format!("    中位数: {}\n", s.median));
        out.push_str(&format!("    最大值: {}\n", s.max));
        out.push_str(&format!("    最小值: {}\n", s.min));
        if let Some(std_dev) = s.std_dev {
            out.push_str(&format!("    标准差: {}\n", std_dev));
        }
    }
    out
}

/// One titled section; `body` lines are indented by two spaces
fn section<I>(title: &str, body: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut out = format!("【{}】\n", title);
    for line in body {
        out.push_str(&format!("  {}\n", line));
    }
    out.push('\n');
    out
}

fn counts<K: std::fmt::Display>(pairs: impl IntoIterator<Item = (K, usize)>) -> Vec<String> {
    pairs
        .into_iter()
        .map(|(key, count)| format!("{}: {}", key, count))
        .collect()
}

/// Plain-text report, one section per aggregate
pub fn render_text_report(result: &ResolutionResult, analysis: &AnalysisReport) -> String {
    let rule = "=".repeat(60);
    let mut out = format!(
        "{rule}\n贫困县数据分析报告\n{rule}\n生成时间: {}\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let mut resolution = vec![result.summary()];
    if !result.unmatched.is_empty() {
        let names: Vec<&str> = result.unmatched.iter().map(|n| n.as_str()).collect();
        resolution.push(format!("未匹配: {}", names.join(", ")));
    }
    if !result.diagnostics.ambiguous_keys.is_empty() {
        resolution.push(format!("重名键: {}", result.diagnostics.ambiguous_keys.join(", ")));
    }
    out.push_str(&section("匹配结果", resolution));

    out.push_str(&section(
        "基本信息",
        vec![
            format!("贫困县总数: {}", analysis.basic.county_count),
            format!("数据记录总数: {}", analysis.basic.row_count),
            format!("数据年份范围: {}", analysis.basic.year_range),
        ],
    ));

    if let Some(by_year) = &analysis.by_year {
        out.push_str(&section("按年份统计", counts(by_year.iter().map(|(y, c)| (y, *c)))));
    }

    if let Some(by_province) = &analysis.by_province {
        out.push_str(&section("按省份统计", counts(by_province.iter().map(|(p, c)| (p, *c)))));
    }

    if !analysis.by_delisting_year.is_empty() {
        out.push_str(&section(
            "按摘帽年份统计",
            counts(analysis.by_delisting_year.iter().map(|(y, c)| (y, *c))),
        ));
    }

    if let Some(comparison) = &analysis.delisting_comparison {
        out.push_str("【摘帽前后对比分析】\n");
        for s in &comparison.summary {
            out.push_str(&format!("\n  {}:\n", s.indicator));
            out.push_str(&format!("    平均增长率(%): {}\n", s.mean_growth_pct));
            out.push_str(&format!("    中位数增长率(%): {}\n", s.median_growth_pct));
            out.push_str(&format!("    摘帽前平均: {}\n", s.before_mean));
            out.push_str(&format!("    摘帽后平均: {}\n", s.after_mean));
        }
        out.push('\n');
    }

    if !analysis.economic.is_empty() {
        out.push_str("【经济指标分析】\n");
        out.push_str(&render_summaries(&analysis.economic));
        out.push('\n');
    }

    if !analysis.population.is_empty() {
        out.push_str("【人口指标分析】\n");
        out.push_str(&render_summaries(&analysis.population));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, ColumnConfig};
    use crate::mapping::MappingBuilder;
    use crate::panel::filter_designated;
    use crate::resolver::Resolver;
    use crate::stats::analyze;
    use crate::table::{MasterRecord, MasterTable, RosterEntry};

    struct Fixture {
        panel: DesignatedPanel,
        result: ResolutionResult,
        mapping: BTreeMap<String, DelistingInfo>,
        analysis: AnalysisReport,
    }

    fn create_test_fixture() -> Fixture {
        let master = MasterTable::from_records(vec![
            MasterRecord::new("001010", "略阳县"),
            MasterRecord::new("001020", "宁强县"),
        ]);
        let roster = vec![
            RosterEntry::new("略阳县", Some("2018年")),
            RosterEntry::new("宁强", None),
            RosterEntry::new("未知县", None),
        ];
        let names = roster.iter().map(|e| e.name.clone()).collect();
        let result = Resolver::new().resolve(&names, &master.records);
        let mapping = MappingBuilder::default().build(&master.records, &roster);
        let panel = filter_designated(&master, &result.matched_codes, &mapping);
        let analysis = analyze(&panel, &ColumnConfig::default(), &AnalysisConfig::default());

        Fixture { panel, result, mapping, analysis }
    }

    #[test]
    fn test_export_all_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let fx = create_test_fixture();

        let files = export_all(
            &dir.path().join("out"),
            "20240101_000000",
            &fx.panel,
            "摘帽年份",
            &fx.result,
            &fx.mapping,
            &fx.analysis,
        )
        .unwrap();

        let codes = fs::read_to_string(&files.codes_txt).unwrap();
        assert_eq!(codes, "001010\n001020\n");

        let panel_csv = fs::read_to_string(&files.panel_csv).unwrap();
        let mut lines = panel_csv.lines();
        assert_eq!(lines.next(), Some("name,code,摘帽年份"));
        assert_eq!(lines.next(), Some("略阳县,001010,2018"));
        assert_eq!(lines.next(), Some("宁强县,001020,"));

        let mapping_csv = fs::read_to_string(&files.mapping_csv).unwrap();
        assert!(mapping_csv.contains("001010,略阳县,2018,exact"));
        assert!(mapping_csv.contains("001020,宁强县,,normalized"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files.report_json).unwrap()).unwrap();
        assert_eq!(json["resolution"]["unmatched"][0], "未知县");
        assert_eq!(json["analysis"]["basic"]["county_count"], 2);
    }

    #[test]
    fn test_mapping_csv_stage_for_homonym_codes() {
        let dir = tempfile::tempdir().unwrap();
        let master = vec![
            MasterRecord::new("130000", "和平县"),
            MasterRecord::new("440000", "和平县"),
        ];
        let names = ["和平县".to_string()].into_iter().collect();
        let result = Resolver::new().resolve(&names, &master);

        let mut mapping = BTreeMap::new();
        for code in ["130000", "440000"] {
            mapping.insert(
                code.to_string(),
                DelistingInfo { name: "和平县".to_string(), year: Some(2019) },
            );
        }

        let path = dir.path().join("mapping.csv");
        write_mapping_csv(&path, &mapping, &result).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert!(content.contains("130000,和平县,2019,exact"));
        assert!(content.contains("440000,和平县,2019,exact"));
    }

    #[test]
    fn test_text_report_sections() {
        let fx = create_test_fixture();
        let text = render_text_report(&fx.result, &fx.analysis);

        assert!(text.contains("【匹配结果】"));
        assert!(text.contains("未匹配: 未知县"));
        assert!(text.contains("贫困县总数: 2"));
        assert!(text.contains("【按摘帽年份统计】"));
        assert!(!text.contains("【按年份统计】"));
        assert!(text.contains("  数据年份范围: 未知\n"));
        assert!(text.starts_with(&"=".repeat(60)));
    }

    #[test]
    fn test_timestamp_format() {
        let stamp = timestamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "_");
    }
}
