// 📊 Designated Panel - Master rows of the matched counties
// Each row carries the delisting year looked up from the mapping.

use crate::mapping::DelistingInfo;
use crate::table::{MasterRecord, MasterTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignatedRow {
    pub record: MasterRecord,
    pub delisting_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignatedPanel {
    /// Header row of the master table
    pub headers: Vec<String>,

    /// Header holding the county code
    pub code_column: String,

    /// Rows in master order
    pub rows: Vec<DesignatedRow>,
}

impl DesignatedPanel {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct county codes in first-appearance order
    pub fn codes(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.rows
            .iter()
            .map(|r| r.record.code.as_str())
            .filter(|code| seen.insert(*code))
            .collect()
    }

    pub fn rows_for<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a DesignatedRow> + 'a {
        self.rows.iter().filter(move |r| r.record.code == code)
    }
}

/// Keep the master rows whose code was matched, attaching the delisting year
pub fn filter_designated(
    master: &MasterTable,
    matched_codes: &BTreeSet<String>,
    mapping: &BTreeMap<String, DelistingInfo>,
) -> DesignatedPanel {
    let rows: Vec<DesignatedRow> = master
        .records
        .iter()
        .filter(|record| matched_codes.contains(&record.code))
        .map(|record| DesignatedRow {
            record: record.clone(),
            delisting_year: mapping.get(&record.code).and_then(|info| info.year),
        })
        .collect();

    tracing::info!(rows = rows.len(), counties = matched_codes.len(), "filtered designated panel");

    DesignatedPanel {
        headers: master.headers.clone(),
        code_column: master.code_column.clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_attaches_year() {
        let master = MasterTable::from_records(vec![
            MasterRecord::new("001010", "略阳县").with_field("年份", "2015"),
            MasterRecord::new("001020", "宁强县").with_field("年份", "2015"),
            MasterRecord::new("001010", "略阳县").with_field("年份", "2016"),
            MasterRecord::new("009999", "汉台区").with_field("年份", "2015"),
        ]);
        let codes: BTreeSet<String> = ["001010", "001020"].iter().map(|c| c.to_string()).collect();
        let mut mapping = BTreeMap::new();
        mapping.insert(
            "001010".to_string(),
            DelistingInfo { name: "略阳县".to_string(), year: Some(2018) },
        );

        let panel = filter_designated(&master, &codes, &mapping);

        assert_eq!(panel.len(), 3);
        assert_eq!(panel.codes(), vec!["001010", "001020"]);
        assert_eq!(panel.rows[0].delisting_year, Some(2018));
        assert_eq!(panel.rows[1].delisting_year, None);
        assert_eq!(panel.rows_for("001010").count(), 2);
    }

    #[test]
    fn test_no_codes_no_rows() {
        let master = MasterTable::from_records(vec![MasterRecord::new("1", "甲县")]);
        let panel = filter_designated(&master, &BTreeSet::new(), &BTreeMap::new());
        assert!(panel.is_empty());
    }
}
