// 📥 Table Loading - Master panel + poverty roster from CSV
//
// Header resolution: each logical field has an ordered list of candidate
// header strings; the first one present wins. A missing required field is a
// SchemaError raised before any matching happens.

use crate::config::ColumnConfig;
use crate::error::{MissingColumn, SchemaError, TableKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

// ============================================================================
// RECORDS
// ============================================================================

/// One row of the county panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRecord {
    /// Official county code (empty when the cell was blank)
    pub code: String,

    /// Administrative name (empty when the cell was blank)
    pub name: String,

    /// Every column of the row, keyed by header; not interpreted by matching
    #[serde(default)]
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,
}

impl MasterRecord {
    pub fn new(code: &str, name: &str) -> Self {
        MasterRecord {
            code: code.to_string(),
            name: name.to_string(),
            fields: HashMap::new(),
        }
    }

    /// Builder pattern: add a panel column
    pub fn with_field(mut self, column: &str, value: &str) -> Self {
        self.fields.insert(column.to_string(), value.to_string());
        self
    }

    /// Raw value of a panel column, None when absent or blank
    pub fn field(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// Numeric value of a panel column
    pub fn numeric(&self, column: &str) -> Option<f64> {
        self.field(column)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Panel year ("2015" and "2015.0" both read as 2015)
    pub fn year(&self, column: &str) -> Option<i32> {
        self.numeric(column)
            .filter(|v| *v >= i32::MIN as f64 && *v <= i32::MAX as f64)
            .map(|v| v.trunc() as i32)
    }
}

/// One row of the poverty roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,

    /// Free-text delisting date, e.g. "2018年摘帽"
    pub status_date: Option<String>,
}

impl RosterEntry {
    pub fn new(name: &str, status_date: Option<&str>) -> Self {
        RosterEntry {
            name: name.to_string(),
            status_date: status_date.map(|s| s.to_string()),
        }
    }
}

// ============================================================================
// HEADER RESOLUTION
// ============================================================================

/// First candidate present in the header row
pub fn find_column(headers: &[String], candidates: &[String]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|candidate| headers.iter().position(|h| h == candidate))
}

/// Resolve required fields, collecting every missing one into a single error
fn resolve_required(
    table: TableKind,
    headers: &[String],
    fields: &[(&str, &[String])],
) -> Result<Vec<usize>, SchemaError> {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for (field, candidates) in fields {
        match find_column(headers, candidates) {
            Some(index) => found.push(index),
            None => missing.push(MissingColumn {
                field: field.to_string(),
                candidates: candidates.to_vec(),
            }),
        }
    }

    if missing.is_empty() {
        Ok(found)
    } else {
        Err(SchemaError::MissingColumns { table, missing })
    }
}

fn read_headers<R: Read>(rdr: &mut csv::Reader<R>, table: TableKind) -> Result<Vec<String>> {
    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("Failed to read {} header row", table))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(SchemaError::NoHeader { table }.into());
    }

    Ok(headers)
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().flexible(true).from_reader(source)
}

fn cell(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or("").to_string()
}

// ============================================================================
// MASTER TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterTable {
    /// Header row in source order
    pub headers: Vec<String>,

    /// Header resolved for the name field
    pub name_column: String,

    /// Header resolved for the code field
    pub code_column: String,

    /// Rows in source order (the Substring stage depends on this order)
    pub records: Vec<MasterRecord>,
}

impl MasterTable {
    pub fn from_path(path: &Path, columns: &ColumnConfig) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open master CSV: {:?}", path))?;
        MasterTable::from_reader(file, columns)
            .with_context(|| format!("Failed to load master table: {:?}", path))
    }

    pub fn from_reader<R: Read>(source: R, columns: &ColumnConfig) -> Result<Self> {
        let mut rdr = reader(source);
        let headers = read_headers(&mut rdr, TableKind::Master)?;

        let resolved = resolve_required(
            TableKind::Master,
            &headers,
            &[
                ("name", columns.master_name.as_slice()),
                ("code", columns.master_code.as_slice()),
            ],
        )?;
        let (name_index, code_index) = (resolved[0], resolved[1]);

        let mut records = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let row = result.with_context(|| format!("Failed to read master row {}", line + 2))?;

            let fields = headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), cell(&row, i)))
                .collect();

            records.push(MasterRecord {
                code: cell(&row, code_index),
                name: cell(&row, name_index),
                fields,
            });
        }

        tracing::info!(
            rows = records.len(),
            name_column = %headers[name_index],
            code_column = %headers[code_index],
            "loaded master table"
        );

        Ok(MasterTable {
            name_column: headers[name_index].clone(),
            code_column: headers[code_index].clone(),
            headers,
            records,
        })
    }

    /// Build a table from records already in memory (tests, other loaders).
    /// Headers are "name", "code", then every other field name sorted.
    pub fn from_records(mut records: Vec<MasterRecord>) -> Self {
        let mut extra = BTreeSet::new();
        for record in &mut records {
            record.fields.entry("name".to_string()).or_insert_with(|| record.name.clone());
            record.fields.entry("code".to_string()).or_insert_with(|| record.code.clone());
            extra.extend(record.fields.keys().cloned());
        }
        extra.remove("name");
        extra.remove("code");

        let mut headers = vec!["name".to_string(), "code".to_string()];
        headers.extend(extra);

        MasterTable {
            headers,
            name_column: "name".to_string(),
            code_column: "code".to_string(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// SHA-256 over (code, name) in row order, identifies the input of a run
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            hasher.update(record.code.as_bytes());
            hasher.update([0x1f]);
            hasher.update(record.name.as_bytes());
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// ROSTER TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterTable {
    pub name_column: String,

    /// None when the roster carries no delisting date column
    pub status_column: Option<String>,

    pub entries: Vec<RosterEntry>,
}

impl RosterTable {
    pub fn from_path(path: &Path, columns: &ColumnConfig) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open roster CSV: {:?}", path))?;
        RosterTable::from_reader(file, columns)
            .with_context(|| format!("Failed to load roster table: {:?}", path))
    }

    pub fn from_reader<R: Read>(source: R, columns: &ColumnConfig) -> Result<Self> {
        let mut rdr = reader(source);
        let headers = read_headers(&mut rdr, TableKind::Roster)?;

        let resolved = resolve_required(
            TableKind::Roster,
            &headers,
            &[("name", columns.roster_name.as_slice())],
        )?;
        let name_index = resolved[0];
        let status_index = find_column(&headers, &columns.roster_status);

        let mut entries = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let row = result.with_context(|| format!("Failed to read roster row {}", line + 2))?;

            let status_date = status_index
                .map(|i| cell(&row, i))
                .filter(|s| !s.trim().is_empty());

            entries.push(RosterEntry {
                name: cell(&row, name_index),
                status_date,
            });
        }

        if status_index.is_none() {
            tracing::warn!("roster has no delisting date column, years will be empty");
        }
        tracing::info!(
            rows = entries.len(),
            name_column = %headers[name_index],
            "loaded roster table"
        );

        Ok(RosterTable {
            name_column: headers[name_index].clone(),
            status_column: status_index.map(|i| headers[i].clone()),
            entries,
        })
    }

    pub fn from_entries(entries: Vec<RosterEntry>) -> Self {
        RosterTable {
            name_column: "name".to_string(),
            status_column: Some("status_date".to_string()),
            entries,
        }
    }

    /// Distinct non-blank names, the input of the resolver
    pub fn names(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|e| !e.name.trim().is_empty())
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.name.as_bytes());
            hasher.update([0x1f]);
            hasher.update(entry.status_date.as_deref().unwrap_or("").as_bytes());
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }
}
