// 🚫 Schema Errors - Required columns that could not be located
// Raised by the table loaders before any matching begins.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// TABLE KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// County panel keyed by official code
    Master,

    /// Roster of poverty-designated counties keyed by name
    Roster,
}

impl TableKind {
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Master => "master",
            TableKind::Roster => "roster",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// MISSING COLUMN
// ============================================================================

/// One logical field whose candidate headers were all absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingColumn {
    /// Logical field ("name", "code", ...)
    pub field: String,

    /// Header strings that were tried, in priority order
    pub candidates: Vec<String>,
}

impl fmt::Display for MissingColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` (tried: {})", self.field, self.candidates.join(", "))
    }
}

// ============================================================================
// SCHEMA ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{table} table is missing required column(s): {}", format_missing(.missing))]
    MissingColumns {
        table: TableKind,
        missing: Vec<MissingColumn>,
    },

    #[error("{table} table has no header row")]
    NoHeader { table: TableKind },
}

impl SchemaError {
    pub fn table(&self) -> TableKind {
        match self {
            SchemaError::MissingColumns { table, .. } => *table,
            SchemaError::NoHeader { table } => *table,
        }
    }

    /// Logical fields that could not be resolved
    pub fn missing_fields(&self) -> Vec<&str> {
        match self {
            SchemaError::MissingColumns { missing, .. } => {
                missing.iter().map(|m| m.field.as_str()).collect()
            }
            SchemaError::NoHeader { .. } => Vec::new(),
        }
    }
}

fn format_missing(missing: &[MissingColumn]) -> String {
    missing
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_every_missing_field() {
        let err = SchemaError::MissingColumns {
            table: TableKind::Master,
            missing: vec![
                MissingColumn {
                    field: "name".to_string(),
                    candidates: vec!["区县".to_string(), "县名".to_string()],
                },
                MissingColumn {
                    field: "code".to_string(),
                    candidates: vec!["区县代码".to_string()],
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("master table"));
        assert!(message.contains("`name` (tried: 区县, 县名)"));
        assert!(message.contains("`code` (tried: 区县代码)"));
        assert_eq!(err.missing_fields(), vec!["name", "code"]);
        assert_eq!(err.table(), TableKind::Master);
    }
}
