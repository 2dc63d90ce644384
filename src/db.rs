use crate::mapping::DelistingInfo;
use crate::matching::MatchStage;
use crate::resolver::ResolutionResult;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audit record of one resolution run (every run is an event)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub master_fingerprint: String,
    pub roster_fingerprint: String,
    pub matched_codes: i64,
    pub unmatched_names: Vec<String>,
}

impl RunRecord {
    pub fn new(
        master_fingerprint: &str,
        roster_fingerprint: &str,
        result: &ResolutionResult,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            master_fingerprint: master_fingerprint.to_string(),
            roster_fingerprint: roster_fingerprint.to_string(),
            matched_codes: result.matched_count() as i64,
            unmatched_names: result.unmatched.iter().cloned().collect(),
        }
    }
}

/// One stored row of the designated county table
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoredCounty {
    pub code: String,
    pub info: DelistingInfo,
    pub match_stage: Option<MatchStage>,
    pub run_id: String,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS designated_counties (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            delisting_year INTEGER,
            match_stage TEXT,
            run_id TEXT NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS resolution_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            started_at TEXT NOT NULL,
            master_fingerprint TEXT NOT NULL,
            roster_fingerprint TEXT NOT NULL,
            matched_codes INTEGER NOT NULL,
            unmatched_count INTEGER NOT NULL,
            unmatched_names TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_designated_year ON designated_counties(delisting_year)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_runs_started ON resolution_runs(started_at)",
        [],
    )?;

    Ok(())
}

pub fn insert_run(conn: &Connection, run: &RunRecord) -> Result<()> {
    let unmatched_json = serde_json::to_string(&run.unmatched_names)?;

    conn.execute(
        "INSERT INTO resolution_runs (
            run_id, started_at, master_fingerprint, roster_fingerprint,
            matched_codes, unmatched_count, unmatched_names
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            run.run_id,
            run.started_at.to_rfc3339(),
            run.master_fingerprint,
            run.roster_fingerprint,
            run.matched_codes,
            run.unmatched_names.len() as i64,
            unmatched_json,
        ],
    )
    .context("Failed to insert resolution run")?;

    Ok(())
}

/// Upsert the mapping; the stage comes from the resolver record for the code
pub fn save_mapping(
    conn: &mut Connection,
    run_id: &str,
    mapping: &BTreeMap<String, DelistingInfo>,
    result: &ResolutionResult,
) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut written = 0;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO designated_counties (code, name, delisting_year, match_stage, run_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP)
             ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                delisting_year = excluded.delisting_year,
                match_stage = excluded.match_stage,
                run_id = excluded.run_id,
                updated_at = CURRENT_TIMESTAMP",
        )?;

        for (code, info) in mapping {
            stmt.execute(params![
                code,
                info.name,
                info.year,
                result.stage_for_code(code).map(|s| s.as_str()),
                run_id,
            ])?;
            written += 1;
        }
    }

    tx.commit()?;
    tracing::info!(written, run_id, "saved designated counties");

    Ok(written)
}

fn parse_stage(value: Option<String>) -> Option<MatchStage> {
    match value.as_deref() {
        Some("exact") => Some(MatchStage::Exact),
        Some("normalized") => Some(MatchStage::Normalized),
        Some("substring") => Some(MatchStage::Substring),
        _ => None,
    }
}

pub fn get_designated_counties(conn: &Connection) -> Result<Vec<StoredCounty>> {
    let mut stmt = conn.prepare(
        "SELECT code, name, delisting_year, match_stage, run_id
         FROM designated_counties
         ORDER BY code",
    )?;

    let counties = stmt
        .query_map([], |row| {
            Ok(StoredCounty {
                code: row.get(0)?,
                info: DelistingInfo {
                    name: row.get(1)?,
                    year: row.get(2)?,
                },
                match_stage: parse_stage(row.get(3)?),
                run_id: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(counties)
}

/// Mapping as stored, keyed by code
pub fn get_mapping(conn: &Connection) -> Result<BTreeMap<String, DelistingInfo>> {
    Ok(get_designated_counties(conn)?
        .into_iter()
        .map(|c| (c.code, c.info))
        .collect())
}

pub fn get_runs(conn: &Connection) -> Result<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, started_at, master_fingerprint, roster_fingerprint,
                matched_codes, unmatched_names
         FROM resolution_runs
         ORDER BY id DESC",
    )?;

    let runs = stmt
        .query_map([], |row| {
            let started_str: String = row.get(1)?;
            let unmatched_json: String = row.get(5)?;

            Ok(RunRecord {
                run_id: row.get(0)?,
                started_at: DateTime::parse_from_rfc3339(&started_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                master_fingerprint: row.get(2)?,
                roster_fingerprint: row.get(3)?,
                matched_codes: row.get(4)?,
                unmatched_names: serde_json::from_str(&unmatched_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(runs)
}

pub fn count_designated(conn: &Connection) -> Result<i64> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM designated_counties", [], |row| row.get(0))?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use crate::table::MasterRecord;
    use std::collections::BTreeSet;

    fn create_test_result() -> ResolutionResult {
        let master = vec![
            MasterRecord::new("001010", "略阳县"),
            MasterRecord::new("001020", "宁强县"),
        ];
        let names: BTreeSet<String> = ["略阳县", "宁强", "未知县"].iter().map(|n| n.to_string()).collect();
        Resolver::new().resolve(&names, &master)
    }

    fn create_test_mapping() -> BTreeMap<String, DelistingInfo> {
        let mut mapping = BTreeMap::new();
        mapping.insert(
            "001010".to_string(),
            DelistingInfo { name: "略阳县".to_string(), year: Some(2018) },
        );
        mapping.insert(
            "001020".to_string(),
            DelistingInfo { name: "宁强县".to_string(), year: None },
        );
        mapping
    }

    #[test]
    fn test_save_and_read_mapping() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let result = create_test_result();
        let written = save_mapping(&mut conn, "run-1", &create_test_mapping(), &result).unwrap();
        assert_eq!(written, 2);
        assert_eq!(count_designated(&conn).unwrap(), 2);

        let stored = get_designated_counties(&conn).unwrap();
        assert_eq!(stored[0].code, "001010");
        assert_eq!(stored[0].match_stage, Some(MatchStage::Exact));
        assert_eq!(stored[1].match_stage, Some(MatchStage::Normalized));
        assert_eq!(stored[1].info.year, None);

        assert_eq!(get_mapping(&conn).unwrap(), create_test_mapping());
    }

    #[test]
    fn test_save_is_an_upsert() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let result = create_test_result();

        save_mapping(&mut conn, "run-1", &create_test_mapping(), &result).unwrap();

        let mut updated = create_test_mapping();
        updated.get_mut("001020").unwrap().year = Some(2019);
        save_mapping(&mut conn, "run-2", &updated, &result).unwrap();

        assert_eq!(count_designated(&conn).unwrap(), 2);
        let stored = get_designated_counties(&conn).unwrap();
        assert_eq!(stored[1].info.year, Some(2019));
        assert_eq!(stored[1].run_id, "run-2");
    }

    #[test]
    fn test_homonym_codes_are_stored_with_stage() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let master = vec![
            MasterRecord::new("130000", "和平县"),
            MasterRecord::new("440000", "和平县"),
        ];
        let names: BTreeSet<String> = ["和平县".to_string()].into_iter().collect();
        let result = Resolver::new().resolve(&names, &master);

        let mut mapping = BTreeMap::new();
        for code in ["130000", "440000"] {
            mapping.insert(code.to_string(), DelistingInfo { name: "和平县".to_string(), year: None });
        }
        save_mapping(&mut conn, "run-1", &mapping, &result).unwrap();

        let stored = get_designated_counties(&conn).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|c| c.match_stage == Some(MatchStage::Exact)));
    }

    #[test]
    fn test_run_history() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let result = create_test_result();
        let first = RunRecord::new("aaa", "bbb", &result);
        let second = RunRecord::new("aaa", "ccc", &result);
        insert_run(&conn, &first).unwrap();
        insert_run(&conn, &second).unwrap();

        let runs = get_runs(&conn).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, second.run_id);
        assert_eq!(runs[1].unmatched_names, vec!["未知县".to_string()]);
        assert_eq!(runs[1].matched_codes, 2);

        // run_id is unique
        assert!(insert_run(&conn, &first).is_err());
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();
        assert_eq!(count_designated(&conn).unwrap(), 0);
    }
}
