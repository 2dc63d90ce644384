// Poverty County Resolver - Core Library
// Resolves designated-county roster names to panel county codes and builds the
// delisting panel, statistics and exports on top of the resolution.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod mapping;
pub mod matching;
pub mod normalize;
pub mod panel;
pub mod pipeline;
pub mod resolver;
pub mod stats;
pub mod table;

// Re-export commonly used types
pub use config::{AnalysisConfig, ColumnConfig, MatchingConfig, PathConfig, PipelineConfig};
pub use db::{
    RunRecord, StoredCounty,
    setup_database, insert_run, save_mapping,
    get_designated_counties, get_mapping, get_runs, count_designated,
};
pub use error::{MissingColumn, SchemaError, TableKind};
pub use export::{export_all, timestamp, ExportedFiles};
pub use mapping::{extract_year, DelistingInfo, MappingBuilder};
pub use matching::{
    CollisionPolicy, MatchRecord, MatchStage,
    ExactMatcher, NormalizedIndex, NormalizedMatcher, SubstringMatcher,
};
pub use normalize::{normalize_county_name, Normalizer};
pub use panel::{filter_designated, DesignatedPanel, DesignatedRow};
pub use pipeline::{load_inputs, run, run_tables, PipelineOutput};
pub use resolver::{ResolutionDiagnostics, ResolutionResult, Resolver};
pub use stats::{analyze, AnalysisReport};
pub use table::{MasterRecord, MasterTable, RosterEntry, RosterTable};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
