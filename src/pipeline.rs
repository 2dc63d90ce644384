// 🔗 Pipeline - Load → Resolve → Map → Filter → Analyze
//
// One explicit configuration in, one output struct back. Loading fails fast on
// schema errors; everything after loading is total.

use crate::config::PipelineConfig;
use crate::mapping::{DelistingInfo, MappingBuilder};
use crate::normalize::Normalizer;
use crate::panel::{filter_designated, DesignatedPanel};
use crate::resolver::{ResolutionResult, Resolver};
use crate::stats::{analyze, AnalysisReport};
use crate::table::{MasterTable, RosterTable};
use anyhow::Result;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub result: ResolutionResult,
    pub mapping: BTreeMap<String, DelistingInfo>,
    pub panel: DesignatedPanel,
    pub analysis: AnalysisReport,
    pub master_fingerprint: String,
    pub roster_fingerprint: String,
}

impl PipelineOutput {
    pub fn has_matches(&self) -> bool {
        !self.result.is_empty()
    }
}

/// Load both tables named in the configuration
pub fn load_inputs(config: &PipelineConfig) -> Result<(MasterTable, RosterTable)> {
    let master = MasterTable::from_path(&config.paths.master, &config.columns)?;
    let roster = RosterTable::from_path(&config.paths.roster, &config.columns)?;
    Ok((master, roster))
}

/// Run resolution and everything downstream over tables already in memory
pub fn run_tables(
    master: &MasterTable,
    roster: &RosterTable,
    config: &PipelineConfig,
) -> PipelineOutput {
    let resolver = Resolver::from_config(&config.matching);
    let result = resolver.resolve(&roster.names(), &master.records);
    tracing::info!("{}", result.summary());

    let builder = MappingBuilder::new(Normalizer::new(config.matching.suffix_tokens.iter().cloned()));
    let mapping = builder.build(&master.records, &roster.entries);

    let panel = filter_designated(master, &result.matched_codes, &mapping);
    let analysis = analyze(&panel, &config.columns, &config.analysis);

    PipelineOutput {
        result,
        mapping,
        panel,
        analysis,
        master_fingerprint: master.fingerprint(),
        roster_fingerprint: roster.fingerprint(),
    }
}

pub fn run(config: &PipelineConfig) -> Result<PipelineOutput> {
    let (master, roster) = load_inputs(config)?;
    Ok(run_tables(&master, &roster, config))
}
