//! Removes orphaned technologies from the network until none remain.
use super::commodity_network::CommodityNetwork;
use super::{NetworkModelData, Tech};
use crate::commodity::CommodityID;
use crate::region::RegionID;
use crate::technology::TechID;
use anyhow::{Result, bail};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use log::{debug, error, info, warn};
use std::collections::HashSet;

/// How the manager reacts to problems in the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkOptions {
    /// Treat any orphan as a fatal error
    pub strict: bool,
    /// Treat a demand which no viable technology can produce as a fatal error
    pub fail_on_unsupported_demand: bool,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            strict: false,
            fail_on_unsupported_demand: true,
        }
    }
}

/// The index tuples which survived the network analysis.
///
/// Used by the data loader to drop rows for technologies which can never be used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViableSets {
    /// `(region, input, tech, vintage, output)`
    pub ritvo: HashSet<(RegionID, CommodityID, TechID, u32, CommodityID)>,
    /// `(region, tech, vintage)`
    pub rtv: HashSet<(RegionID, TechID, u32)>,
    /// `(region, tech)`
    pub rt: HashSet<(RegionID, TechID)>,
    /// Technologies
    pub t: HashSet<TechID>,
    /// Vintages
    pub v: HashSet<u32>,
    /// Input commodities
    pub ic: HashSet<CommodityID>,
    /// Output commodities
    pub oc: HashSet<CommodityID>,
}

impl ViableSets {
    fn insert(&mut self, tech: &Tech) {
        self.ritvo.insert((
            tech.region_id.clone(),
            tech.input.clone(),
            tech.tech_id.clone(),
            tech.vintage,
            tech.output.clone(),
        ));
        self.rtv
            .insert((tech.region_id.clone(), tech.tech_id.clone(), tech.vintage));
        self.rt.insert((tech.region_id.clone(), tech.tech_id.clone()));
        self.t.insert(tech.tech_id.clone());
        self.v.insert(tech.vintage);
        self.ic.insert(tech.input.clone());
        self.oc.insert(tech.output.clone());
    }
}

/// Orphans found for one region and period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrphanReport {
    /// Orphans reachable from demand but not from a source
    pub demand_orphans: IndexSet<Tech>,
    /// Orphans not reachable from demand
    pub other_orphans: IndexSet<Tech>,
}

/// Runs the network analysis to a fixed point for every region
#[derive(Debug)]
pub struct CommodityNetworkManager {
    periods: Vec<u32>,
    options: NetworkOptions,
    orig_data: NetworkModelData,
    filtered_data: Option<NetworkModelData>,
    orphans: IndexMap<(RegionID, u32), OrphanReport>,
    unsupported_demands: IndexMap<(RegionID, u32), IndexSet<CommodityID>>,
    passes: usize,
}

impl CommodityNetworkManager {
    /// Create a manager for the given data and periods
    pub fn new(periods: &[u32], data: NetworkModelData, options: NetworkOptions) -> Self {
        Self {
            periods: periods.to_vec(),
            options,
            orig_data: data,
            filtered_data: None,
            orphans: IndexMap::new(),
            unsupported_demands: IndexMap::new(),
            passes: 0,
        }
    }

    /// Prune orphans from every screened region until no more are found.
    ///
    /// Removing an orphan can leave the technology which used to supply it without a consumer,
    /// so we keep going until a pass finds nothing new. Each pass removes at least one tech from a
    /// finite set, so this terminates.
    pub fn analyze_network(&mut self) -> Result<()> {
        let mut data = self.orig_data.clone();
        self.orphans.clear();
        self.unsupported_demands.clear();
        self.passes = 0;

        let periods = self.periods.clone();
        for region_id in data.screened_regions() {
            loop {
                self.passes += 1;
                let mut found = Vec::new();
                for &period in &periods {
                    let mut network = CommodityNetwork::new(&region_id, period, &data);
                    network.analyze_network();
                    self.record_orphans(&network);

                    let unsupported = network.unsupported_demands();
                    if unsupported.is_empty() {
                        self.unsupported_demands.shift_remove(&(region_id.clone(), period));
                    } else {
                        self.unsupported_demands
                            .insert((region_id.clone(), period), unsupported.clone());
                    }

                    found.extend(network.orphaned_techs().into_iter().cloned());
                }

                if found.is_empty() {
                    break;
                }
                debug!(
                    "Removing {} orphaned tech edges from region {region_id}",
                    found.len()
                );
                data.remove_techs(&found);
            }
        }

        self.filtered_data = Some(data);
        self.check_results()
    }

    /// Keep track of every orphan found, across all passes
    fn record_orphans(&mut self, network: &CommodityNetwork) {
        let key = (network.region_id().clone(), network.period());
        for tech in network.orphaned_techs() {
            let conn = (tech.input.clone(), tech.tech_id.clone(), tech.output.clone());
            let report = self.orphans.entry(key.clone()).or_default();
            if network.demand_orphans().contains(&conn) {
                report.demand_orphans.insert(tech.clone());
            } else {
                report.other_orphans.insert(tech.clone());
            }
        }
    }

    /// Log what was found, failing where the options say we should
    fn check_results(&self) -> Result<()> {
        for ((region_id, period), report) in &self.orphans {
            for tech in &report.demand_orphans {
                error!(
                    "Demand-side orphan in region {region_id}, period {period}: {} -> {} (vintage \
                    {}) -> {} cannot be traced back to a source",
                    tech.input, tech.tech_id, tech.vintage, tech.output
                );
            }
            for tech in &report.other_orphans {
                warn!(
                    "Orphan in region {region_id}, period {period}: {} -> {} (vintage {}) -> {} \
                    does not contribute to any demand",
                    tech.input, tech.tech_id, tech.vintage, tech.output
                );
            }
        }

        let total = self.orphan_count();
        if total > 0 {
            info!(
                "Removed {total} orphaned tech edges in {} network passes",
                self.passes
            );
            if self.options.strict {
                bail!("Found {total} orphaned tech edges in the commodity network (strict mode)");
            }
        }

        for ((region_id, period), demands) in &self.unsupported_demands {
            let msg = format!(
                "Demand for {} in region {region_id}, period {period} cannot be met by any \
                viable technology",
                demands.iter().join(", ")
            );
            if self.options.fail_on_unsupported_demand {
                bail!(msg);
            }
            warn!("{msg}");
        }

        Ok(())
    }

    /// Build the filters used by the data loader.
    ///
    /// # Panics
    ///
    /// If called before [`CommodityNetworkManager::analyze_network`].
    pub fn build_filters(&self) -> ViableSets {
        let data = self
            .filtered_data
            .as_ref()
            .expect("build_filters called before analyze_network");

        let mut sets = ViableSets::default();
        for tech in data.available_techs.values().flatten() {
            sets.insert(tech);
        }
        sets
    }

    /// The data as it was before pruning
    pub fn original_data(&self) -> &NetworkModelData {
        &self.orig_data
    }

    /// The data after pruning, if the analysis has been run
    pub fn filtered_data(&self) -> Option<&NetworkModelData> {
        self.filtered_data.as_ref()
    }

    /// Orphans found, by region and period
    pub fn orphans(&self) -> &IndexMap<(RegionID, u32), OrphanReport> {
        &self.orphans
    }

    /// Demands which can't be met, by region and period
    pub fn unsupported_demands(&self) -> &IndexMap<(RegionID, u32), IndexSet<CommodityID>> {
        &self.unsupported_demands
    }

    /// The total number of orphaned tech edges found
    pub fn orphan_count(&self) -> usize {
        self.orphans
            .values()
            .map(|report| report.demand_orphans.len() + report.other_orphans.len())
            .sum()
    }

    /// The periods analysed
    pub fn periods(&self) -> &[u32] {
        &self.periods
    }
}
