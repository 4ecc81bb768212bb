//! Module for analysing the commodity network.
//!
//! Before a model is built, we check which technologies can actually contribute to meeting demand:
//! a technology is only useful if its input can be traced back to a source commodity and its
//! output forward to a demand. Technologies failing this test ("orphans") are removed, and the
//! surviving index tuples are handed to the data loader as filters.
use crate::commodity::{CommodityFlag, CommodityID};
use crate::region::RegionID;
use crate::technology::TechID;
use anyhow::{Result, ensure};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use std::collections::HashMap;

pub mod commodity_network;
pub mod manager;
pub mod render;
pub mod viable;

/// One conversion edge of a technology vintage which is active in a particular period
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tech {
    /// The region in which the technology operates
    pub region_id: RegionID,
    /// The period in which it is active
    pub period: u32,
    /// The commodity consumed
    pub input: CommodityID,
    /// The technology
    pub tech_id: TechID,
    /// The period in which this instance was built
    pub vintage: u32,
    /// The commodity produced
    pub output: CommodityID,
}

/// A technology whose activity is gated by another technology via a shared emission
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkedTech {
    /// The region of the linkage
    pub region_id: RegionID,
    /// The technology whose activity drives the linkage
    pub driver: TechID,
    /// The emission commodity shared by the two
    pub emission: CommodityID,
    /// The technology which is implicitly operated by the driver
    pub driven: TechID,
}

/// One row of the `Efficiency` (or `MyopicEfficiency`) table with its resolved lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyRow {
    /// Region
    pub region_id: RegionID,
    /// Input commodity
    pub input: CommodityID,
    /// Technology
    pub tech_id: TechID,
    /// Vintage
    pub vintage: u32,
    /// Output commodity
    pub output: CommodityID,
    /// Conversion efficiency
    pub efficiency: f64,
    /// Lifetime, after applying the fallback chain
    pub lifetime: u32,
}

impl EfficiencyRow {
    /// Whether this process is operating in `period`
    pub fn is_active(&self, period: u32) -> bool {
        self.vintage <= period && period < self.vintage + self.lifetime
    }
}

/// A snapshot of everything the network analysis needs for one model build.
///
/// Cheap enough to clone, which lets the manager prune a working copy while the original is kept
/// for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkModelData {
    /// Every commodity in the model
    pub all_commodities: IndexSet<CommodityID>,
    /// Commodities which may be consumed from nothing
    pub source_commodities: IndexSet<CommodityID>,
    /// Commodities with an exogenous demand, for each region and period
    pub demand_commodities: HashMap<(RegionID, u32), IndexSet<CommodityID>>,
    /// Active technology edges, for each region and period
    pub available_techs: HashMap<(RegionID, u32), IndexSet<Tech>>,
    /// Linkages between technologies
    pub available_linked_techs: IndexSet<LinkedTech>,
}

impl NetworkModelData {
    /// Assemble the network data for the given periods.
    ///
    /// # Arguments
    ///
    /// * `efficiencies` - Efficiency rows, with lifetimes resolved
    /// * `commodities` - All commodities with their flags
    /// * `demands` - The `(region, period, commodity)` combinations which have a demand
    /// * `linked_techs` - Technology linkages
    /// * `periods` - The periods to analyse
    ///
    /// # Errors
    ///
    /// If there are no source commodities, if some region has no demand in one of the periods or
    /// if a linkage is invalid.
    pub fn new(
        efficiencies: &[EfficiencyRow],
        commodities: &IndexMap<CommodityID, CommodityFlag>,
        demands: &[(RegionID, u32, CommodityID)],
        linked_techs: impl IntoIterator<Item = LinkedTech>,
        periods: &[u32],
    ) -> Result<Self> {
        let source_commodities: IndexSet<_> = commodities
            .iter()
            .filter(|(_, flag)| **flag == CommodityFlag::Source)
            .map(|(id, _)| id.clone())
            .collect();
        ensure!(
            !source_commodities.is_empty(),
            "No source commodities found. At least one commodity must have the source flag ('s')."
        );

        let mut available_techs: HashMap<_, IndexSet<_>> = HashMap::new();
        for row in efficiencies {
            for &period in periods.iter().filter(|&&period| row.is_active(period)) {
                available_techs
                    .entry((row.region_id.clone(), period))
                    .or_default()
                    .insert(Tech {
                        region_id: row.region_id.clone(),
                        period,
                        input: row.input.clone(),
                        tech_id: row.tech_id.clone(),
                        vintage: row.vintage,
                        output: row.output.clone(),
                    });
            }
        }

        let mut demand_commodities: HashMap<_, IndexSet<_>> = HashMap::new();
        for (region_id, period, commodity_id) in demands {
            if periods.contains(period) {
                demand_commodities
                    .entry((region_id.clone(), *period))
                    .or_default()
                    .insert(commodity_id.clone());
            }
        }

        // Every screened region must have something to supply in every period
        let regions: IndexSet<_> = efficiencies
            .iter()
            .map(|row| &row.region_id)
            .filter(|region_id| !region_id.is_exchange())
            .collect();
        for (region_id, period) in regions.iter().cartesian_product(periods) {
            ensure!(
                demand_commodities
                    .get(&((*region_id).clone(), *period))
                    .is_some_and(|demands| !demands.is_empty()),
                "No demand commodities found for region {region_id} in period {period}"
            );
        }

        let available_linked_techs = linked_techs
            .into_iter()
            .map(|linked| {
                check_linked_tech(&linked, efficiencies)?;
                Ok(linked)
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            all_commodities: commodities.keys().cloned().collect(),
            source_commodities,
            demand_commodities,
            available_techs,
            available_linked_techs,
        })
    }

    /// The regions which take part in the network screening, in sorted order
    pub fn screened_regions(&self) -> IndexSet<RegionID> {
        self.available_techs
            .keys()
            .map(|(region_id, _)| region_id)
            .filter(|region_id| !region_id.is_exchange())
            .cloned()
            .sorted()
            .collect()
    }

    /// Remove technology edges from the available set
    pub fn remove_techs<'a>(&mut self, techs: impl IntoIterator<Item = &'a Tech>) {
        for tech in techs {
            if let Some(set) = self
                .available_techs
                .get_mut(&(tech.region_id.clone(), tech.period))
            {
                set.shift_remove(tech);
            }
        }
    }
}

/// Check that a technology linkage can be represented in the network.
///
/// The driven technology is connected to the network through its driver, which only makes sense
/// if the driven technology has a single input commodity and the driver has at least one output.
fn check_linked_tech(linked: &LinkedTech, efficiencies: &[EfficiencyRow]) -> Result<()> {
    let driven_inputs: IndexSet<_> = efficiencies
        .iter()
        .filter(|row| row.region_id == linked.region_id && row.tech_id == linked.driven)
        .map(|row| &row.input)
        .collect();
    ensure!(
        driven_inputs.len() <= 1,
        "Driven linked tech {} in region {} has more than one input commodity ({}), so its \
        connection to driver {} is ambiguous",
        linked.driven,
        linked.region_id,
        driven_inputs.iter().join(", "),
        linked.driver
    );

    ensure!(
        efficiencies
            .iter()
            .any(|row| row.region_id == linked.region_id && row.tech_id == linked.driver),
        "Driver linked tech {} has no efficiency entries in region {}, so its outputs cannot be \
        determined",
        linked.driver,
        linked.region_id
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, commodity_flags, efficiency_row};
    use rstest::rstest;

    fn demands(periods: &[u32]) -> Vec<(RegionID, u32, CommodityID)> {
        periods
            .iter()
            .map(|&period| ("R1".into(), period, "d1".into()))
            .collect()
    }

    #[rstest]
    fn new_builds_active_techs(commodity_flags: IndexMap<CommodityID, CommodityFlag>) {
        let rows = [
            efficiency_row("s1", "t1", 2020, "p1", 10),
            efficiency_row("p1", "t2", 2020, "d1", 20),
        ];
        let data = NetworkModelData::new(
            &rows,
            &commodity_flags,
            &demands(&[2020, 2030]),
            [],
            &[2020, 2030],
        )
        .unwrap();

        assert_eq!(data.available_techs[&("R1".into(), 2020)].len(), 2);
        // t1 has retired by 2030
        let techs_2030 = &data.available_techs[&("R1".into(), 2030)];
        assert_eq!(techs_2030.len(), 1);
        assert_eq!(techs_2030[0].tech_id, "t2".into());
        assert_eq!(data.source_commodities, IndexSet::from(["s1".into()]));
    }

    #[rstest]
    fn new_fails_without_sources(mut commodity_flags: IndexMap<CommodityID, CommodityFlag>) {
        commodity_flags.insert("s1".into(), CommodityFlag::Physical);
        let rows = [efficiency_row("s1", "t1", 2020, "d1", 10)];
        assert_error!(
            NetworkModelData::new(&rows, &commodity_flags, &demands(&[2020]), [], &[2020]),
            "No source commodities found. At least one commodity must have the source flag ('s')."
        );
    }

    #[rstest]
    fn new_fails_without_demand(commodity_flags: IndexMap<CommodityID, CommodityFlag>) {
        let rows = [efficiency_row("s1", "t1", 2020, "d1", 40)];
        assert_error!(
            NetworkModelData::new(
                &rows,
                &commodity_flags,
                &demands(&[2020]),
                [],
                &[2020, 2030]
            ),
            "No demand commodities found for region R1 in period 2030"
        );
    }

    #[rstest]
    fn new_fails_for_ambiguous_driven_tech(commodity_flags: IndexMap<CommodityID, CommodityFlag>) {
        let rows = [
            efficiency_row("s1", "t1", 2020, "d1", 10),
            efficiency_row("p1", "driven", 2020, "d1", 10),
            efficiency_row("p2", "driven", 2020, "d1", 10),
        ];
        let linked = LinkedTech {
            region_id: "R1".into(),
            driver: "t1".into(),
            emission: "co2".into(),
            driven: "driven".into(),
        };
        assert_error!(
            NetworkModelData::new(&rows, &commodity_flags, &demands(&[2020]), [linked], &[2020]),
            "Driven linked tech driven in region R1 has more than one input commodity (p1, p2), \
            so its connection to driver t1 is ambiguous"
        );
    }

    #[rstest]
    fn new_fails_for_missing_driver(commodity_flags: IndexMap<CommodityID, CommodityFlag>) {
        let rows = [efficiency_row("p1", "driven", 2020, "d1", 10)];
        let linked = LinkedTech {
            region_id: "R1".into(),
            driver: "t9".into(),
            emission: "co2".into(),
            driven: "driven".into(),
        };
        assert_error!(
            NetworkModelData::new(&rows, &commodity_flags, &demands(&[2020]), [linked], &[2020]),
            "Driver linked tech t9 has no efficiency entries in region R1, so its outputs cannot \
            be determined"
        );
    }

    #[rstest]
    fn exchange_regions_are_not_screened(commodity_flags: IndexMap<CommodityID, CommodityFlag>) {
        let mut rows = vec![efficiency_row("s1", "t1", 2020, "d1", 10)];
        let mut exchange = efficiency_row("d1", "tx", 2020, "d1", 10);
        exchange.region_id = "R1-R2".into();
        rows.push(exchange);

        // No demand is needed for the exchange region
        let data =
            NetworkModelData::new(&rows, &commodity_flags, &demands(&[2020]), [], &[2020]).unwrap();
        assert_eq!(data.screened_regions(), IndexSet::from(["R1".into()]));
    }

    #[rstest]
    fn clone_is_independent(commodity_flags: IndexMap<CommodityID, CommodityFlag>) {
        let rows = [efficiency_row("s1", "t1", 2020, "d1", 10)];
        let data =
            NetworkModelData::new(&rows, &commodity_flags, &demands(&[2020]), [], &[2020]).unwrap();
        let mut pruned = data.clone();
        let techs: Vec<_> = pruned.available_techs[&("R1".into(), 2020)]
            .iter()
            .cloned()
            .collect();
        pruned.remove_techs(&techs);

        assert!(pruned.available_techs[&("R1".into(), 2020)].is_empty());
        assert_eq!(data.available_techs[&("R1".into(), 2020)].len(), 1);
    }
}
