//! The commodity network for a single region and period.
use super::viable::{ConnectionMap, Edge, SearchResult, trace_viable_connections};
use super::{NetworkModelData, Tech};
use crate::commodity::CommodityID;
use crate::region::RegionID;
use crate::technology::TechID;
use indexmap::IndexSet;
use log::warn;
use std::collections::HashSet;
use std::fmt::Display;

/// The label on an edge of the commodity network
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeLabel {
    /// A real technology converting input into output
    Tech(TechID),
    /// A virtual edge connecting a driver's output to the input of the tech it drives
    Linked {
        /// The driving technology
        driver: TechID,
        /// The driven technology
        driven: TechID,
    },
}

impl Display for EdgeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeLabel::Tech(tech_id) => write!(f, "{tech_id}"),
            EdgeLabel::Linked { driver, driven } => write!(f, "LINKED({driver}->{driven})"),
        }
    }
}

/// An edge of a real technology: `(input, tech, output)`
pub type TechConnection = (CommodityID, TechID, CommodityID);

/// The commodity network of one region in one period, along with the results of analysing it
pub struct CommodityNetwork<'a> {
    region_id: RegionID,
    period: u32,
    data: &'a NetworkModelData,
    /// Real technology edges, keyed by output
    connections: ConnectionMap,
    demand_commodities: IndexSet<CommodityID>,
    good_connections: HashSet<TechConnection>,
    demand_orphans: HashSet<TechConnection>,
    other_orphans: HashSet<TechConnection>,
    unsupported_demands: IndexSet<CommodityID>,
}

impl<'a> CommodityNetwork<'a> {
    /// Build the network for a region and period from the given data
    pub fn new(region_id: &RegionID, period: u32, data: &'a NetworkModelData) -> Self {
        let key = (region_id.clone(), period);
        let mut connections = ConnectionMap::new();
        for tech in data.available_techs.get(&key).into_iter().flatten() {
            connections
                .entry(tech.output.clone())
                .or_default()
                .insert((tech.input.clone(), EdgeLabel::Tech(tech.tech_id.clone())));
        }

        Self {
            region_id: region_id.clone(),
            period,
            data,
            connections,
            demand_commodities: data.demand_commodities.get(&key).cloned().unwrap_or_default(),
            good_connections: HashSet::new(),
            demand_orphans: HashSet::new(),
            other_orphans: HashSet::new(),
            unsupported_demands: IndexSet::new(),
        }
    }

    /// Every real technology edge in the network
    pub fn all_connections(&self) -> HashSet<TechConnection> {
        tech_connections(self.connections.iter().flat_map(|(output, edges)| {
            edges
                .iter()
                .map(move |(input, label)| (input.clone(), label.clone(), output.clone()))
        }))
    }

    /// Run the source trace and classify every edge.
    ///
    /// Linked techs are handled in a second search: once we know which drivers are viable, a
    /// virtual edge joins each viable driver's output to its driven tech's input. A driven tech
    /// whose driver isn't viable is never viable itself.
    pub fn analyze_network(&mut self) {
        let mut result = self.search(&self.connections);

        let linked_edges = self.linked_edges(&result);
        if !linked_edges.is_empty() {
            let mut augmented = self.connections.clone();
            for (input, label, output) in linked_edges {
                augmented.entry(output).or_default().insert((input, label));
            }
            result = self.search(&augmented);
        }

        let all = self.all_connections();
        let demand_side = tech_connections(result.demand_connections());
        let mut good = tech_connections(result.good_connections.iter().cloned());

        // Driven techs are only viable when their driver is
        for linked in self.linked_techs_present() {
            let driver_good = good.iter().any(|(_, tech_id, _)| *tech_id == linked.driver);
            let driven_good = good.iter().any(|(_, tech_id, _)| *tech_id == linked.driven);
            if !driver_good {
                good.retain(|(_, tech_id, _)| *tech_id != linked.driven);
            } else if !driven_good {
                warn!(
                    "Linked tech {} in region {} is not viable in period {}, so driver {} will \
                    operate without it",
                    linked.driven, self.region_id, self.period, linked.driver
                );
            }
        }

        self.demand_orphans = demand_side.difference(&good).cloned().collect();
        self.other_orphans = all
            .iter()
            .filter(|conn| !demand_side.contains(*conn) && !good.contains(*conn))
            .cloned()
            .collect();
        self.unsupported_demands = self
            .demand_commodities
            .iter()
            .filter(|demand| !good.iter().any(|(_, _, output)| output == *demand))
            .cloned()
            .collect();
        self.good_connections = good;
    }

    /// Run the two-pass search over the given connections
    fn search(&self, connections: &ConnectionMap) -> SearchResult {
        trace_viable_connections(
            connections,
            &self.demand_commodities,
            &self.data.source_commodities,
        )
    }

    /// Linkages in this region whose driver and driven techs both operate in this period
    fn linked_techs_present(&self) -> impl Iterator<Item = &super::LinkedTech> {
        let techs = self.present_techs();
        self.data
            .available_linked_techs
            .iter()
            .filter(move |linked| {
                linked.region_id == self.region_id
                    && techs.contains(&linked.driver)
                    && techs.contains(&linked.driven)
            })
    }

    /// The names of all techs with an edge in this network
    fn present_techs(&self) -> HashSet<TechID> {
        self.connections
            .values()
            .flatten()
            .filter_map(|(_, label)| match label {
                EdgeLabel::Tech(tech_id) => Some(tech_id.clone()),
                EdgeLabel::Linked { .. } => None,
            })
            .collect()
    }

    /// Virtual edges from the outputs of viable drivers to the inputs of the techs they drive
    fn linked_edges(&self, result: &SearchResult) -> Vec<Edge> {
        let mut edges = Vec::new();
        for linked in self.linked_techs_present() {
            let driver_outputs: IndexSet<_> = result
                .good_connections
                .iter()
                .filter(|(_, label, _)| *label == EdgeLabel::Tech(linked.driver.clone()))
                .map(|(_, _, output)| output)
                .collect();
            let driven_inputs: IndexSet<_> = self
                .connections
                .values()
                .flatten()
                .filter(|(_, label)| *label == EdgeLabel::Tech(linked.driven.clone()))
                .map(|(input, _)| input)
                .collect();

            for (output, input) in driver_outputs.iter().flat_map(|output| {
                driven_inputs.iter().map(move |input| (*output, *input))
            }) {
                edges.push((
                    output.clone(),
                    EdgeLabel::Linked {
                        driver: linked.driver.clone(),
                        driven: linked.driven.clone(),
                    },
                    input.clone(),
                ));
            }
        }
        edges
    }

    /// The region of this network
    pub fn region_id(&self) -> &RegionID {
        &self.region_id
    }

    /// The period of this network
    pub fn period(&self) -> u32 {
        self.period
    }

    /// Edges on a path from a source to a demand
    pub fn good_connections(&self) -> &HashSet<TechConnection> {
        &self.good_connections
    }

    /// Edges reachable from demand which can't be traced back to a source
    pub fn demand_orphans(&self) -> &HashSet<TechConnection> {
        &self.demand_orphans
    }

    /// Edges which are not reachable from demand at all
    pub fn other_orphans(&self) -> &HashSet<TechConnection> {
        &self.other_orphans
    }

    /// Demand commodities which no viable edge produces
    pub fn unsupported_demands(&self) -> &IndexSet<CommodityID> {
        &self.unsupported_demands
    }

    /// Names of technologies with at least one viable edge
    pub fn valid_techs(&self) -> IndexSet<TechID> {
        let mut techs: Vec<_> = self
            .good_connections
            .iter()
            .map(|(_, tech_id, _)| tech_id.clone())
            .collect();
        techs.sort();
        techs.into_iter().collect()
    }

    /// The available tech edges which have been classified as orphans (of either kind)
    pub fn orphaned_techs(&self) -> Vec<&'a Tech> {
        let key = (self.region_id.clone(), self.period);
        self.data
            .available_techs
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|tech| {
                let conn = (tech.input.clone(), tech.tech_id.clone(), tech.output.clone());
                self.demand_orphans.contains(&conn) || self.other_orphans.contains(&conn)
            })
            .collect()
    }
}

/// Keep only real technology edges, dropping their label wrapper
fn tech_connections(edges: impl IntoIterator<Item = Edge>) -> HashSet<TechConnection> {
    edges
        .into_iter()
        .filter_map(|(input, label, output)| match label {
            EdgeLabel::Tech(tech_id) => Some((input, tech_id, output)),
            EdgeLabel::Linked { .. } => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::network_data;
    use crate::network::LinkedTech;

    fn conn(input: &str, tech: &str, output: &str) -> TechConnection {
        (input.into(), tech.into(), output.into())
    }

    #[test]
    fn orphaned_branch_is_other_orphan() {
        // s1 -> t1 -> p1 -> t2 -> d1, plus t3 producing p2, which nothing consumes
        let data = network_data(
            &[
                ("s1", "t1", "p1"),
                ("p1", "t2", "d1"),
                ("s1", "t3", "p2"),
            ],
            &["d1"],
            &[],
        );
        let mut network = CommodityNetwork::new(&"R1".into(), 2020, &data);
        network.analyze_network();

        assert_eq!(network.valid_techs(), IndexSet::from(["t1".into(), "t2".into()]));
        assert!(network.demand_orphans().is_empty());
        assert_eq!(
            network.other_orphans(),
            &HashSet::from([conn("s1", "t3", "p2")])
        );
        assert!(network.unsupported_demands().is_empty());
    }

    #[test]
    fn unsourced_branch_is_other_orphan() {
        // p2 -> t3 -> d1 feeds demand, but nothing produces p2
        let data = network_data(
            &[
                ("s1", "t1", "p1"),
                ("p1", "t2", "d1"),
                ("p2", "t3", "d1"),
            ],
            &["d1"],
            &[],
        );
        let mut network = CommodityNetwork::new(&"R1".into(), 2020, &data);
        network.analyze_network();

        assert_eq!(network.valid_techs(), IndexSet::from(["t1".into(), "t2".into()]));
        assert!(network.demand_orphans().is_empty());
        assert_eq!(
            network.other_orphans(),
            &HashSet::from([conn("p2", "t3", "d1")])
        );
        assert!(network.unsupported_demands().is_empty());
    }

    #[test]
    fn broken_upstream_chain_is_demand_orphan() {
        // p2 is produced by t5, but t5's input p4 has no supplier
        let data = network_data(
            &[
                ("s1", "t1", "p1"),
                ("p1", "t2", "d1"),
                ("p2", "t3", "d1"),
                ("p4", "t5", "p2"),
            ],
            &["d1"],
            &[],
        );
        let mut network = CommodityNetwork::new(&"R1".into(), 2020, &data);
        network.analyze_network();

        assert_eq!(
            network.demand_orphans(),
            &HashSet::from([conn("p2", "t3", "d1")])
        );
        assert_eq!(
            network.other_orphans(),
            &HashSet::from([conn("p4", "t5", "p2")])
        );
    }

    #[test]
    fn edges_are_partitioned() {
        let data = network_data(
            &[
                ("s1", "t1", "p1"),
                ("p1", "t2", "d1"),
                ("p2", "t3", "d1"),
                ("p1", "t4", "p3"),
                ("p1", "storage", "p1"),
            ],
            &["d1"],
            &[],
        );
        let mut network = CommodityNetwork::new(&"R1".into(), 2020, &data);
        network.analyze_network();

        let good = network.good_connections();
        let demand = network.demand_orphans();
        let other = network.other_orphans();
        assert!(good.is_disjoint(demand));
        assert!(good.is_disjoint(other));
        assert!(demand.is_disjoint(other));

        let union: HashSet<_> = good.iter().chain(demand).chain(other).cloned().collect();
        assert_eq!(union, network.all_connections());
        assert!(good.contains(&conn("p1", "storage", "p1")));
    }

    #[test]
    fn unsupported_demand_is_reported() {
        let data = network_data(&[("s1", "t1", "d1"), ("p2", "t2", "d2")], &["d1", "d2"], &[]);
        let mut network = CommodityNetwork::new(&"R1".into(), 2020, &data);
        network.analyze_network();

        assert_eq!(network.unsupported_demands(), &IndexSet::from(["d2".into()]));
    }

    fn linked(driver: &str, driven: &str) -> LinkedTech {
        LinkedTech {
            region_id: "R1".into(),
            driver: driver.into(),
            emission: "co2".into(),
            driven: driven.into(),
        }
    }

    #[test]
    fn linked_tech_with_orphaned_driver_is_orphan() {
        // t4 (s1 -> p3) feeds nothing, so it is not viable and can't rescue "driven"
        let data = network_data(
            &[
                ("s1", "t1", "p1"),
                ("p1", "t2", "d1"),
                ("s1", "t4", "p3"),
                ("p1", "driven", "d2"),
            ],
            &["d1", "d2"],
            &[linked("t4", "driven")],
        );
        let mut network = CommodityNetwork::new(&"R1".into(), 2020, &data);
        network.analyze_network();

        assert!(!network.valid_techs().contains(&TechID::new("t4")));
        assert!(!network.valid_techs().contains(&TechID::new("driven")));
        assert!(
            network
                .demand_orphans()
                .contains(&conn("p1", "driven", "d2"))
        );
        assert_eq!(network.unsupported_demands(), &IndexSet::from(["d2".into()]));
    }

    #[test]
    fn linked_tech_is_rescued_by_viable_driver() {
        // "driven" consumes a commodity nobody produces; its driver t1 is viable
        let data = network_data(
            &[
                ("s1", "t1", "p1"),
                ("p1", "t2", "d1"),
                ("ethos", "driven", "d2"),
            ],
            &["d1", "d2"],
            &[linked("t1", "driven")],
        );
        let mut network = CommodityNetwork::new(&"R1".into(), 2020, &data);
        network.analyze_network();

        assert!(network.valid_techs().contains(&TechID::new("driven")));
        assert!(network.demand_orphans().is_empty());
        assert!(network.unsupported_demands().is_empty());
    }

    #[test]
    fn linked_edges_are_not_reported() {
        let data = network_data(
            &[("s1", "t1", "d1"), ("ethos", "driven", "d2")],
            &["d1", "d2"],
            &[linked("t1", "driven")],
        );
        let mut network = CommodityNetwork::new(&"R1".into(), 2020, &data);
        network.analyze_network();

        assert_eq!(
            network.good_connections(),
            &HashSet::from([conn("s1", "t1", "d1"), conn("ethos", "driven", "d2")])
        );
    }
}
