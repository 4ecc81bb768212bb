//! The reachability search which decides which edges of a commodity network are viable.
//!
//! An edge `input -> tech -> output` is viable ("good") if it lies on some path from a source
//! commodity to a demand commodity. We find these in two passes:
//!
//! 1. Walk backwards from the demands, recording every edge whose input can be supplied at all
//!    (a source, or the output of another edge) and every source reached.
//! 2. Walk forwards from the sources which were reached, but only along edges recorded in pass 1.
//!
//! Edges found in pass 1 are reachable from demand; those confirmed in pass 2 are also reachable
//! from a source.
use super::commodity_network::EdgeLabel;
use crate::commodity::CommodityID;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};

/// An edge in the network: `(input, label, output)`
pub type Edge = (CommodityID, EdgeLabel, CommodityID);

/// The edges of a network, keyed by output commodity: `output -> {(input, label)}`
pub type ConnectionMap = HashMap<CommodityID, HashSet<(CommodityID, EdgeLabel)>>;

/// Edges reached while walking back from demand, keyed by input: `input -> {(label, output)}`
pub type VisitedMap = HashMap<CommodityID, HashSet<(EdgeLabel, CommodityID)>>;

/// The outcome of the two-pass search
#[derive(Debug, Default)]
pub struct SearchResult {
    /// Source commodities reached from demand
    pub discovered_sources: IndexSet<CommodityID>,
    /// Every edge reachable backwards from demand, keyed by input commodity
    pub visited: VisitedMap,
    /// Edges on a path from a source to a demand
    pub good_connections: HashSet<Edge>,
}

impl SearchResult {
    /// Every edge which was reached from demand, as `(input, label, output)` triples
    pub fn demand_connections(&self) -> HashSet<Edge> {
        self.visited
            .iter()
            .flat_map(|(input, edges)| {
                edges
                    .iter()
                    .map(move |(label, output)| (input.clone(), label.clone(), output.clone()))
            })
            .collect()
    }
}

/// Find the viable edges of a network.
///
/// # Arguments
///
/// * `connections` - The edges of the network, keyed by output
/// * `demands` - The commodities to walk back from
/// * `sources` - Commodities which count as sources
pub fn trace_viable_connections(
    connections: &ConnectionMap,
    demands: &IndexSet<CommodityID>,
    sources: &IndexSet<CommodityID>,
) -> SearchResult {
    let (discovered_sources, visited) = walk_from_demand(connections.clone(), demands, sources);
    let good_connections = walk_from_sources(&discovered_sources, &visited);

    SearchResult {
        discovered_sources,
        visited,
        good_connections,
    }
}

/// Walk backwards from the demand commodities.
///
/// An edge is only recorded if its input is a source or is produced by some other edge. Edges
/// whose input is a dead end are left for the caller to classify as disconnected.
///
/// Edges are removed from `connections` as they are expanded, so each commodity is expanded at
/// most once and the search terminates on cyclic networks (e.g. storage, whose input and output
/// are the same commodity).
fn walk_from_demand(
    mut connections: ConnectionMap,
    demands: &IndexSet<CommodityID>,
    sources: &IndexSet<CommodityID>,
) -> (IndexSet<CommodityID>, VisitedMap) {
    let produced: HashSet<CommodityID> = connections.keys().cloned().collect();
    let mut discovered_sources = IndexSet::new();
    let mut visited = VisitedMap::new();
    let mut stack: Vec<CommodityID> = demands.iter().cloned().collect();

    while let Some(output) = stack.pop() {
        let Some(edges) = connections.remove(&output) else {
            // Either nothing produces this commodity or we have already expanded it
            continue;
        };

        for (input, label) in edges {
            let is_source = sources.contains(&input);
            if !is_source && !produced.contains(&input) {
                continue;
            }
            visited
                .entry(input.clone())
                .or_default()
                .insert((label, output.clone()));
            if is_source {
                discovered_sources.insert(input.clone());
            }
            stack.push(input);
        }
    }

    (discovered_sources, visited)
}

/// Walk forwards from the discovered sources along the edges visited from demand
fn walk_from_sources(
    discovered_sources: &IndexSet<CommodityID>,
    visited: &VisitedMap,
) -> HashSet<Edge> {
    let mut good = HashSet::new();
    let mut expanded = HashSet::new();
    let mut stack: Vec<&CommodityID> = discovered_sources.iter().collect();

    while let Some(input) = stack.pop() {
        if !expanded.insert(input) {
            continue;
        }
        let Some(edges) = visited.get(input) else {
            continue;
        };

        for (label, output) in edges {
            good.insert((input.clone(), label.clone(), output.clone()));
            stack.push(output);
        }
    }

    good
}
