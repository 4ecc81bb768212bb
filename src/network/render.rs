//! Rendering commodity networks as DOT graphs.
use super::manager::OrphanReport;
use super::{NetworkModelData, Tech};
use crate::commodity::CommodityID;
use crate::region::RegionID;
use crate::technology::TechID;
use petgraph::Directed;
use petgraph::dot::Dot;
use petgraph::graph::{EdgeReference, Graph, NodeIndex};
use std::collections::HashMap;
use std::fmt::Display;

/// A graph of one region's commodity network in one period
pub type NetworkGraph = Graph<CommodityNode, NetworkEdge, Directed>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A commodity in the rendered network
pub struct CommodityNode {
    /// The commodity
    pub id: CommodityID,
    /// Whether the commodity is a source
    pub is_source: bool,
    /// Whether the commodity has a demand in this region and period
    pub is_demand: bool,
}

impl Display for CommodityNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// How an edge was classified by the network analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeStatus {
    /// On a path from a source to a demand
    Good,
    /// Reachable from demand but not from a source
    DemandOrphan,
    /// Not reachable from demand
    OtherOrphan,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A technology edge in the rendered network
pub struct NetworkEdge {
    /// The technology
    pub tech_id: TechID,
    /// The vintage
    pub vintage: u32,
    /// Classification
    pub status: EdgeStatus,
}

impl Display for NetworkEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.tech_id, self.vintage)
    }
}

/// Classify an edge using the orphans recorded for its region and period
fn edge_status(tech: &Tech, report: Option<&OrphanReport>) -> EdgeStatus {
    match report {
        Some(report) if report.demand_orphans.contains(tech) => EdgeStatus::DemandOrphan,
        Some(report) if report.other_orphans.contains(tech) => EdgeStatus::OtherOrphan,
        _ => EdgeStatus::Good,
    }
}

/// Build the graph for one region and period.
///
/// All edges from the unpruned data are included, so removed orphans still show up.
pub fn build_network_graph(
    data: &NetworkModelData,
    report: Option<&OrphanReport>,
    region_id: &RegionID,
    period: u32,
) -> NetworkGraph {
    let key = (region_id.clone(), period);
    let demands = data.demand_commodities.get(&key);

    let mut graph = Graph::new();
    let mut node_index: HashMap<CommodityID, NodeIndex> = HashMap::new();
    let mut get_node = |graph: &mut NetworkGraph, id: &CommodityID| {
        *node_index.entry(id.clone()).or_insert_with(|| {
            graph.add_node(CommodityNode {
                id: id.clone(),
                is_source: data.source_commodities.contains(id),
                is_demand: demands.is_some_and(|demands| demands.contains(id)),
            })
        })
    };

    let mut techs: Vec<_> = data.available_techs.get(&key).into_iter().flatten().collect();
    techs.sort();
    for tech in techs {
        let from = get_node(&mut graph, &tech.input);
        let to = get_node(&mut graph, &tech.output);
        graph.add_edge(
            from,
            to,
            NetworkEdge {
                tech_id: tech.tech_id.clone(),
                vintage: tech.vintage,
                status: edge_status(tech, report),
            },
        );
    }

    graph
}

/// Gets custom DOT attributes for edges in a network graph
fn get_edge_attributes(_: &NetworkGraph, edge_ref: EdgeReference<NetworkEdge>) -> String {
    match edge_ref.weight().status {
        EdgeStatus::Good => String::new(),
        EdgeStatus::DemandOrphan => "color=red, style=dashed".to_string(),
        EdgeStatus::OtherOrphan => "color=gray, style=dotted".to_string(),
    }
}

/// Gets custom DOT attributes for nodes in a network graph
fn get_node_attributes(_: &NetworkGraph, (_, node): (NodeIndex, &CommodityNode)) -> String {
    if node.is_source {
        "shape=box".to_string()
    } else if node.is_demand {
        "shape=doublecircle".to_string()
    } else {
        String::new()
    }
}

/// Render a network graph as a DOT string
pub fn to_dot(graph: &NetworkGraph) -> String {
    let dot = Dot::with_attr_getters(graph, &[], &get_edge_attributes, &get_node_attributes);
    format!("{dot}")
}
