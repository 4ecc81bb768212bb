//! Fixtures for tests
use crate::commodity::{CommodityFlag, CommodityID};
use crate::network::{EfficiencyRow, LinkedTech, NetworkModelData, Tech};
use crate::store::Store;
use indexmap::{IndexMap, IndexSet, indexmap};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// SQL which populates a store with a small single-region model
pub const SIMPLE_MODEL_SQL: &str = include_str!("../tests/data/simple.sql");

/// An in-memory store containing the simple model
#[fixture]
pub fn store() -> Store {
    let store = Store::in_memory().unwrap();
    store.conn().execute_batch(SIMPLE_MODEL_SQL).unwrap();
    store
}

/// The same as [`store`], but with the output tables created too
#[fixture]
pub fn output_store(store: Store) -> Store {
    store.create_output_tables().unwrap();
    store
}

#[fixture]
pub fn commodity_flags() -> IndexMap<CommodityID, CommodityFlag> {
    indexmap! {
        "s1".into() => CommodityFlag::Source,
        "p1".into() => CommodityFlag::Physical,
        "p2".into() => CommodityFlag::Physical,
        "p3".into() => CommodityFlag::Physical,
        "d1".into() => CommodityFlag::Demand,
        "d2".into() => CommodityFlag::Demand,
        "co2".into() => CommodityFlag::Emission,
    }
}

/// An efficiency row in region R1 with an efficiency of one
pub fn efficiency_row(
    input: &str,
    tech: &str,
    vintage: u32,
    output: &str,
    lifetime: u32,
) -> EfficiencyRow {
    EfficiencyRow {
        region_id: "R1".into(),
        input: input.into(),
        tech_id: tech.into(),
        vintage,
        output: output.into(),
        efficiency: 1.0,
        lifetime,
    }
}

/// Network data for region R1 in 2020, with s1 as the only source.
///
/// Every edge is a 2020 vintage of the named tech.
pub fn network_data(
    edges: &[(&str, &str, &str)],
    demands: &[&str],
    linked_techs: &[LinkedTech],
) -> NetworkModelData {
    let mut data = network_data_for_periods(edges, demands, &[2020]);
    data.available_linked_techs = linked_techs.iter().cloned().collect();
    data
}

/// Like [`network_data`], but with the same edges and demands in every given period
pub fn network_data_for_periods(
    edges: &[(&str, &str, &str)],
    demands: &[&str],
    periods: &[u32],
) -> NetworkModelData {
    let mut data = NetworkModelData {
        source_commodities: IndexSet::from(["s1".into()]),
        ..Default::default()
    };

    for &period in periods {
        let key = ("R1".into(), period);
        let techs = data.available_techs.entry(key.clone()).or_default();
        for (input, tech, output) in edges {
            techs.insert(Tech {
                region_id: "R1".into(),
                period,
                input: (*input).into(),
                tech_id: (*tech).into(),
                vintage: 2020,
                output: (*output).into(),
            });
        }
        data.demand_commodities
            .insert(key, demands.iter().map(|&demand| demand.into()).collect());
    }

    data.all_commodities = edges
        .iter()
        .flat_map(|(input, _, output)| [*input, *output])
        .chain(demands.iter().copied())
        .map(CommodityID::from)
        .collect();
    data
}
