//! Typed model data, converted from a [`DataPortal`].
use super::portal::{DataPortal, Key, Row};
use crate::commodity::{CommodityFlag, CommodityID};
use crate::network::{EfficiencyRow, LinkedTech, NetworkModelData};
use crate::period::{demand_periods, is_sorted_and_unique};
use crate::region::RegionID;
use crate::technology::{LifetimeLookup, TechID};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use std::str::FromStr;

/// Capacity or investment cost of a process, keyed by `(region, tech, vintage)`
pub type ProcessMap<T> = IndexMap<(RegionID, TechID, u32), T>;

/// A value for a process in a period, keyed by `(region, period, tech, vintage)`
pub type ProcessPeriodMap<T> = IndexMap<(RegionID, u32, TechID, u32), T>;

/// The data needed to build a model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelData {
    /// Periods before the horizon
    pub existing_periods: Vec<u32>,
    /// Periods of the horizon, the last of which only marks its end
    pub future_periods: Vec<u32>,
    /// Regions
    pub regions: IndexSet<RegionID>,
    /// Commodities with their flags
    pub commodities: IndexMap<CommodityID, CommodityFlag>,
    /// Technologies
    pub technologies: IndexSet<TechID>,
    /// Processes, with lifetimes resolved
    pub efficiencies: Vec<EfficiencyRow>,
    /// Lifetimes
    pub lifetimes: LifetimeLookup,
    /// Capacity which is already installed
    pub existing_capacity: ProcessMap<f64>,
    /// Demand, keyed by `(region, period, commodity)`
    pub demands: IndexMap<(RegionID, u32, CommodityID), f64>,
    /// Cost per unit of new capacity
    pub cost_invest: ProcessMap<f64>,
    /// Cost per unit of capacity per period
    pub cost_fixed: ProcessPeriodMap<f64>,
    /// Cost per unit of output
    pub cost_variable: ProcessPeriodMap<f64>,
    /// Technology linkages
    pub linked_techs: Vec<LinkedTech>,
}

fn text<T: From<String>>(key: &Key) -> Result<T> {
    Ok(T::from(key.as_text()?.to_string()))
}

fn process_key(
    row: &Row,
    region: usize,
    tech: usize,
    vintage: usize,
) -> Result<(RegionID, TechID, u32)> {
    Ok((text(&row[region])?, text(&row[tech])?, row[vintage].as_period()?))
}

fn process_period_key(row: &Row) -> Result<(RegionID, u32, TechID, u32)> {
    Ok((
        text(&row[0])?,
        row[1].as_period()?,
        text(&row[2])?,
        row[3].as_period()?,
    ))
}

fn read_periods(portal: &DataPortal, name: &str) -> Result<Vec<u32>> {
    let mut periods = portal
        .set(name)?
        .iter()
        .map(|row| row[0].as_period())
        .collect::<Result<Vec<_>>>()?;
    periods.sort_unstable();
    Ok(periods)
}

impl ModelData {
    /// Convert the contents of a data portal
    pub fn from_portal(portal: &DataPortal) -> Result<Self> {
        let existing_periods = read_periods(portal, "time_exist")?;
        let future_periods = read_periods(portal, "time_future")?;
        ensure!(
            is_sorted_and_unique(&future_periods) && future_periods.len() >= 2,
            "At least two future periods are needed, one of which marks the end of the horizon"
        );

        let commodities = portal
            .set("commodities")?
            .iter()
            .map(|row| {
                let id: CommodityID = text(&row[0])?;
                let flag = row[1].as_text()?;
                let flag = CommodityFlag::from_str(flag.trim())
                    .with_context(|| format!("Invalid flag '{flag}' for commodity {id}"))?;
                Ok((id, flag))
            })
            .collect::<Result<_>>()?;

        let mut lifetimes = LifetimeLookup::default();
        for (row, value) in portal.param("lifetime_tech")? {
            lifetimes
                .tech
                .insert((text(&row[0])?, text(&row[1])?), lifetime(*value)?);
        }
        for (row, value) in portal.param("lifetime_process")? {
            lifetimes
                .process
                .insert(process_key(row, 0, 1, 2)?, lifetime(*value)?);
        }

        let efficiencies = portal
            .param("efficiency")?
            .iter()
            .map(|(row, &efficiency)| {
                let (region_id, tech_id, vintage) = process_key(row, 0, 2, 3)?;
                Ok(EfficiencyRow {
                    lifetime: lifetimes.get(&region_id, &tech_id, vintage),
                    input: text(&row[1])?,
                    output: text(&row[4])?,
                    region_id,
                    tech_id,
                    vintage,
                    efficiency,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut regions: IndexSet<RegionID> = portal
            .set("regions")?
            .iter()
            .map(|row| text(&row[0]))
            .collect::<Result<_>>()?;
        regions.extend(efficiencies.iter().map(|row| row.region_id.clone()));

        let process_param = |name| -> Result<ProcessMap<f64>> {
            portal
                .param(name)?
                .iter()
                .map(|(row, value)| Ok((process_key(row, 0, 1, 2)?, *value)))
                .collect()
        };
        let process_period_param = |name| -> Result<ProcessPeriodMap<f64>> {
            portal
                .param(name)?
                .iter()
                .map(|(row, value)| Ok((process_period_key(row)?, *value)))
                .collect()
        };

        Ok(Self {
            existing_periods,
            regions,
            commodities,
            technologies: portal
                .set("technologies")?
                .iter()
                .map(|row| text(&row[0]))
                .collect::<Result<_>>()?,
            efficiencies,
            lifetimes,
            existing_capacity: process_param("existing_capacity")?,
            demands: portal
                .param("demand")?
                .iter()
                .map(|(row, value)| {
                    Ok((
                        (text(&row[0])?, row[1].as_period()?, text(&row[2])?),
                        *value,
                    ))
                })
                .collect::<Result<_>>()?,
            cost_invest: process_param("cost_invest")?,
            cost_fixed: process_period_param("cost_fixed")?,
            cost_variable: process_period_param("cost_variable")?,
            linked_techs: portal
                .set("linked_techs")?
                .iter()
                .map(|row| {
                    Ok(LinkedTech {
                        region_id: text(&row[0])?,
                        driver: text(&row[1])?,
                        emission: text(&row[2])?,
                        driven: text(&row[3])?,
                    })
                })
                .collect::<Result<_>>()?,
            future_periods,
        })
    }

    /// The periods which are modelled, i.e. all future periods but the last
    pub fn model_periods(&self) -> &[u32] {
        demand_periods(&self.future_periods)
    }

    /// Whether capacity of this vintage is a decision of the model, rather than already installed
    pub fn is_new_vintage(&self, vintage: u32) -> bool {
        self.model_periods().contains(&vintage)
    }

    /// Assemble the data for the commodity network analysis
    pub fn network_data(&self) -> Result<NetworkModelData> {
        let demands: Vec<_> = self
            .demands
            .keys()
            .map(|(region_id, period, commodity_id)| {
                (region_id.clone(), *period, commodity_id.clone())
            })
            .collect();

        NetworkModelData::new(
            &self.efficiencies,
            &self.commodities,
            &demands,
            self.linked_techs.iter().cloned(),
            self.model_periods(),
        )
    }
}

/// Convert a lifetime read as a parameter value
fn lifetime(value: f64) -> Result<u32> {
    ensure!(
        value.fract() == 0.0 && value >= 1.0 && value <= f64::from(u32::MAX),
        "Invalid lifetime: {value}"
    );

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, store};
    use crate::input::{HybridLoader, LoadOptions};
    use crate::store::Store;
    use rstest::rstest;

    #[rstest]
    fn from_portal(store: Store) {
        let loaded = HybridLoader::new(&store, LoadOptions::default())
            .load(None)
            .unwrap();
        let data = loaded.model_data;

        assert_eq!(data.existing_periods, [2010]);
        assert_eq!(data.future_periods, [2020, 2030, 2040, 2050]);
        assert_eq!(data.model_periods(), [2020, 2030, 2040]);
        assert_eq!(data.efficiencies.len(), 9);
        assert_eq!(data.regions, IndexSet::from(["R1".into()]));
        assert_eq!(data.commodities[&CommodityID::new("s1")], CommodityFlag::Source);
        assert_eq!(data.existing_capacity.len(), 2);
        assert_eq!(data.demands[&("R1".into(), 2030, "d1".into())], 12.0);
        assert_eq!(data.cost_invest.len(), 7);

        let t2_2010 = data
            .efficiencies
            .iter()
            .find(|row| row.tech_id == "t2".into() && row.vintage == 2010)
            .unwrap();
        assert_eq!(t2_2010.lifetime, 15);
    }

    #[rstest]
    #[case(2020, false)]
    #[case(2030, true)]
    #[case(2050, false)]
    fn is_new_vintage(#[case] vintage: u32, #[case] expected: bool) {
        let data = ModelData {
            future_periods: vec![2030, 2040, 2050],
            ..Default::default()
        };
        assert_eq!(data.is_new_vintage(vintage), expected);
    }

    #[rstest]
    #[case(40.0, true)]
    #[case(0.0, false)]
    #[case(2.5, false)]
    #[case(-1.0, false)]
    fn lifetime_values(#[case] value: f64, #[case] ok: bool) {
        assert_eq!(lifetime(value).is_ok(), ok);
    }

    #[test]
    fn lifetime_error() {
        assert_error!(lifetime(2.5), "Invalid lifetime: 2.5");
    }
}
