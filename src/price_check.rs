//! Checks for inconsistent cost data.
//!
//! Nothing found here stops a run: every issue is logged as a warning so that it can be audited
//! afterwards.
use crate::input::ModelData;
use crate::region::RegionID;
use crate::technology::TechID;
use indexmap::{IndexMap, IndexSet};
use log::{info, warn};
use std::fmt::Display;

/// A problem with the cost data for a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceIssue {
    /// A fixed cost is given for a period, but not a variable cost
    MissingVariableCost {
        region_id: RegionID,
        tech_id: TechID,
        vintage: u32,
        period: u32,
    },
    /// A variable cost is given for a period, but not a fixed cost
    MissingFixedCost {
        region_id: RegionID,
        tech_id: TechID,
        vintage: u32,
        period: u32,
    },
    /// Capacity of this vintage can be built, but has no investment cost
    MissingInvestCost {
        region_id: RegionID,
        tech_id: TechID,
        vintage: u32,
    },
}

impl Display for PriceIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVariableCost {
                region_id,
                tech_id,
                vintage,
                period,
            } => write!(
                f,
                "{tech_id} (vintage {vintage}) in region {region_id} has a fixed cost but no \
                variable cost in {period}"
            ),
            Self::MissingFixedCost {
                region_id,
                tech_id,
                vintage,
                period,
            } => write!(
                f,
                "{tech_id} (vintage {vintage}) in region {region_id} has a variable cost but no \
                fixed cost in {period}"
            ),
            Self::MissingInvestCost {
                region_id,
                tech_id,
                vintage,
            } => write!(
                f,
                "{tech_id} (vintage {vintage}) in region {region_id} can be built but has no \
                investment cost"
            ),
        }
    }
}

/// Which kinds of operating cost are given for one process in one period
#[derive(Default)]
struct CostsPresent {
    fixed: bool,
    var: bool,
}

/// Check the cost data for every process in `data`.
///
/// A process which has both fixed and variable costs in some period is expected to have both in
/// every period in which it has either. Processes which only ever have one kind of operating cost
/// are fine.
///
/// Every issue found is logged as a warning.
pub fn check_prices(data: &ModelData) -> Vec<PriceIssue> {
    let mut operating: IndexMap<(RegionID, TechID, u32), IndexMap<u32, CostsPresent>> =
        IndexMap::new();
    for (region_id, period, tech_id, vintage) in data.cost_fixed.keys() {
        operating
            .entry((region_id.clone(), tech_id.clone(), *vintage))
            .or_default()
            .entry(*period)
            .or_default()
            .fixed = true;
    }
    for (region_id, period, tech_id, vintage) in data.cost_variable.keys() {
        operating
            .entry((region_id.clone(), tech_id.clone(), *vintage))
            .or_default()
            .entry(*period)
            .or_default()
            .var = true;
    }

    let mut issues = Vec::new();
    for ((region_id, tech_id, vintage), periods) in &mut operating {
        let has_both = periods.values().any(|costs| costs.fixed && costs.var);
        if !has_both {
            continue;
        }

        periods.sort_keys();
        for (period, costs) in periods.iter() {
            let (region_id, tech_id, vintage, period) =
                (region_id.clone(), tech_id.clone(), *vintage, *period);
            match (costs.fixed, costs.var) {
                (true, false) => issues.push(PriceIssue::MissingVariableCost {
                    region_id,
                    tech_id,
                    vintage,
                    period,
                }),
                (false, true) => issues.push(PriceIssue::MissingFixedCost {
                    region_id,
                    tech_id,
                    vintage,
                    period,
                }),
                _ => {}
            }
        }
    }

    let new_processes: IndexSet<_> = data
        .efficiencies
        .iter()
        .filter(|row| data.is_new_vintage(row.vintage))
        .map(|row| (row.region_id.clone(), row.tech_id.clone(), row.vintage))
        .collect();
    for (region_id, tech_id, vintage) in new_processes {
        if !data
            .cost_invest
            .contains_key(&(region_id.clone(), tech_id.clone(), vintage))
        {
            issues.push(PriceIssue::MissingInvestCost {
                region_id,
                tech_id,
                vintage,
            });
        }
    }

    for issue in &issues {
        warn!("Price check: {issue}");
    }
    if issues.is_empty() {
        info!("Price check found no problems");
    }

    issues
}
