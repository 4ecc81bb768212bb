//! A compact capacity-expansion linear program, solved with HiGHS.
//!
//! Decision variables are the capacity of each process (fixed for vintages which already exist)
//! and the input flow of each efficiency row in each period in which it is active. Output flows
//! are limited by capacity, every physical commodity must be balanced and demand must be met.
use super::{Costs, ModelBuilder, ModelError, Solution, SolverModel, TerminationStatus};
use crate::commodity::{CommodityFlag, CommodityID};
use crate::input::ModelData;
use crate::input::model_data::{ProcessMap, ProcessPeriodMap};
use crate::region::RegionID;
use crate::technology::TechID;
use anyhow::Result;
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use std::ops::Range;

/// A decision variable in the optimisation
type Variable = highs::Col;

/// `(region, period, input, tech, vintage, output)`
type FlowKey = (RegionID, u32, CommodityID, TechID, u32, CommodityID);

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Builds [`LpModel`]s
#[derive(Debug, Clone, Default)]
pub struct LpBuilder {
    /// Passed to the solver as its time limit
    pub time_limit_hours: Option<f64>,
}

impl ModelBuilder for LpBuilder {
    fn build(&mut self, data: &ModelData) -> Result<Box<dyn SolverModel + Send>> {
        Ok(Box::new(LpModel::new(data, self.time_limit_hours)))
    }
}

struct CapacityVar {
    var: Variable,
    is_new: bool,
    active_periods: Vec<u32>,
}

struct FlowVar {
    var: Variable,
    efficiency: f64,
}

/// The capacity-expansion problem for one load of model data
pub struct LpModel {
    name: String,
    problem: Problem,
    capacity_vars: IndexMap<(RegionID, TechID, u32), CapacityVar>,
    capacity_var_idx: Range<usize>,
    flow_vars: IndexMap<FlowKey, FlowVar>,
    flow_var_idx: Range<usize>,
    cost_invest: ProcessMap<f64>,
    cost_fixed: ProcessPeriodMap<f64>,
    cost_variable: ProcessPeriodMap<f64>,
    time_limit_hours: Option<f64>,
    solution: Option<Solution>,
}

impl LpModel {
    /// Set up the problem for the given data
    pub fn new(data: &ModelData, time_limit_hours: Option<f64>) -> Self {
        let periods = data.model_periods();
        let mut problem = Problem::default();

        // Capacity variables **must** all be added before flow variables
        let start = problem.num_cols();
        let mut capacity_vars = IndexMap::new();
        for row in &data.efficiencies {
            let key = (row.region_id.clone(), row.tech_id.clone(), row.vintage);
            if capacity_vars.contains_key(&key) {
                continue;
            }
            let active_periods = periods
                .iter()
                .copied()
                .filter(|&period| row.is_active(period))
                .collect_vec();
            if active_periods.is_empty() {
                continue;
            }

            let fixed: f64 = active_periods
                .iter()
                .filter_map(|&period| {
                    data.cost_fixed
                        .get(&(key.0.clone(), period, key.1.clone(), key.2))
                })
                .sum();
            let is_new = data.is_new_vintage(row.vintage);
            let var = if is_new {
                let invest = data.cost_invest.get(&key).copied().unwrap_or_default();
                problem.add_column(invest + fixed, 0.0..)
            } else {
                let existing = data.existing_capacity.get(&key).copied().unwrap_or_default();
                problem.add_column(fixed, existing..=existing)
            };

            capacity_vars.insert(
                key,
                CapacityVar {
                    var,
                    is_new,
                    active_periods,
                },
            );
        }
        let capacity_var_idx = start..problem.num_cols();

        let start = problem.num_cols();
        let mut flow_vars = IndexMap::new();
        for row in &data.efficiencies {
            let key = (row.region_id.clone(), row.tech_id.clone(), row.vintage);
            let Some(capacity) = capacity_vars.get(&key) else {
                continue;
            };
            for &period in &capacity.active_periods {
                let var_cost = data
                    .cost_variable
                    .get(&(key.0.clone(), period, key.1.clone(), key.2))
                    .copied()
                    .unwrap_or_default();
                let var = problem.add_column(var_cost * row.efficiency, 0.0..);
                flow_vars.insert(
                    (
                        row.region_id.clone(),
                        period,
                        row.input.clone(),
                        row.tech_id.clone(),
                        row.vintage,
                        row.output.clone(),
                    ),
                    FlowVar {
                        var,
                        efficiency: row.efficiency,
                    },
                );
            }
        }
        let flow_var_idx = start..problem.num_cols();

        add_capacity_constraints(&mut problem, &capacity_vars, &flow_vars);
        add_balance_constraints(&mut problem, data, &flow_vars);

        let name = format!(
            "capacity expansion for {}",
            periods.iter().map(u32::to_string).join(", ")
        );
        debug!(
            "Built {name}: {} columns, {} rows",
            problem.num_cols(),
            problem.num_rows()
        );

        Self {
            name,
            problem,
            capacity_vars,
            capacity_var_idx,
            flow_vars,
            flow_var_idx,
            cost_invest: data.cost_invest.clone(),
            cost_fixed: data.cost_fixed.clone(),
            cost_variable: data.cost_variable.clone(),
            time_limit_hours,
            solution: None,
        }
    }

    /// Read variable values back into a [`Solution`]
    fn extract(&self, objective_value: f64, columns: &[f64]) -> Solution {
        let mut solution = Solution {
            objective_value,
            ..Default::default()
        };

        let capacities = &columns[self.capacity_var_idx.clone()];
        for (((region_id, tech_id, vintage), capacity), &value) in
            self.capacity_vars.iter().zip(capacities)
        {
            let key = (region_id.clone(), tech_id.clone(), *vintage);
            if capacity.is_new {
                solution.new_capacity.insert(key.clone(), value);
                if let Some(invest) = self.cost_invest.get(&key) {
                    let cost_key = (region_id.clone(), *vintage, tech_id.clone(), *vintage);
                    solution.costs.entry(cost_key).or_default().invest += invest * value;
                }
            }

            for &period in &capacity.active_periods {
                let period_key = (region_id.clone(), period, tech_id.clone(), *vintage);
                solution.net_capacity.insert(period_key.clone(), value);
                if let Some(fixed) = self.cost_fixed.get(&period_key) {
                    solution.costs.entry(period_key).or_default().fixed += fixed * value;
                }
            }
        }

        let flows = &columns[self.flow_var_idx.clone()];
        for (((region_id, period, input, tech_id, vintage, output), flow), &value) in
            self.flow_vars.iter().zip(flows)
        {
            let flow_out = value * flow.efficiency;
            solution.flow_out.insert(
                (
                    region_id.clone(),
                    *period,
                    input.clone(),
                    tech_id.clone(),
                    *vintage,
                    output.clone(),
                ),
                flow_out,
            );

            let cost_key = (region_id.clone(), *period, tech_id.clone(), *vintage);
            if let Some(var) = self.cost_variable.get(&cost_key) {
                let costs: &mut Costs = solution.costs.entry(cost_key).or_default();
                costs.var += var * flow_out;
            }
        }

        solution
    }
}

impl SolverModel for LpModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn solve(&mut self) -> Result<TerminationStatus, ModelError> {
        self.solution = None;

        let mut model = self.problem.clone().optimise(Sense::Minimise);
        model.make_quiet();
        if let Some(hours) = self.time_limit_hours {
            model.set_option("time_limit", hours * SECONDS_PER_HOUR);
        }
        let solved = model
            .try_solve()
            .map_err(|status| ModelError::Incoherent(format!("{status:?}")))?;

        let status = match solved.status() {
            HighsModelStatus::Optimal => TerminationStatus::Optimal,
            HighsModelStatus::Infeasible => TerminationStatus::Infeasible,
            status => TerminationStatus::Other(format!("{status:?}")),
        };
        if status == TerminationStatus::Optimal {
            let solution = self.extract(solved.objective_value(), solved.get_solution().columns());
            self.solution = Some(solution);
        }

        Ok(status)
    }

    fn solution(&self) -> Option<&Solution> {
        self.solution.as_ref()
    }
}

/// Output of every process in each period is limited by its capacity
fn add_capacity_constraints(
    problem: &mut Problem,
    capacity_vars: &IndexMap<(RegionID, TechID, u32), CapacityVar>,
    flow_vars: &IndexMap<FlowKey, FlowVar>,
) {
    let mut terms: IndexMap<_, Vec<_>> = IndexMap::new();
    for ((region_id, period, _, tech_id, vintage, _), flow) in flow_vars {
        terms
            .entry((region_id, *period, tech_id, *vintage))
            .or_default()
            .push((flow.var, flow.efficiency));
    }

    for ((region_id, _, tech_id, vintage), mut terms) in terms {
        let capacity = &capacity_vars[&(region_id.clone(), tech_id.clone(), vintage)];
        terms.push((capacity.var, -1.0));
        problem.add_row(..=0.0, terms);
    }
}

/// Production of every balanced commodity must cover consumption plus demand
fn add_balance_constraints(
    problem: &mut Problem,
    data: &ModelData,
    flow_vars: &IndexMap<FlowKey, FlowVar>,
) {
    // Sources are supplied from nothing and emissions are never consumed
    let is_balanced = |commodity_id: &CommodityID| {
        !matches!(
            data.commodities.get(commodity_id),
            Some(CommodityFlag::Source | CommodityFlag::Emission)
        )
    };

    let mut terms: IndexMap<_, Vec<_>> = IndexMap::new();
    for ((region_id, period, input, _, _, output), flow) in flow_vars {
        if input == output {
            if is_balanced(output) {
                terms
                    .entry((region_id.clone(), *period, output.clone()))
                    .or_default()
                    .push((flow.var, flow.efficiency - 1.0));
            }
            continue;
        }
        if is_balanced(output) {
            terms
                .entry((region_id.clone(), *period, output.clone()))
                .or_default()
                .push((flow.var, flow.efficiency));
        }
        if is_balanced(input) {
            terms
                .entry((region_id.clone(), *period, input.clone()))
                .or_default()
                .push((flow.var, -1.0));
        }
    }

    // Demand which nothing can produce still needs a row, so the problem is reported infeasible
    let periods = data.model_periods();
    for key in data.demands.keys() {
        if periods.contains(&key.1) {
            terms.entry(key.clone()).or_default();
        }
    }

    for (key, terms) in terms {
        let demand = data.demands.get(&key).copied().unwrap_or_default();
        problem.add_row(demand.., terms);
    }
}
