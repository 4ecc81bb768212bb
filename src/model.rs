//! The boundary between the run sequencing and the optimisation model.
//!
//! The sequencer only ever sees a [`SolverModel`]: something which can be solved, reports how the
//! solve terminated and, if it was optimal, exposes the values of its decision variables.
use crate::commodity::CommodityID;
use crate::input::ModelData;
use crate::region::RegionID;
use crate::technology::TechID;
use anyhow::Result;
use indexmap::IndexMap;
use std::error::Error;
use std::fmt;

pub mod lp;
pub use lp::LpBuilder;

/// How a solve terminated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationStatus {
    /// An optimal solution was found
    Optimal,
    /// The model has no feasible solution
    Infeasible,
    /// Any other outcome, e.g. hitting the time limit
    Other(String),
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimal => write!(f, "optimal"),
            Self::Infeasible => write!(f, "infeasible"),
            Self::Other(status) => write!(f, "{status}"),
        }
    }
}

/// Defines the possible errors that can occur when running the solver
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The model definition is incoherent.
    ///
    /// Users should not be able to trigger this error.
    Incoherent(String),
    /// An optimal solution could not be found
    NonOptimal(TerminationStatus),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Incoherent(status) => write!(f, "Incoherent model: {status}"),
            ModelError::NonOptimal(status) => {
                write!(f, "Could not find optimal result: {status}")
            }
        }
    }
}

impl Error for ModelError {}

/// Costs attributed to a process in one period
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Costs {
    /// Investment in new capacity, attributed to the vintage period
    pub invest: f64,
    /// Fixed operating costs
    pub fixed: f64,
    /// Variable operating costs
    pub var: f64,
}

/// The values of the decision variables of a solved model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    /// The value of the objective function
    pub objective_value: f64,
    /// Capacity installed in each period, keyed by `(region, period, tech, vintage)`
    pub net_capacity: IndexMap<(RegionID, u32, TechID, u32), f64>,
    /// New capacity decided by the model, keyed by `(region, tech, vintage)`
    pub new_capacity: IndexMap<(RegionID, TechID, u32), f64>,
    /// Output flows, keyed by `(region, period, input, tech, vintage, output)`
    pub flow_out: IndexMap<(RegionID, u32, CommodityID, TechID, u32, CommodityID), f64>,
    /// Costs, keyed by `(region, period, tech, vintage)`
    pub costs: IndexMap<(RegionID, u32, TechID, u32), Costs>,
}

/// A built model which can be handed to a solver
pub trait SolverModel {
    /// A short description of the model, for log messages
    fn name(&self) -> &str;

    /// Solve the model.
    ///
    /// A non-optimal outcome is not an error here: it is reported through the returned status.
    /// Errors are only returned if the model could not be passed to the solver at all.
    fn solve(&mut self) -> Result<TerminationStatus, ModelError>;

    /// The solution, if the last solve was optimal
    fn solution(&self) -> Option<&Solution>;
}

/// Builds a [`SolverModel`] from loaded data
pub trait ModelBuilder {
    /// Build a model for the given data
    fn build(&mut self, data: &ModelData) -> Result<Box<dyn SolverModel + Send>>;
}

/// Try to solve the model, returning an error if the model is incoherent or result is non-optimal
pub fn solve_optimal<M: SolverModel + ?Sized>(model: &mut M) -> Result<&Solution, ModelError> {
    match model.solve()? {
        TerminationStatus::Optimal => model
            .solution()
            .ok_or_else(|| ModelError::Incoherent("optimal solve produced no solution".into())),
        status => Err(ModelError::NonOptimal(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A model which always terminates with the given status
    struct FixedStatus(TerminationStatus, Solution);

    impl SolverModel for FixedStatus {
        fn name(&self) -> &str {
            "fixed"
        }

        fn solve(&mut self) -> Result<TerminationStatus, ModelError> {
            Ok(self.0.clone())
        }

        fn solution(&self) -> Option<&Solution> {
            (self.0 == TerminationStatus::Optimal).then_some(&self.1)
        }
    }

    #[test]
    fn solve_optimal_returns_solution() {
        let solution = Solution {
            objective_value: 3.0,
            ..Default::default()
        };
        let mut model = FixedStatus(TerminationStatus::Optimal, solution.clone());
        assert_eq!(solve_optimal(&mut model).unwrap(), &solution);
    }

    #[test]
    fn solve_optimal_non_optimal() {
        let mut model = FixedStatus(TerminationStatus::Infeasible, Solution::default());
        let err = solve_optimal(&mut model).unwrap_err();
        assert_eq!(err, ModelError::NonOptimal(TerminationStatus::Infeasible));
        assert_eq!(err.to_string(), "Could not find optimal result: infeasible");
    }
}
