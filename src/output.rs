//! The module responsible for writing output data to the store.
//!
//! Results are written incrementally: a myopic run commits each window's results for the periods
//! it is responsible for, after clearing anything an earlier, superseded attempt left behind.
use crate::model::Solution;
use crate::store::Store;
use anyhow::{Context, Result, ensure};
use log::debug;
use rusqlite::params;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

pub mod graph;
pub mod metadata;

/// Values with a smaller magnitude than this are not written
const MIN_WRITTEN_VALUE: f64 = 1e-6;

/// Get the default output directory for a scenario
pub fn get_output_dir(results_root: &Path, scenario: &str) -> PathBuf {
    results_root.join(scenario)
}

/// Create a new output directory, if it doesn't already exist.
///
/// An existing directory is only reused if it is empty or `allow_overwrite` is set, in which case
/// its contents are deleted.
///
/// # Returns
///
/// Whether an existing, non-empty directory was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if output_dir.is_dir() {
        let is_empty = fs::read_dir(output_dir)?.next().is_none();
        if is_empty {
            false
        } else {
            ensure!(
                allow_overwrite,
                "Output folder already exists and is not empty. Please delete the folder or pass \
                the --overwrite command-line option."
            );
            fs::remove_dir_all(output_dir)?;
            true
        }
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;
    Ok(overwrite)
}

/// Remove results for `scenario` from `from_period` onwards.
///
/// For built capacity, the vintage is used in place of the period, and objectives are cleared by
/// the first period of the solve which produced them.
pub fn clear_results(store: &Store, scenario: &str, from_period: u32) -> Result<()> {
    for (table, column) in [
        ("OutputNetCapacity", "period"),
        ("OutputFlowOut", "period"),
        ("OutputCost", "period"),
        ("OutputBuiltCapacity", "vintage"),
        ("OutputObjective", "base_year"),
    ] {
        let removed = store
            .conn()
            .execute(
                &format!("DELETE FROM {table} WHERE scenario = ?1 AND {column} >= ?2"),
                params![scenario, from_period],
            )
            .with_context(|| format!("Failed to clear {table}"))?;
        if removed > 0 {
            debug!("Cleared {removed} rows from {table} from {from_period} onwards");
        }
    }
    Ok(())
}

/// Writes a solution to the output tables
pub struct ResultsWriter<'a> {
    store: &'a mut Store,
    scenario: &'a str,
}

impl<'a> ResultsWriter<'a> {
    /// Create a writer for the given scenario
    pub fn new(store: &'a mut Store, scenario: &'a str) -> Self {
        Self { store, scenario }
    }

    /// Write the results for the periods in `committed`, along with the objective value.
    ///
    /// Everything is written in a single transaction.
    ///
    /// # Arguments
    ///
    /// * `solution` - The solution to write
    /// * `committed` - The periods whose results are final
    /// * `objective_name` - The name the objective value is recorded under
    pub fn write(
        &mut self,
        solution: &Solution,
        committed: Range<u32>,
        objective_name: &str,
    ) -> Result<()> {
        let scenario = self.scenario;
        let tx = self.store.conn_mut().transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO OutputNetCapacity (scenario, region, period, tech, \
                vintage, capacity) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for ((region_id, period, tech_id, vintage), &capacity) in &solution.net_capacity {
                if committed.contains(period) && capacity > MIN_WRITTEN_VALUE {
                    insert.execute(params![
                        scenario, region_id, period, tech_id, vintage, capacity
                    ])?;
                }
            }

            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO OutputBuiltCapacity \
                (scenario, region, tech, vintage, capacity) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for ((region_id, tech_id, vintage), &capacity) in &solution.new_capacity {
                if committed.contains(vintage) && capacity > MIN_WRITTEN_VALUE {
                    insert.execute(params![scenario, region_id, tech_id, vintage, capacity])?;
                }
            }

            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO OutputFlowOut (scenario, region, period, input_comm, tech, \
                vintage, output_comm, flow) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for ((region_id, period, input, tech_id, vintage, output), &flow) in &solution.flow_out
            {
                if committed.contains(period) && flow > MIN_WRITTEN_VALUE {
                    insert.execute(params![
                        scenario, region_id, period, input, tech_id, vintage, output, flow
                    ])?;
                }
            }

            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO OutputCost (scenario, region, period, tech, vintage, \
                invest, fixed, var) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for ((region_id, period, tech_id, vintage), costs) in &solution.costs {
                let is_zero = [costs.invest, costs.fixed, costs.var]
                    .iter()
                    .all(|cost| cost.abs() < MIN_WRITTEN_VALUE);
                if committed.contains(period) && !is_zero {
                    insert.execute(params![
                        scenario,
                        region_id,
                        period,
                        tech_id,
                        vintage,
                        costs.invest,
                        costs.fixed,
                        costs.var
                    ])?;
                }
            }

            tx.execute(
                "DELETE FROM OutputObjective WHERE scenario = ?1 AND objective_name = ?2",
                params![scenario, objective_name],
            )?;
            tx.execute(
                "INSERT INTO OutputObjective (scenario, objective_name, base_year, \
                total_system_cost) VALUES (?1, ?2, ?3, ?4)",
                params![
                    scenario,
                    objective_name,
                    committed.start,
                    solution.objective_value
                ],
            )?;
        }
        tx.commit().context("Failed to write results")?;

        debug!(
            "Wrote results for periods {}..{} of scenario {scenario}",
            committed.start, committed.end
        );
        Ok(())
    }
}
