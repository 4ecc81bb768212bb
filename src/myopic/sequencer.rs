//! Steps through the windows of a myopic run.
use super::{MyopicIndex, build_windows, efficiency};
use crate::input::{HybridLoader, LoadOptions};
use crate::model::{ModelBuilder, ModelError, solve_optimal};
use crate::network::manager::NetworkOptions;
use crate::output::graph::save_network_graphs;
use crate::output::{ResultsWriter, clear_results};
use crate::period::PeriodFlag;
use crate::price_check::check_prices;
use crate::store::Store;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

/// Options for a myopic run
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerOptions {
    /// The scenario results are written under
    pub scenario: String,
    /// How the network analysis treats orphans and unsupported demand
    pub network: NetworkOptions,
    /// Whether to check cost data for every window
    pub price_check: bool,
    /// Where to write commodity network graphs for every window, if anywhere
    pub graphs_dir: Option<PathBuf>,
    /// Compact the store after this many committed windows
    pub vacuum_interval: usize,
}

/// Where the sequencer is up to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SequencerState {
    /// No window has been attempted yet
    Start,
    /// The last window was solved and its results committed
    Optimal,
    /// The given window could not be solved and must be retried from an earlier base year
    RollBack(MyopicIndex),
}

/// Solves a myopic run one window at a time
pub struct MyopicSequencer<'a, B: ModelBuilder> {
    store: &'a mut Store,
    builder: B,
    options: SequencerOptions,
    periods: Vec<u32>,
    windows: VecDeque<MyopicIndex>,
    committed_windows: usize,
}

impl<'a, B: ModelBuilder> MyopicSequencer<'a, B> {
    /// Prepare a myopic run, seeding the efficiency view.
    ///
    /// # Arguments
    ///
    /// * `store` - The store, which is both read from and written to
    /// * `builder` - Builds a model for each window
    /// * `options` - Options for the run
    /// * `view_depth` - The number of periods visible in each window
    /// * `step_size` - The number of periods committed by each window
    pub fn new(
        store: &'a mut Store,
        builder: B,
        options: SequencerOptions,
        view_depth: usize,
        step_size: usize,
    ) -> Result<Self> {
        let periods = store.read_periods(PeriodFlag::Future)?;
        let windows = build_windows(&periods, view_depth, step_size)?;
        debug!("Myopic run has {} windows", windows.len());

        store.create_output_tables()?;
        efficiency::seed(store)?;

        Ok(Self {
            store,
            builder,
            options,
            periods,
            windows,
            committed_windows: 0,
        })
    }

    /// Solve every window in turn, committing results as we go.
    ///
    /// A window which can't be solved to optimality is retried with an earlier base year. If the
    /// first window can't be solved, the run fails.
    pub fn start(&mut self) -> Result<()> {
        let mut state = SequencerState::Start;
        let mut previous_base_year = 0;

        loop {
            let window = match state {
                SequencerState::Start => {
                    let window = self
                        .windows
                        .pop_front()
                        .context("A myopic run needs at least one window")?;
                    previous_base_year = window.base_year();
                    window
                }
                SequencerState::Optimal => match self.windows.pop_front() {
                    Some(window) => window,
                    None => break,
                },
                SequencerState::RollBack(failed) => {
                    let window = failed.rolled_back(&self.periods)?;
                    info!("Retrying {failed} as {window}");
                    window
                }
            };

            info!("Solving myopic window {window}");
            if self.solve_window(&window, previous_base_year)? {
                previous_base_year = window.base_year();
                state = SequencerState::Optimal;
                self.after_commit()?;
            } else {
                state = SequencerState::RollBack(window);
            }
        }

        info!("Myopic run complete");
        Ok(())
    }

    /// Load, build and solve one window, committing its results if it is solved.
    ///
    /// Returns whether the window was solved to optimality.
    fn solve_window(&mut self, window: &MyopicIndex, previous_base_year: u32) -> Result<bool> {
        let scenario = self.options.scenario.as_str();
        let base_year = window.base_year();

        efficiency::update(self.store, window, previous_base_year, scenario)?;

        let load_options = LoadOptions {
            filter: true,
            scenario: scenario.to_string(),
            network: self.options.network,
        };
        let loaded = HybridLoader::new(self.store, load_options)
            .load(Some(window))
            .with_context(|| format!("Failed to load data for window {window}"))?;

        if self.options.price_check {
            check_prices(&loaded.model_data);
        }
        if let (Some(dir), Some(network)) = (&self.options.graphs_dir, &loaded.network) {
            let dir = dir.join(format!("window_{base_year}"));
            fs::create_dir_all(&dir)?;
            save_network_graphs(network, &dir)?;
        }

        let mut model = self.builder.build(&loaded.model_data)?;
        let solution = match solve_optimal(model.as_mut()) {
            Ok(solution) => solution,
            Err(ModelError::NonOptimal(status)) => {
                warn!("Window {window} could not be solved ({status}); rolling back");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        // Results from a superseded attempt may be left over
        clear_results(self.store, scenario, base_year)?;
        ResultsWriter::new(self.store, scenario).write(
            solution,
            base_year..window.step_year(),
            &format!("total_cost_{base_year}"),
        )?;
        info!(
            "Window {window} solved with total cost {}",
            solution.objective_value
        );

        Ok(true)
    }

    fn after_commit(&mut self) -> Result<()> {
        self.committed_windows += 1;
        if self.committed_windows % self.options.vacuum_interval == 0 {
            self.store.vacuum()?;
        }
        Ok(())
    }
}
