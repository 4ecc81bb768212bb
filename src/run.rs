//! Running a model in each of the supported modes.
use crate::config::{RunConfig, RunMode};
use crate::input::{HybridLoader, LoadOptions, LoadedData};
use crate::model::{LpBuilder, ModelBuilder, solve_optimal};
use crate::myopic::MyopicSequencer;
use crate::myopic::sequencer::SequencerOptions;
use crate::network::manager::CommodityNetworkManager;
use crate::output::graph::save_network_graphs;
use crate::output::metadata::write_metadata;
use crate::output::{ResultsWriter, clear_results};
use crate::price_check::check_prices;
use crate::store::Store;
use anyhow::{Context, Result};
use itertools::Itertools;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// The name the objective of a perfect-foresight run is recorded under
const OBJECTIVE_NAME: &str = "total_cost";

/// The subdirectory of the output directory which graphs are written to
const GRAPHS_DIR_NAME: &str = "graphs";

/// Run the model described by `config`.
///
/// # Arguments
///
/// * `config_path` - The path `config` was read from
/// * `config` - The run configuration
/// * `output_path` - The directory to write metadata, logs and graphs to
pub fn run(config_path: &Path, config: &RunConfig, output_path: &Path) -> Result<()> {
    write_metadata(output_path, config_path, &config.scenario, config.mode)
        .context("Failed to save metadata")?;

    match config.mode {
        RunMode::PerfectForesight => run_perfect_foresight(config, output_path),
        RunMode::Myopic => run_myopic(config, output_path),
        RunMode::Check => {
            let manager = run_check(config)?;
            if config.plot_commodity_network {
                save_graphs(&manager, &graphs_dir(output_path))?;
            }
            Ok(())
        }
    }
}

/// Solve the whole horizon at once
pub fn run_perfect_foresight(config: &RunConfig, output_path: &Path) -> Result<()> {
    let input = Store::open(&config.input_database)?;
    let loaded = HybridLoader::new(&input, load_options(config, config.filter_data()))
        .load(None)
        .context("Failed to load model data")?;
    check_loaded(config, &loaded, output_path)?;

    let data = &loaded.model_data;
    let mut builder = LpBuilder {
        time_limit_hours: config.time_limit_hours,
    };
    let mut model = builder.build(data)?;
    let solution = solve_optimal(model.as_mut()).context("Failed to solve model")?;
    info!("Model solved with total cost {}", solution.objective_value);

    // The horizon ends at the last future period, which is not itself modelled
    let (Some(&first), Some(&end)) = (data.future_periods.first(), data.future_periods.last())
    else {
        anyhow::bail!("No future periods were loaded");
    };

    let mut output = if config.output_database() == config.input_database {
        input.create_output_tables()?;
        input
    } else {
        Store::open_output(config.output_database())?
    };
    clear_results(&output, &config.scenario, first)?;
    ResultsWriter::new(&mut output, &config.scenario).write(solution, first..end, OBJECTIVE_NAME)?;
    info!("Results written to {}", config.output_database().display());

    Ok(())
}

/// Solve the horizon as a chain of windows
pub fn run_myopic(config: &RunConfig, output_path: &Path) -> Result<()> {
    let mut store = Store::open(&config.input_database)?;
    let builder = LpBuilder {
        time_limit_hours: config.time_limit_hours,
    };
    let options = SequencerOptions {
        scenario: config.scenario.clone(),
        network: config.network_options(),
        price_check: config.price_check,
        graphs_dir: config
            .plot_commodity_network
            .then(|| graphs_dir(output_path)),
        vacuum_interval: config.vacuum_interval,
    };

    MyopicSequencer::new(
        &mut store,
        builder,
        options,
        config.myopic.view_depth,
        config.myopic.step_size,
    )?
    .start()
}

/// Analyse the commodity network over the whole horizon without solving.
///
/// Orphans are logged. Unsupported demand, or any orphan in strict mode, is an error.
pub fn run_check(config: &RunConfig) -> Result<CommodityNetworkManager> {
    let store = Store::open(&config.input_database)?;
    let loaded = HybridLoader::new(&store, load_options(config, true))
        .load(None)
        .context("Commodity network check failed")?;

    if config.price_check {
        check_prices(&loaded.model_data);
    }

    let manager = loaded
        .network
        .context("Network analysis was not run")?;
    info!(
        "Commodity network check passed for periods {} with {} orphaned tech edges",
        manager.periods().iter().join(", "),
        manager.orphan_count()
    );
    Ok(manager)
}

/// Save graphs of the commodity network, creating `dir` if needed
pub fn save_graphs(manager: &CommodityNetworkManager, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let paths = save_network_graphs(manager, dir)?;
    info!("Saved {} network graphs to {}", paths.len(), dir.display());
    Ok(paths)
}

fn graphs_dir(output_path: &Path) -> PathBuf {
    output_path.join(GRAPHS_DIR_NAME)
}

fn load_options(config: &RunConfig, filter: bool) -> LoadOptions {
    LoadOptions {
        filter,
        scenario: config.scenario.clone(),
        network: config.network_options(),
    }
}

/// Optional checks on freshly loaded data
fn check_loaded(config: &RunConfig, loaded: &LoadedData, output_path: &Path) -> Result<()> {
    if config.price_check {
        check_prices(&loaded.model_data);
    }
    if config.plot_commodity_network {
        if let Some(manager) = &loaded.network {
            save_graphs(manager, &graphs_dir(output_path))?;
        } else {
            warn!("Commodity network graphs are only saved when source tracing is enabled");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MyopicConfig;
    use crate::fixture::SIMPLE_MODEL_SQL;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};
    use tempfile::{TempDir, tempdir};

    #[fixture]
    fn dir() -> TempDir {
        let dir = tempdir().unwrap();
        let store = Store::create(&dir.path().join("model.sqlite")).unwrap();
        store.conn().execute_batch(SIMPLE_MODEL_SQL).unwrap();
        dir
    }

    fn config(dir: &TempDir, mode: RunMode) -> RunConfig {
        RunConfig {
            scenario: "test".into(),
            input_database: dir.path().join("model.sqlite"),
            output_database: None,
            mode,
            source_trace: false,
            price_check: true,
            strict_network: false,
            fail_on_unsupported_demand: true,
            plot_commodity_network: false,
            time_limit_hours: None,
            myopic: MyopicConfig::default(),
            vacuum_interval: 1,
        }
    }

    fn built_capacity(path: &Path) -> Vec<(String, u32, f64)> {
        let store = Store::open(path).unwrap();
        let mut stmt = store
            .conn()
            .prepare(
                "SELECT tech, vintage, capacity FROM OutputBuiltCapacity \
                WHERE scenario = 'test' ORDER BY tech, vintage",
            )
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap()
    }

    #[rstest]
    fn perfect_foresight(dir: TempDir) {
        let config = config(&dir, RunMode::PerfectForesight);
        run(Path::new("config.toml"), &config, dir.path()).unwrap();

        assert!(dir.path().join("metadata.toml").is_file());
        let built = built_capacity(&config.input_database);
        let expected = [
            ("t1", 2020, 5.0),
            ("t1", 2030, 2.0),
            ("t1", 2040, 2.0),
            ("t2", 2020, 5.0),
            ("t2", 2030, 7.0),
            ("t2", 2040, 7.0),
        ];
        assert_eq!(built.len(), expected.len());
        for ((tech, vintage, capacity), (exp_tech, exp_vintage, exp_capacity)) in
            built.iter().zip(expected)
        {
            assert_eq!(tech, exp_tech);
            assert_eq!(*vintage, exp_vintage);
            assert_approx_eq!(f64, *capacity, exp_capacity, epsilon = 1e-6);
        }
    }

    #[rstest]
    fn separate_output_database(dir: TempDir) {
        let mut config = config(&dir, RunMode::PerfectForesight);
        config.output_database = Some(dir.path().join("results.sqlite"));
        run(Path::new("config.toml"), &config, dir.path()).unwrap();

        assert!(!built_capacity(config.output_database()).is_empty());
        let input = Store::open(&config.input_database).unwrap();
        assert!(!input.table_exists("OutputBuiltCapacity").unwrap());
    }

    #[rstest]
    fn check_mode_saves_graphs(dir: TempDir) {
        let mut config = config(&dir, RunMode::Check);
        config.plot_commodity_network = true;
        run(Path::new("config.toml"), &config, dir.path()).unwrap();

        assert!(dir.path().join("graphs").join("network_R1_2020.dot").is_file());
        let store = Store::open(&config.input_database).unwrap();
        assert!(!store.table_exists("OutputBuiltCapacity").unwrap());
    }

    #[rstest]
    fn check_finds_orphan(dir: TempDir) {
        let manager = run_check(&config(&dir, RunMode::Check)).unwrap();
        assert!(manager.orphan_count() > 0);
    }

    #[rstest]
    fn check_strict(dir: TempDir) {
        let mut config = config(&dir, RunMode::Check);
        config.strict_network = true;
        assert!(run_check(&config).is_err());
    }
}
