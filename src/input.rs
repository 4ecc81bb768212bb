//! Common routines for loading model input.
//!
//! Every set and parameter the model needs is pulled from the store as described by
//! [`LOAD_SPECS`]. When filtering is enabled, the commodity network is analysed first and rows
//! for technologies which can never contribute to meeting demand are dropped before the typed
//! [`ModelData`] is built.
use crate::myopic::MyopicIndex;
use crate::network::manager::{CommodityNetworkManager, NetworkOptions, ViableSets};
use crate::period::PeriodFlag;
use crate::store::Store;
use anyhow::{Context, Result, bail};
use itertools::Itertools;
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod model_data;
pub use model_data::ModelData;
pub mod portal;
use portal::{DataPortal, Key, Loaded, Row};
pub mod specs;
use specs::{LOAD_SPECS, LoadKind, LoadSpec, PeriodFilter, Source};

/// Read a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Options controlling how data is loaded
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Drop rows for technologies which fail the commodity network analysis
    pub filter: bool,
    /// The scenario whose committed capacity is carried into later windows
    pub scenario: String,
    /// How the network analysis treats orphans and unsupported demand
    pub network: NetworkOptions,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            filter: false,
            scenario: "default".into(),
            network: NetworkOptions::default(),
        }
    }
}

/// Everything produced by one load
#[derive(Debug)]
pub struct LoadedData {
    /// The sets and parameters, after filtering
    pub portal: DataPortal,
    /// Typed model data built from `portal`
    pub model_data: ModelData,
    /// The network analysis, if filtering was enabled
    pub network: Option<CommodityNetworkManager>,
}

/// Loads model data from the store, optionally filtering it by the commodity network
pub struct HybridLoader<'a> {
    store: &'a Store,
    options: LoadOptions,
}

impl<'a> HybridLoader<'a> {
    /// Create a loader reading from `store`
    pub fn new(store: &'a Store, options: LoadOptions) -> Self {
        Self { store, options }
    }

    /// Load data for the whole horizon, or for a single myopic window
    pub fn load(&self, window: Option<&MyopicIndex>) -> Result<LoadedData> {
        let mut portal = self.fetch_all(window)?;

        let network = if self.options.filter {
            let unfiltered = ModelData::from_portal(&portal)?;
            let mut manager = CommodityNetworkManager::new(
                unfiltered.model_periods(),
                unfiltered.network_data()?,
                self.options.network,
            );
            manager.analyze_network()?;
            apply_filters(&mut portal, &manager.build_filters())?;
            Some(manager)
        } else {
            None
        };

        let model_data = ModelData::from_portal(&portal)?;
        info!(
            "Loaded {} processes in {} regions for periods {}",
            model_data.efficiencies.len(),
            model_data.regions.len(),
            model_data.model_periods().iter().join(", ")
        );

        Ok(LoadedData {
            portal,
            model_data,
            network,
        })
    }

    fn fetch_all(&self, window: Option<&MyopicIndex>) -> Result<DataPortal> {
        let mut portal = DataPortal::default();
        for spec in &LOAD_SPECS {
            let loaded = self
                .fetch(spec, window)
                .with_context(|| format!("Failed to load '{}'", spec.name))?;
            debug!("Loaded {} rows for '{}'", loaded.len(), spec.name);
            portal.insert(spec.name, loaded);
        }
        Ok(portal)
    }

    /// Pull the rows for one set or parameter
    fn fetch(&self, spec: &LoadSpec, window: Option<&MyopicIndex>) -> Result<Loaded> {
        let Some((sql, params)) = self.query(spec, window)? else {
            return Ok(match spec.kind {
                LoadKind::Set => Loaded::Set(Vec::new()),
                LoadKind::Param => Loaded::Param(Default::default()),
            });
        };

        let mut stmt = self.store.conn().prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let width = spec.columns.len();
        let mut loaded = match spec.kind {
            LoadKind::Set => Loaded::Set(Vec::new()),
            LoadKind::Param => Loaded::Param(Default::default()),
        };

        while let Some(row) = rows.next()? {
            let key_width = match spec.kind {
                LoadKind::Set => width,
                LoadKind::Param => width - 1,
            };
            let key = (0..key_width)
                .map(|idx| Key::from_sql(row.get_ref(idx)?))
                .collect::<Result<Row>>()?;

            match &mut loaded {
                Loaded::Set(rows) => rows.push(key),
                Loaded::Param(values) => {
                    let value: f64 = row.get(key_width)?;
                    values.insert(key, value);
                }
            }
        }

        Ok(loaded)
    }

    /// Build the query for a pull, or `None` if an optional table is absent
    fn query(
        &self,
        spec: &LoadSpec,
        window: Option<&MyopicIndex>,
    ) -> Result<Option<(String, Vec<String>)>> {
        let columns = spec.columns.join(", ");
        let filter = spec
            .time
            .map(|(column, filter)| period_condition(column, filter, window));

        let plain = |table: &str| -> Result<Option<(String, Vec<String>)>> {
            if !self.table_present(table, spec.optional)? {
                return Ok(None);
            }
            let sql = match &filter {
                Some(filter) => format!("SELECT {columns} FROM {table} WHERE {filter}"),
                None => format!("SELECT {columns} FROM {table}"),
            };
            Ok(Some((sql, Vec::new())))
        };

        match (spec.source, window) {
            (Source::Table(table), _) => plain(table),
            (Source::ExistingCapacity, None) => plain("ExistingCapacity"),
            (Source::Efficiency, None) => plain("Efficiency"),
            (Source::Efficiency, Some(_)) => {
                if !self.store.table_exists("MyopicEfficiency")? {
                    bail!("MyopicEfficiency must be seeded before a myopic window is loaded");
                }
                Ok(Some((
                    format!("SELECT {columns} FROM MyopicEfficiency"),
                    Vec::new(),
                )))
            }
            (Source::ExistingCapacity, Some(window)) => {
                Ok(self.existing_capacity_query(&columns, window.base_year())?)
            }
        }
    }

    /// Capacity committed for the period before the window, plus original capacity which was not
    /// carried into that period
    fn existing_capacity_query(
        &self,
        columns: &str,
        base_year: u32,
    ) -> Result<Option<(String, Vec<String>)>> {
        let has_committed = self.store.table_exists("OutputNetCapacity")?;
        let has_original = self.store.table_exists("ExistingCapacity")?;

        let previous_period =
            format!("(SELECT MAX(period) FROM TimePeriod WHERE period < {base_year})");
        let committed = format!(
            "SELECT {columns} FROM OutputNetCapacity \
            WHERE scenario = ?1 AND vintage < {base_year} AND period = {previous_period}"
        );
        let not_committed = format!(
            "NOT EXISTS (SELECT 1 FROM OutputNetCapacity AS c \
            WHERE c.scenario = ?1 AND c.period = {previous_period} AND c.region = e.region \
            AND c.tech = e.tech AND c.vintage = e.vintage)"
        );
        let original = |extra: &str| {
            format!(
                "SELECT {} FROM ExistingCapacity AS e WHERE e.vintage < {base_year}{extra}",
                prefixed(columns, "e")
            )
        };

        let sql = match (has_committed, has_original) {
            (true, true) => format!(
                "{committed} UNION ALL {}",
                original(&format!(" AND {not_committed}"))
            ),
            (true, false) => committed,
            (false, true) => {
                return Ok(Some((original(""), Vec::new())));
            }
            (false, false) => return Ok(None),
        };

        Ok(Some((sql, vec![self.options.scenario.clone()])))
    }

    /// Whether a table is present, failing if it is missing but mandatory
    fn table_present(&self, table: &str, optional: bool) -> Result<bool> {
        let exists = self.store.table_exists(table)?;
        if !exists && !optional {
            bail!("Mandatory table {table} is missing from the database");
        }
        Ok(exists)
    }
}

/// Prefix each of a comma-separated list of columns with a table alias
fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(", ")
        .map(|column| format!("{alias}.{column}"))
        .join(", ")
}

/// SQL bounding a period-indexed column.
///
/// Without a window, periods are chosen by their flag. With one, they are bounded by its years.
fn period_condition(column: &str, filter: PeriodFilter, window: Option<&MyopicIndex>) -> String {
    let flagged = |flag: PeriodFlag| format!("SELECT period FROM TimePeriod WHERE flag = '{flag}'");

    match (filter, window) {
        (PeriodFilter::Existing, None) => {
            format!("{column} IN ({})", flagged(PeriodFlag::Existing))
        }
        (PeriodFilter::Future, None) => format!("{column} IN ({})", flagged(PeriodFlag::Future)),
        (PeriodFilter::Demand, None) => format!(
            "{column} IN ({flagged}) AND {column} < (SELECT MAX(period) FROM ({flagged}))",
            flagged = flagged(PeriodFlag::Future)
        ),
        (PeriodFilter::Existing, Some(window)) => format!("{column} < {}", window.base_year()),
        (PeriodFilter::Future, Some(window)) => format!(
            "{column} >= {} AND {column} <= {}",
            window.base_year(),
            window.last_year()
        ),
        (PeriodFilter::Demand, Some(window)) => format!(
            "{column} >= {} AND {column} <= {}",
            window.base_year(),
            window.last_demand_year()
        ),
    }
}

/// Drop rows which are not in the viable sets, for every pull which is validated
pub fn apply_filters(portal: &mut DataPortal, sets: &ViableSets) -> Result<()> {
    for spec in &LOAD_SPECS {
        let Some(validation) = &spec.validation else {
            continue;
        };
        let columns = validation.key_columns(spec.name)?;
        let loaded = portal.get_mut(spec.name)?;
        let before = loaded.len();
        loaded
            .retain(|row| validation.is_viable(sets, &columns, row))
            .with_context(|| format!("Failed to filter '{}'", spec.name))?;

        let removed = before - loaded.len();
        if removed > 0 {
            debug!("Filtered {removed} rows from '{}'", spec.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, output_store, store};
    use crate::myopic::efficiency;
    use rstest::rstest;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        a: u32,
        b: String,
    }

    #[test]
    fn read_toml_valid() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = fs::File::create(&file_path).unwrap();
            writeln!(file, "a = 1\nb = \"hello\"").unwrap();
        }

        assert_eq!(
            read_toml::<Record>(&file_path).unwrap(),
            Record {
                a: 1,
                b: "hello".into()
            }
        );
    }

    #[test]
    fn read_toml_missing_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("missing.toml");
        assert_error!(read_toml::<Record>(&file_path), input_err_msg(&file_path));
    }

    fn window(base: u32, step: u32, last_demand: u32, last: u32) -> MyopicIndex {
        MyopicIndex::new(base, step, last_demand, last).unwrap()
    }

    #[rstest]
    fn unfiltered_keeps_orphans(store: Store) {
        let loaded = HybridLoader::new(&store, LoadOptions::default())
            .load(None)
            .unwrap();
        assert!(loaded.network.is_none());
        assert!(
            loaded
                .model_data
                .efficiencies
                .iter()
                .any(|row| row.tech_id == "t3".into())
        );
    }

    #[rstest]
    fn filtered_drops_orphans(store: Store) {
        let options = LoadOptions {
            filter: true,
            ..Default::default()
        };
        let loaded = HybridLoader::new(&store, options).load(None).unwrap();
        let data = &loaded.model_data;

        assert!(data.efficiencies.iter().all(|row| row.tech_id != "t3".into()));
        assert!(!data.technologies.contains("t3"));
        assert!(
            data.cost_invest
                .keys()
                .all(|(_, tech_id, _)| *tech_id != "t3".into())
        );
        assert_eq!(loaded.network.unwrap().orphan_count(), 3);
    }

    #[rstest]
    fn perfect_foresight_periods(store: Store) {
        let loaded = HybridLoader::new(&store, LoadOptions::default())
            .load(None)
            .unwrap();
        let data = &loaded.model_data;

        // The last period only marks the end of the horizon
        assert!(data.demands.keys().all(|(_, period, _)| *period < 2050));
        assert!(
            data.cost_invest
                .keys()
                .all(|(_, _, vintage)| (2020..2050).contains(vintage))
        );
    }

    #[rstest]
    fn missing_optional_table(store: Store) {
        store.conn().execute_batch("DROP TABLE CostFixed;").unwrap();
        let loaded = HybridLoader::new(&store, LoadOptions::default())
            .load(None)
            .unwrap();
        assert!(loaded.model_data.cost_fixed.is_empty());
    }

    #[rstest]
    fn missing_mandatory_table(store: Store) {
        // Efficiency refers to Technology
        store
            .conn()
            .execute_batch("PRAGMA foreign_keys = OFF; DROP TABLE Technology;")
            .unwrap();
        assert_error!(
            HybridLoader::new(&store, LoadOptions::default()).load(None),
            "Failed to load 'technologies'"
        );
    }

    #[rstest]
    fn window_needs_seeded_view(store: Store) {
        assert_error!(
            HybridLoader::new(&store, LoadOptions::default())
                .load(Some(&window(2020, 2030, 2030, 2040))),
            "Failed to load 'efficiency'"
        );
    }

    #[rstest]
    fn window_bounds_periods(mut output_store: Store) {
        let window = window(2030, 2040, 2040, 2050);
        efficiency::seed(&mut output_store).unwrap();
        efficiency::update(&mut output_store, &window, 2030, "default").unwrap();

        let loaded = HybridLoader::new(&output_store, LoadOptions::default())
            .load(Some(&window))
            .unwrap();
        let data = &loaded.model_data;
        assert_eq!(data.existing_periods, [2010, 2020]);
        assert_eq!(data.future_periods, [2030, 2040, 2050]);
        assert_eq!(
            data.demands.keys().map(|(_, period, _)| *period).collect_vec(),
            [2030, 2040]
        );
    }

    #[rstest]
    fn window_existing_capacity_uses_committed(mut output_store: Store) {
        let window = window(2030, 2040, 2040, 2050);
        efficiency::seed(&mut output_store).unwrap();
        output_store
            .conn()
            .execute_batch(
                "INSERT INTO OutputNetCapacity VALUES
                    ('default', 'R1', 2020, 't1', 2010, 4.0),
                    ('default', 'R1', 2020, 't1', 2020, 3.0),
                    ('other', 'R1', 2020, 't1', 2020, 99.0);",
            )
            .unwrap();
        efficiency::update(&mut output_store, &window, 2020, "default").unwrap();

        let loaded = HybridLoader::new(&output_store, LoadOptions::default())
            .load(Some(&window))
            .unwrap();
        let capacity = &loaded.model_data.existing_capacity;

        // Committed capacity replaces the original value; t2 2010 was never committed
        assert_eq!(capacity.len(), 3);
        assert_eq!(capacity[&("R1".into(), "t1".into(), 2010)], 4.0);
        assert_eq!(capacity[&("R1".into(), "t1".into(), 2020)], 3.0);
        assert_eq!(capacity[&("R1".into(), "t2".into(), 2010)], 5.0);
    }

    #[rstest]
    fn rolled_back_window_ignores_later_commitments(mut output_store: Store) {
        efficiency::seed(&mut output_store).unwrap();
        output_store
            .conn()
            .execute(
                "INSERT INTO OutputNetCapacity VALUES ('default', 'R1', 2020, 't1', 2010, 4.0)",
                [],
            )
            .unwrap();
        let window = window(2020, 2040, 2040, 2050);
        efficiency::update(&mut output_store, &window, 2030, "default").unwrap();

        let loaded = HybridLoader::new(&output_store, LoadOptions::default())
            .load(Some(&window))
            .unwrap();
        let capacity = &loaded.model_data.existing_capacity;
        assert_eq!(capacity.len(), 2);
        assert_eq!(capacity[&("R1".into(), "t1".into(), 2010)], 5.0);
    }

    #[rstest]
    #[case(
        PeriodFilter::Existing,
        None,
        "period IN (SELECT period FROM TimePeriod WHERE flag = 'e')"
    )]
    #[case(
        PeriodFilter::Demand,
        Some(window(2020, 2030, 2030, 2040)),
        "period >= 2020 AND period <= 2030"
    )]
    #[case(PeriodFilter::Existing, Some(window(2020, 2030, 2030, 2040)), "period < 2020")]
    fn period_conditions(
        #[case] filter: PeriodFilter,
        #[case] window: Option<MyopicIndex>,
        #[case] expected: &str,
    ) {
        assert_eq!(period_condition("period", filter, window.as_ref()), expected);
    }

    #[test]
    fn prefix_columns() {
        assert_eq!(prefixed("region, tech", "e"), "e.region, e.tech");
    }
}
