//! Maintenance of the `MyopicEfficiency` table.
//!
//! In myopic mode, efficiencies are never read from `Efficiency` directly. Instead we keep a view
//! of the processes which are relevant to the current window: those which existed before the
//! horizon, those built by earlier windows and those which could be built in this one.
use super::MyopicIndex;
use crate::network::EfficiencyRow;
use crate::period::PeriodFlag;
use crate::store::Store;
use anyhow::{Context, Result};
use log::debug;
use rusqlite::params;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// Value of `base_year` for processes which existed before the horizon
const EXISTING_BASE_YEAR: i64 = -1;

/// Which window first added a row to the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntroducedIn {
    /// The process existed before the modelled horizon
    Existing,
    /// Added by the window with the given base year
    Window(u32),
}

impl ToSql for IntroducedIn {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Existing => EXISTING_BASE_YEAR.into(),
            Self::Window(year) => i64::from(*year).into(),
        })
    }
}

impl FromSql for IntroducedIn {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            EXISTING_BASE_YEAR => Ok(Self::Existing),
            year => u32::try_from(year)
                .map(Self::Window)
                .map_err(|err| rusqlite::types::FromSqlError::Other(Box::new(err))),
        }
    }
}

/// One row of the view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    /// When the row was added
    pub introduced_in: IntroducedIn,
    /// The process, with its lifetime
    pub efficiency: EfficiencyRow,
}

/// Insert rows from `Efficiency` into the view, with lifetimes resolved
fn insert_rows(
    store: &mut Store,
    introduced_in: IntroducedIn,
    condition: &str,
    condition_params: &[&dyn ToSql],
) -> Result<usize> {
    let lifetimes = store.read_lifetimes()?;
    let tx = store.conn_mut().transaction()?;
    let mut count = 0;
    {
        let mut select = tx.prepare(&format!(
            "SELECT region, input_comm, tech, vintage, output_comm, efficiency FROM Efficiency \
            WHERE {condition}"
        ))?;
        let mut insert = tx.prepare(
            "INSERT INTO MyopicEfficiency (base_year, region, input_comm, tech, vintage, \
            output_comm, efficiency, lifetime) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        let mut rows = select.query(condition_params)?;
        while let Some(row) = rows.next()? {
            let region_id = row.get(0)?;
            let tech_id = row.get(2)?;
            let vintage: u32 = row.get(3)?;
            let lifetime = lifetimes.get(&region_id, &tech_id, vintage);
            insert.execute(params![
                introduced_in,
                region_id,
                row.get::<_, String>(1)?,
                tech_id,
                vintage,
                row.get::<_, String>(4)?,
                row.get::<_, f64>(5)?,
                lifetime
            ])?;
            count += 1;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Rebuild the view with only the processes which existed before the horizon
pub fn seed(store: &mut Store) -> Result<()> {
    store.reset_myopic_tables()?;
    let count = insert_rows(
        store,
        IntroducedIn::Existing,
        "vintage IN (SELECT period FROM TimePeriod WHERE flag = ?1)",
        &[&PeriodFlag::Existing.to_string()],
    )
    .context("Failed to seed MyopicEfficiency")?;
    debug!("Seeded MyopicEfficiency with {count} existing processes");

    Ok(())
}

/// Bring the view up to date for a new window.
///
/// Each step is committed before the next one runs, as later steps read what earlier ones wrote.
///
/// # Arguments
///
/// * `store` - The store
/// * `window` - The window about to be solved
/// * `previous_base_year` - The base year of the last window which was solved successfully
/// * `scenario` - The scenario whose committed capacity decides what is kept
pub fn update(
    store: &mut Store,
    window: &MyopicIndex,
    previous_base_year: u32,
    scenario: &str,
) -> Result<()> {
    let base_year = window.base_year();

    // Anything added by an attempt at this or a later window is stale
    let removed = store
        .conn()
        .execute(
            "DELETE FROM MyopicEfficiency WHERE vintage >= ?1",
            [base_year],
        )
        .context("Failed to clear superseded rows from MyopicEfficiency")?;
    debug!("Removed {removed} superseded rows from MyopicEfficiency");

    // Processes offered by the previous window but never built
    let removed = store
        .conn()
        .execute(
            "DELETE FROM MyopicEfficiency AS m
            WHERE m.vintage >= ?1
              AND NOT EXISTS (SELECT 1
                              FROM OutputNetCapacity AS c
                              WHERE c.scenario = ?2
                                AND c.region = m.region
                                AND c.tech = m.tech
                                AND c.vintage = m.vintage)",
            params![previous_base_year, scenario],
        )
        .context("Failed to clear unbuilt rows from MyopicEfficiency")?;
    debug!("Removed {removed} unbuilt processes from MyopicEfficiency");

    let added = insert_rows(
        store,
        IntroducedIn::Window(base_year),
        "vintage >= ?1 AND vintage <= ?2",
        &[&base_year, &window.last_demand_year()],
    )
    .context("Failed to add new processes to MyopicEfficiency")?;
    debug!("Added {added} new processes to MyopicEfficiency for window {window}");

    Ok(())
}

/// Read the whole view
pub fn read_view(store: &Store) -> Result<Vec<ViewRow>> {
    let mut stmt = store.conn().prepare(
        "SELECT base_year, region, input_comm, tech, vintage, output_comm, efficiency, lifetime \
        FROM MyopicEfficiency ORDER BY region, tech, vintage, input_comm, output_comm",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ViewRow {
                introduced_in: row.get(0)?,
                efficiency: EfficiencyRow {
                    region_id: row.get(1)?,
                    input: row.get(2)?,
                    tech_id: row.get(3)?,
                    vintage: row.get(4)?,
                    output: row.get(5)?,
                    efficiency: row.get(6)?,
                    lifetime: row.get(7)?,
                },
            })
        })?
        .collect::<rusqlite::Result<_>>()?;
    Ok(rows)
}
