//! Access to the persisted relational store.
//!
//! All model input is read from, and all results written to, a single SQLite database. There is
//! exactly one writer (the running program), so we rely on SQLite's own transactions for
//! read-after-write ordering and don't add any locking of our own.
use crate::commodity::{CommodityFlag, CommodityID};
use crate::period::PeriodFlag;
use crate::technology::LifetimeLookup;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// SQL for creating the input tables
const INPUT_SCHEMA: &str = include_str!("store/schema.sql");

/// SQL for creating the tables the program writes to
const DERIVED_SCHEMA: &str = include_str!("store/derived.sql");

/// Tables derived during a myopic run, which are rebuilt at the start of every run
const MYOPIC_TABLES: [&str; 1] = ["MyopicEfficiency"];

/// A connection to the persisted store
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open an existing store.
    ///
    /// We refuse to create a new database here, as a missing file almost certainly means the user
    /// has given the wrong path.
    pub fn open(path: &Path) -> Result<Self> {
        anyhow::ensure!(path.is_file(), "Database {} does not exist", path.display());
        let conn = Connection::open(path)
            .with_context(|| format!("Could not open database {}", path.display()))?;
        conn.pragma_update(None, "foreign_keys", "OFF")?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Create a store, including empty input tables, at the given path
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Could not create database {}", path.display()))?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.create_input_tables()?;
        Ok(store)
    }

    /// Open a store for writing results to, creating it if needed.
    ///
    /// Only the output tables are created.
    pub fn open_output(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Could not open output database {}", path.display()))?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.create_output_tables()?;
        Ok(store)
    }

    /// Create an in-memory store with empty input tables
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.create_input_tables()?;
        Ok(store)
    }

    /// The path of the database file, if it is not an in-memory store
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// The underlying connection, for opening transactions
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Create the input tables if they are missing
    pub fn create_input_tables(&self) -> Result<()> {
        self.conn
            .execute_batch(INPUT_SCHEMA)
            .context("Failed to create input tables")
    }

    /// Create the output and derived tables if they are missing
    pub fn create_output_tables(&self) -> Result<()> {
        self.conn
            .execute_batch(DERIVED_SCHEMA)
            .context("Failed to create output tables")
    }

    /// Drop and recreate the tables derived during a myopic run
    pub fn reset_myopic_tables(&self) -> Result<()> {
        for table in MYOPIC_TABLES {
            self.conn.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;
        }
        self.create_output_tables()
    }

    /// Whether the named table is present in the schema
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Compact the database file.
    ///
    /// Repeatedly deleting and inserting rows in the derived tables makes the file grow.
    pub fn vacuum(&self) -> Result<()> {
        debug!("Compacting database");
        self.conn.execute_batch("VACUUM;").context("Failed to compact database")
    }

    /// Read periods with the given flag, in ascending order
    pub fn read_periods(&self, flag: PeriodFlag) -> Result<Vec<u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT period FROM TimePeriod WHERE flag = ?1 ORDER BY period")?;
        let periods = stmt
            .query_map([flag.to_string()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<u32>>>()
            .context("Failed to read TimePeriod")?;
        Ok(periods)
    }

    /// Read all commodities along with their flags
    pub fn read_commodities(&self) -> Result<IndexMap<CommodityID, CommodityFlag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, flag FROM Commodity ORDER BY name")?;
        let mut rows = stmt.query([])?;
        let mut commodities = IndexMap::new();
        while let Some(row) = rows.next()? {
            let id: CommodityID = row.get(0)?;
            let flag: String = row.get(1)?;
            let flag = CommodityFlag::from_str(flag.trim())
                .with_context(|| format!("Invalid flag '{flag}' for commodity {id}"))?;
            commodities.insert(id, flag);
        }
        Ok(commodities)
    }

    /// Read the lifetime tables, either of which may be absent
    pub fn read_lifetimes(&self) -> Result<LifetimeLookup> {
        let mut lifetimes = LifetimeLookup::default();
        if self.table_exists("LifetimeProcess")? {
            let mut stmt = self
                .conn
                .prepare("SELECT region, tech, vintage, lifetime FROM LifetimeProcess")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                lifetimes
                    .process
                    .insert((row.get(0)?, row.get(1)?, row.get(2)?), row.get(3)?);
            }
        }
        if self.table_exists("LifetimeTech")? {
            let mut stmt = self
                .conn
                .prepare("SELECT region, tech, lifetime FROM LifetimeTech")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                lifetimes.tech.insert((row.get(0)?, row.get(1)?), row.get(2)?);
            }
        }
        Ok(lifetimes)
    }

    /// Count the rows in a table
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), params![], |row| {
                row.get(0)
            })?;
        Ok(usize::try_from(count)?)
    }
}
