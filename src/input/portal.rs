//! An untyped container for loaded sets and parameters.
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use rusqlite::types::ValueRef;
use std::fmt::Display;
use std::sync::Arc;

/// One column of a set element or parameter index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// An integer, e.g. a period or vintage
    Int(i64),
    /// A name, e.g. of a region or commodity
    Text(Arc<str>),
}

impl Key {
    /// Convert a value read from the store
    pub fn from_sql(value: ValueRef<'_>) -> Result<Self> {
        match value {
            ValueRef::Integer(value) => Ok(Self::Int(value)),
            ValueRef::Text(text) => Ok(Self::Text(std::str::from_utf8(text)?.into())),
            ValueRef::Null => bail!("Index column is empty"),
            ValueRef::Real(value) => bail!("Index column holds a real number ({value})"),
            ValueRef::Blob(_) => bail!("Index column holds binary data"),
        }
    }

    /// The key as text
    pub fn as_text(&self) -> Result<&str> {
        match self {
            Self::Text(text) => Ok(text.as_ref()),
            Self::Int(value) => bail!("Expected a name but found {value}"),
        }
    }

    /// The key as a period
    pub fn as_period(&self) -> Result<u32> {
        match self {
            Self::Int(value) => {
                u32::try_from(*value).with_context(|| format!("{value} is not a valid period"))
            }
            Self::Text(text) => bail!("Expected a period but found '{text}'"),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// A set element or parameter index
pub type Row = Vec<Key>;

/// The data for one model set or parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// Elements of a set
    Set(Vec<Row>),
    /// Values of a parameter, by index
    Param(IndexMap<Row, f64>),
}

impl Loaded {
    /// The number of elements or values
    pub fn len(&self) -> usize {
        match self {
            Self::Set(rows) => rows.len(),
            Self::Param(values) => values.len(),
        }
    }

    /// Whether there are no elements or values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only the rows for which `keep` returns true
    pub fn retain<F>(&mut self, mut keep: F) -> Result<()>
    where
        F: FnMut(&Row) -> Result<bool>,
    {
        let mut result = Ok(());
        let mut check = |row: &Row| match keep(row) {
            Ok(keep) => keep,
            Err(err) => {
                if result.is_ok() {
                    result = Err(err);
                }
                false
            }
        };

        match self {
            Self::Set(rows) => rows.retain(|row| check(row)),
            Self::Param(values) => values.retain(|row, _| check(row)),
        }
        result
    }
}

/// Loaded sets and parameters, by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataPortal {
    items: IndexMap<&'static str, Loaded>,
}

impl DataPortal {
    /// Add a set or parameter
    pub fn insert(&mut self, name: &'static str, loaded: Loaded) {
        self.items.insert(name, loaded);
    }

    /// Get a set or parameter by name
    pub fn get(&self, name: &str) -> Result<&Loaded> {
        self.items
            .get(name)
            .with_context(|| format!("No data loaded for '{name}'"))
    }

    /// Get a set or parameter for modification
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Loaded> {
        self.items
            .get_mut(name)
            .with_context(|| format!("No data loaded for '{name}'"))
    }

    /// Get the elements of a set
    pub fn set(&self, name: &str) -> Result<&[Row]> {
        match self.get(name)? {
            Loaded::Set(rows) => Ok(rows),
            Loaded::Param(_) => bail!("'{name}' is a parameter, not a set"),
        }
    }

    /// Get the values of a parameter
    pub fn param(&self, name: &str) -> Result<&IndexMap<Row, f64>> {
        match self.get(name)? {
            Loaded::Param(values) => Ok(values),
            Loaded::Set(_) => bail!("'{name}' is a set, not a parameter"),
        }
    }

    /// Iterate over everything loaded
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Loaded)> {
        self.items.iter().map(|(name, loaded)| (*name, loaded))
    }
}
