//! Code for handling IDs
use anyhow::{Context, Result};
use indexmap::IndexSet;
use std::borrow::Borrow;
use std::hash::Hash;

/// A trait alias for ID types
pub trait IDLike: Eq + Hash + Borrow<str> + Clone + std::fmt::Display + for<'a> From<&'a str> {}
impl<T> IDLike for T where
    T: Eq + Hash + Borrow<str> + Clone + std::fmt::Display + for<'a> From<&'a str>
{
}

/// Define a string-backed ID type which can be stored in and read from the database
macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone, std::hash::Hash, PartialEq, Eq, PartialOrd, Ord, Debug, serde::Serialize,
        )]
        /// An identifier
        pub struct $name(pub std::sync::Arc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::sync::Arc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::sync::Arc::from(s))
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let id: String = serde::Deserialize::deserialize(deserializer)?;
                let id = id.trim();
                if id.is_empty() {
                    return Err(serde::de::Error::custom("IDs cannot be empty"));
                }

                Ok(id.into())
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::Borrowed(
                    rusqlite::types::ValueRef::Text(self.0.as_bytes()),
                ))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value.as_str().map(|s| s.trim().into())
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                id.into()
            }

            /// Get the ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}
pub(crate) use define_id_type;

/// A data structure containing a set of IDs
pub trait IDCollection<ID: IDLike> {
    /// Check if the ID is in the collection, returning a copy of it if found.
    fn get_id(&self, id: &str) -> Result<&ID>;
}

impl<ID: IDLike> IDCollection<ID> for IndexSet<ID> {
    fn get_id(&self, id: &str) -> Result<&ID> {
        self.get(id)
            .with_context(|| format!("Unknown ID {id} found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    define_id_type! {GenericID}

    #[rstest]
    #[case("ELC", "ELC")]
    #[case("  ELC ", "ELC")]
    fn deserialise_id_trims(#[case] input: &str, #[case] expected: &str) {
        let id: GenericID = toml::Value::String(input.into()).try_into().unwrap();
        assert_eq!(id.as_str(), expected);
    }

    #[test]
    fn deserialise_empty_id_fails() {
        let result: Result<GenericID, _> = toml::Value::String(" ".into()).try_into();
        assert!(result.is_err());
    }

    #[test]
    fn get_id_from_collection() {
        let ids: IndexSet<GenericID> = ["a".into(), "b".into()].into_iter().collect();
        assert_eq!(ids.get_id("b").unwrap(), &GenericID::new("b"));
        assert_error!(ids.get_id("c"), "Unknown ID c found");
    }
}
