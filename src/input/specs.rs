//! The sets and parameters pulled from the store.
use super::portal::Key;
use crate::commodity::CommodityID;
use crate::network::manager::ViableSets;
use crate::region::RegionID;
use crate::technology::TechID;
use anyhow::{Result, ensure};
use strum::Display;

/// Whether a pull produces a set or a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    /// Every column is part of the set element
    Set,
    /// The last column is the value, the others are its index
    Param,
}

/// Where the rows for a pull come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A table which is read the same way in every mode
    Table(&'static str),
    /// `Efficiency`, or the `MyopicEfficiency` view when running a window
    Efficiency,
    /// `ExistingCapacity`, plus capacity committed by earlier windows when running a window
    ExistingCapacity,
}

/// How a period-indexed column is bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodFilter {
    /// Periods before the modelled horizon
    Existing,
    /// Periods of the modelled horizon, including the final boundary
    Future,
    /// Periods which have demand
    Demand,
}

/// The viable sets rows can be checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ViableSet {
    /// `(region, input, tech, vintage, output)`
    Ritvo,
    /// `(region, tech, vintage)`
    Rtv,
    /// `(region, tech)`
    Rt,
    /// Technologies
    T,
    /// Vintages
    V,
    /// Input commodities
    Ic,
    /// Output commodities
    Oc,
}

impl ViableSet {
    /// The number of columns in each element
    pub fn arity(self) -> usize {
        match self {
            Self::Ritvo => 5,
            Self::Rtv => 3,
            Self::Rt => 2,
            Self::T | Self::V | Self::Ic | Self::Oc => 1,
        }
    }

    /// Whether the given key columns are an element of this set
    fn contains(self, sets: &ViableSets, key: &[&Key]) -> Result<bool> {
        let region = |idx: usize| -> Result<RegionID> { Ok(key[idx].as_text()?.into()) };
        let tech = |idx: usize| -> Result<TechID> { Ok(key[idx].as_text()?.into()) };
        let commodity = |idx: usize| -> Result<CommodityID> { Ok(key[idx].as_text()?.into()) };

        Ok(match self {
            Self::Ritvo => sets.ritvo.contains(&(
                region(0)?,
                commodity(1)?,
                tech(2)?,
                key[3].as_period()?,
                commodity(4)?,
            )),
            Self::Rtv => sets.rtv.contains(&(region(0)?, tech(1)?, key[2].as_period()?)),
            Self::Rt => sets.rt.contains(&(region(0)?, tech(1)?)),
            Self::T => sets.t.contains(key[0].as_text()?),
            Self::V => sets.v.contains(&key[0].as_period()?),
            Self::Ic => sets.ic.contains(key[0].as_text()?),
            Self::Oc => sets.oc.contains(key[0].as_text()?),
        })
    }
}

/// Which viable set a pull's rows are checked against, and using which columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    /// The set to check against
    pub set: ViableSet,
    /// The positions of the columns making up an element of `set`
    pub columns: Option<&'static [usize]>,
}

impl Validation {
    /// The columns to check.
    ///
    /// Single-column sets default to the first column. For anything else, the columns have to be
    /// given explicitly.
    pub fn key_columns(&self, name: &str) -> Result<Vec<usize>> {
        let arity = self.set.arity();
        match self.columns {
            Some(columns) => {
                ensure!(
                    columns.len() == arity,
                    "Validation of '{name}' against {} needs {arity} columns, but {} were given",
                    self.set,
                    columns.len()
                );
                Ok(columns.to_vec())
            }
            None => {
                ensure!(
                    arity == 1,
                    "Validation of '{name}' against {} does not say which columns to check",
                    self.set
                );
                Ok(vec![0])
            }
        }
    }

    /// Whether a row should be kept
    pub fn is_viable(&self, sets: &ViableSets, columns: &[usize], row: &[Key]) -> Result<bool> {
        let key: Vec<_> = columns.iter().map(|&idx| &row[idx]).collect();
        self.set.contains(sets, &key)
    }
}

/// A description of how one set or parameter is loaded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSpec {
    /// The name the data is stored under
    pub name: &'static str,
    /// Set or parameter
    pub kind: LoadKind,
    /// Where the rows come from
    pub source: Source,
    /// The columns to read, in order
    pub columns: &'static [&'static str],
    /// A period-indexed column and how to bound it
    pub time: Option<(&'static str, PeriodFilter)>,
    /// How rows are checked against the viable sets
    pub validation: Option<Validation>,
    /// Whether the table may be absent
    pub optional: bool,
}

impl LoadSpec {
    const fn set(
        name: &'static str,
        table: &'static str,
        columns: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind: LoadKind::Set,
            source: Source::Table(table),
            columns,
            time: None,
            validation: None,
            optional: false,
        }
    }

    const fn param(name: &'static str, source: Source, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: LoadKind::Param,
            source,
            columns,
            time: None,
            validation: None,
            optional: false,
        }
    }

    const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    const fn time(mut self, column: &'static str, filter: PeriodFilter) -> Self {
        self.time = Some((column, filter));
        self
    }

    const fn validate(mut self, set: ViableSet, columns: Option<&'static [usize]>) -> Self {
        self.validation = Some(Validation { set, columns });
        self
    }
}

/// Everything the model needs
pub const LOAD_SPECS: [LoadSpec; 16] = [
    LoadSpec::set("time_exist", "TimePeriod", &["period"]).time("period", PeriodFilter::Existing),
    LoadSpec::set("time_future", "TimePeriod", &["period"]).time("period", PeriodFilter::Future),
    LoadSpec::set("time_season", "TimeSeason", &["season"]).optional(),
    LoadSpec::set("time_of_day", "TimeOfDay", &["tod"]).optional(),
    LoadSpec::set("regions", "Region", &["region"]).optional(),
    LoadSpec::set("commodities", "Commodity", &["name", "flag"]),
    LoadSpec::set("technologies", "Technology", &["tech"]).validate(ViableSet::T, None),
    LoadSpec::param(
        "efficiency",
        Source::Efficiency,
        &["region", "input_comm", "tech", "vintage", "output_comm", "efficiency"],
    )
    .validate(ViableSet::Ritvo, Some(&[0, 1, 2, 3, 4])),
    LoadSpec::param(
        "lifetime_tech",
        Source::Table("LifetimeTech"),
        &["region", "tech", "lifetime"],
    )
    .optional()
    .validate(ViableSet::Rt, Some(&[0, 1])),
    LoadSpec::param(
        "lifetime_process",
        Source::Table("LifetimeProcess"),
        &["region", "tech", "vintage", "lifetime"],
    )
    .optional()
    .validate(ViableSet::Rtv, Some(&[0, 1, 2])),
    LoadSpec::param(
        "existing_capacity",
        Source::ExistingCapacity,
        &["region", "tech", "vintage", "capacity"],
    )
    .optional()
    .validate(ViableSet::Rtv, Some(&[0, 1, 2])),
    LoadSpec::param(
        "demand",
        Source::Table("Demand"),
        &["region", "period", "commodity", "demand"],
    )
    .optional()
    .time("period", PeriodFilter::Demand),
    LoadSpec::param(
        "cost_invest",
        Source::Table("CostInvest"),
        &["region", "tech", "vintage", "cost"],
    )
    .optional()
    .time("vintage", PeriodFilter::Demand)
    .validate(ViableSet::Rtv, Some(&[0, 1, 2])),
    LoadSpec::param(
        "cost_fixed",
        Source::Table("CostFixed"),
        &["region", "period", "tech", "vintage", "cost"],
    )
    .optional()
    .time("period", PeriodFilter::Demand)
    .validate(ViableSet::Rtv, Some(&[0, 2, 3])),
    LoadSpec::param(
        "cost_variable",
        Source::Table("CostVariable"),
        &["region", "period", "tech", "vintage", "cost"],
    )
    .optional()
    .time("period", PeriodFilter::Demand)
    .validate(ViableSet::Rtv, Some(&[0, 2, 3])),
    LoadSpec::set(
        "linked_techs",
        "LinkedTech",
        &["primary_region", "primary_tech", "emis_comm", "driven_tech"],
    )
    .optional()
    .validate(ViableSet::Rt, Some(&[0, 1])),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    #[case(ViableSet::T, None, vec![0])]
    #[case(ViableSet::Rtv, Some(&[0, 2, 3][..]), vec![0, 2, 3])]
    fn key_columns(
        #[case] set: ViableSet,
        #[case] columns: Option<&'static [usize]>,
        #[case] expected: Vec<usize>,
    ) {
        let validation = Validation { set, columns };
        assert_eq!(validation.key_columns("param").unwrap(), expected);
    }

    #[test]
    fn multi_column_needs_columns() {
        let validation = Validation {
            set: ViableSet::Rtv,
            columns: None,
        };
        assert_error!(
            validation.key_columns("cost_invest"),
            "Validation of 'cost_invest' against rtv does not say which columns to check"
        );
    }

    #[test]
    fn wrong_number_of_columns() {
        let validation = Validation {
            set: ViableSet::Rt,
            columns: Some(&[0]),
        };
        assert_error!(
            validation.key_columns("lifetime_tech"),
            "Validation of 'lifetime_tech' against rt needs 2 columns, but 1 were given"
        );
    }

    #[test]
    fn is_viable_uses_given_columns() {
        let sets = ViableSets {
            rtv: HashSet::from([("R1".into(), "t1".into(), 2020)]),
            ..Default::default()
        };
        let validation = Validation {
            set: ViableSet::Rtv,
            columns: Some(&[0, 2, 3]),
        };
        let columns = validation.key_columns("cost_fixed").unwrap();
        let row = |tech: &str| -> Vec<Key> {
            vec!["R1".into(), Key::Int(2030), tech.into(), Key::Int(2020)]
        };
        assert!(validation.is_viable(&sets, &columns, &row("t1")).unwrap());
        assert!(!validation.is_viable(&sets, &columns, &row("t2")).unwrap());
    }

    #[test]
    fn spec_names_are_unique() {
        let names: HashSet<_> = LOAD_SPECS.iter().map(|spec| spec.name).collect();
        assert_eq!(names.len(), LOAD_SPECS.len());
    }

    #[test]
    fn specs_validate_with_valid_columns() {
        for spec in &LOAD_SPECS {
            if let Some(validation) = &spec.validation {
                let columns = validation.key_columns(spec.name).unwrap();
                assert!(columns.iter().all(|&idx| idx < spec.columns.len()));
            }
        }
    }
}
