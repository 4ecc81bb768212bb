//! Code for working with model periods.
use strum::{Display, EnumString};

/// Whether a period is before the modelled horizon or part of it (`TimePeriod.flag`)
#[derive(PartialEq, Eq, Clone, Copy, Debug, EnumString, Display)]
pub enum PeriodFlag {
    /// A period before the horizon, which can only hold existing capacity
    #[strum(serialize = "e")]
    Existing,
    /// A period within the modelled horizon
    #[strum(serialize = "f")]
    Future,
}

/// Check that a slice of values is sorted and unique
pub fn is_sorted_and_unique<T: PartialOrd>(values: &[T]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

/// The periods in which demand is modelled.
///
/// The last future period only marks the end of the horizon, so it is excluded.
pub fn demand_periods(future_periods: &[u32]) -> &[u32] {
    future_periods
        .split_last()
        .map_or(&[], |(_, rest)| rest)
}
