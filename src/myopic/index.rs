//! The windows of a myopic run.
use anyhow::{Context, Result, bail, ensure};
use std::collections::VecDeque;
use std::fmt::Display;

/// The minimum number of future periods needed for a myopic run
const MIN_FUTURE_PERIODS: usize = 3;

/// One window of a myopic run.
///
/// Periods in `[base_year, last_year)` are modelled, demand is supplied up to `last_demand_year`
/// and results for `[base_year, step_year)` are committed before moving on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MyopicIndex {
    base_year: u32,
    step_year: u32,
    last_demand_year: u32,
    last_year: u32,
}

impl MyopicIndex {
    /// Create a new window, checking that its years are in order
    pub fn new(
        base_year: u32,
        step_year: u32,
        last_demand_year: u32,
        last_year: u32,
    ) -> Result<Self> {
        ensure!(
            base_year <= last_demand_year && last_demand_year < last_year,
            "Invalid myopic window: need base year ({base_year}) <= last demand year \
            ({last_demand_year}) < last year ({last_year})"
        );
        ensure!(
            base_year < step_year && step_year <= last_year,
            "Invalid myopic window: step year ({step_year}) must be after the base year \
            ({base_year}) and no later than the last year ({last_year})"
        );

        Ok(Self {
            base_year,
            step_year,
            last_demand_year,
            last_year,
        })
    }

    /// The first modelled period
    pub fn base_year(&self) -> u32 {
        self.base_year
    }

    /// The first period which is not committed by this window
    pub fn step_year(&self) -> u32 {
        self.step_year
    }

    /// The last period with demand
    pub fn last_demand_year(&self) -> u32 {
        self.last_demand_year
    }

    /// The end of the window
    pub fn last_year(&self) -> u32 {
        self.last_year
    }

    /// Whether results for `period` are committed by this window
    pub fn commits(&self, period: u32) -> bool {
        (self.base_year..self.step_year).contains(&period)
    }

    /// A window which starts one period earlier but otherwise covers the same range.
    ///
    /// This is what we retry with after a failed solve: the window grows rather than shifts.
    ///
    /// # Arguments
    ///
    /// * `periods` - All future periods, in order
    pub fn rolled_back(&self, periods: &[u32]) -> Result<Self> {
        let idx = periods
            .iter()
            .position(|&period| period == self.base_year)
            .with_context(|| format!("Base year {} is not a future period", self.base_year))?;
        if idx == 0 {
            bail!(
                "Window starting in {} could not be solved and we cannot back up further",
                self.base_year
            );
        }

        Self::new(
            periods[idx - 1],
            self.step_year,
            self.last_demand_year,
            self.last_year,
        )
    }
}

impl Display for MyopicIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{} (committing to {}, demand to {})",
            self.base_year, self.last_year, self.step_year, self.last_demand_year
        )
    }
}

/// Split the future periods into windows, returned in chronological order.
///
/// # Arguments
///
/// * `periods` - All future periods, sorted
/// * `view_depth` - The number of periods visible in each window
/// * `step_size` - The number of periods committed by each window
pub fn build_windows(
    periods: &[u32],
    view_depth: usize,
    step_size: usize,
) -> Result<VecDeque<MyopicIndex>> {
    ensure!(
        periods.len() >= MIN_FUTURE_PERIODS,
        "A myopic run needs at least {MIN_FUTURE_PERIODS} future periods, but {} were found",
        periods.len()
    );
    ensure!(
        step_size >= 1 && view_depth >= 1,
        "Myopic view depth and step size must both be at least one"
    );
    ensure!(
        step_size <= view_depth,
        "Myopic step size ({step_size}) cannot be larger than view depth ({view_depth})"
    );

    let mut windows = VecDeque::new();
    for idx in (0..periods.len() - 1).step_by(step_size) {
        let remaining = periods.len() - idx - 1;
        let depth = view_depth.min(remaining);
        if depth < 1 {
            break;
        }
        let step = step_size.min(remaining);

        windows.push_back(MyopicIndex::new(
            periods[idx],
            periods[idx + step],
            periods[idx + depth - 1],
            periods[idx + depth],
        )?);
    }

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    const PERIODS: [u32; 5] = [2020, 2030, 2040, 2050, 2060];

    #[test]
    fn new_rejects_demand_before_base() {
        assert_error!(
            MyopicIndex::new(2030, 2040, 2020, 2040),
            "Invalid myopic window: need base year (2030) <= last demand year (2020) < last \
            year (2040)"
        );
    }

    #[rstest]
    #[case(2020, 2030, 2030, 2030)]
    #[case(2020, 2020, 2030, 2040)]
    #[case(2020, 2050, 2030, 2040)]
    fn new_invalid(
        #[case] base: u32,
        #[case] step: u32,
        #[case] last_demand: u32,
        #[case] last: u32,
    ) {
        assert!(MyopicIndex::new(base, step, last_demand, last).is_err());
    }

    #[test]
    fn windows_advance_by_step() {
        let windows = build_windows(&PERIODS, 3, 2).unwrap();
        assert_eq!(
            windows,
            [
                MyopicIndex::new(2020, 2040, 2040, 2050).unwrap(),
                MyopicIndex::new(2040, 2060, 2050, 2060).unwrap(),
            ]
        );
        assert!(windows.iter().all(|window| window.last_year() <= 2060));
    }

    #[test]
    fn windows_single_step() {
        let windows = build_windows(&PERIODS, 2, 1).unwrap();
        let bases: Vec<_> = windows.iter().map(MyopicIndex::base_year).collect();
        assert_eq!(bases, [2020, 2030, 2040, 2050]);

        // The final window is clipped to what remains
        assert_eq!(
            windows.back(),
            Some(&MyopicIndex::new(2050, 2060, 2050, 2060).unwrap())
        );
    }

    #[rstest]
    #[case(&[2020, 2030], 2, 1, "A myopic run needs at least 3 future periods, but 2 were found")]
    #[case(&PERIODS, 1, 2, "Myopic step size (2) cannot be larger than view depth (1)")]
    #[case(&PERIODS, 0, 0, "Myopic view depth and step size must both be at least one")]
    fn windows_invalid(
        #[case] periods: &[u32],
        #[case] view_depth: usize,
        #[case] step_size: usize,
        #[case] msg: &str,
    ) {
        assert_error!(build_windows(periods, view_depth, step_size), msg);
    }

    #[test]
    fn roll_back_grows_window() {
        let window = MyopicIndex::new(2040, 2050, 2050, 2060).unwrap();
        let once = window.rolled_back(&PERIODS).unwrap();
        assert_eq!(once, MyopicIndex::new(2030, 2050, 2050, 2060).unwrap());
        let twice = once.rolled_back(&PERIODS).unwrap();
        assert_eq!(twice.base_year(), 2020);
        assert_eq!(twice.last_year(), 2060);

        assert_error!(
            twice.rolled_back(&PERIODS),
            "Window starting in 2020 could not be solved and we cannot back up further"
        );
    }

    #[test]
    fn commits() {
        let window = MyopicIndex::new(2020, 2040, 2040, 2050).unwrap();
        assert!(window.commits(2020));
        assert!(window.commits(2030));
        assert!(!window.commits(2040));
    }
}
