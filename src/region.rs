//! Regions represent different geographical areas in which technologies operate.
use crate::id::define_id_type;

define_id_type! {RegionID}

/// Separates the two ends of an inter-regional exchange "region" (e.g. `R1-R2`)
pub const EXCHANGE_DELIMITER: char = '-';

impl RegionID {
    /// Whether this region denotes an exchange path between two regions
    pub fn is_exchange(&self) -> bool {
        self.0.contains(EXCHANGE_DELIMITER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("GBR", false)]
    #[case("GBR-FRA", true)]
    fn region_is_exchange(#[case] region: &str, #[case] expected: bool) {
        assert_eq!(RegionID::new(region).is_exchange(), expected);
    }
}
