//! Technologies convert input commodities into output commodities.
//!
//! This module also holds the lifetime lookup used whenever we need to know which vintages of a
//! technology are still operating in a given period.
use crate::id::define_id_type;
use crate::region::RegionID;
use std::collections::HashMap;

define_id_type! {TechID}

/// Lifetime used when neither a process lifetime nor a technology lifetime is given
pub const DEFAULT_LIFETIME: u32 = 40;

/// Lifetimes from `LifetimeProcess` and `LifetimeTech`, resolved through a fallback chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifetimeLookup {
    /// Explicit lifetimes for a particular vintage
    pub process: HashMap<(RegionID, TechID, u32), u32>,
    /// Default lifetimes for all vintages of a technology
    pub tech: HashMap<(RegionID, TechID), u32>,
}

impl LifetimeLookup {
    /// Get the lifetime of a process.
    ///
    /// Falls back from process lifetime to technology lifetime to [`DEFAULT_LIFETIME`].
    pub fn get(&self, region_id: &RegionID, tech_id: &TechID, vintage: u32) -> u32 {
        self.process
            .get(&(region_id.clone(), tech_id.clone(), vintage))
            .or_else(|| self.tech.get(&(region_id.clone(), tech_id.clone())))
            .copied()
            .unwrap_or(DEFAULT_LIFETIME)
    }

    /// Whether a process of the given vintage is still operating in `period`
    pub fn is_active(
        &self,
        region_id: &RegionID,
        tech_id: &TechID,
        vintage: u32,
        period: u32,
    ) -> bool {
        vintage <= period && period < vintage + self.get(region_id, tech_id, vintage)
    }
}
