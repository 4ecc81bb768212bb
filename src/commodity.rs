//! Commodities are substances or forms of energy that can be produced and consumed by technologies.
use crate::id::define_id_type;
use strum::{Display, EnumString};

define_id_type! {CommodityID}

/// The role a commodity plays in the network, as given by the `flag` column of `Commodity`
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, EnumString, Display)]
pub enum CommodityFlag {
    /// An end-use demand which must be met
    #[strum(serialize = "d")]
    Demand,
    /// An emission, which never takes part in a physical flow
    #[strum(serialize = "e")]
    Emission,
    /// A physical commodity, produced and consumed by technologies
    #[strum(serialize = "p")]
    Physical,
    /// A commodity which may be consumed "from nothing" (exogenous supply)
    #[strum(serialize = "s")]
    Source,
}
