//! This module contains the core datatypes of the library.

mod cotransmission;
mod genetic_probability;
mod groups;
mod properties;
mod quantity;
mod resolver;
mod strain;

pub mod hosts;
pub mod random;

pub use cotransmission::{CachedPopulation, CoTransmissionGroups};
pub use genetic_probability::{AlleleCombo, GeneticProbability};
pub use groups::{Phase, SubstrainAccumulator, TransmissionGroups, TransmissionGroupsBuilder};
pub use hosts::{ContagionPopulation, Infectable, TransmissionRoute};
pub use properties::{GroupIndex, GroupIndices, GroupMapper, PropertyRegistry};
pub use quantity::{ContagionQuantity, dot};
pub use random::RandomSource;
pub use resolver::{CumulativeDistribution, SubstrainMap, SubstrainPopulation, resolve_substrain};
pub use strain::StrainIdentity;
