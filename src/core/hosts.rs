//! Host abstraction for exposure.
//!
//! The transmission groups do not decide whether a host becomes infected. They hand the host a
//! view of the contagion it is exposed to, and the host decides on the outcome:
//!
//! 1. `ContagionPopulation`: The contagion a host is exposed to for one antigen, including the
//!    means to resolve which substrain infects the host.
//! 2. `Infectable`: A trait that defines the host's reaction to an exposure.
//! 3. `TransmissionRoute`: The route along which the exposure happens.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::quantity::ContagionQuantity;
use super::random::RandomSource;
use super::strain::StrainIdentity;

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransmissionRoute {
    #[default]
    Contact,
    Environmental,
    Outbreak,
    Indoor,
    Outdoor,
}

/// Contagion of one antigen that a host is exposed to.
pub trait ContagionPopulation<T: ContagionQuantity = f32> {
    fn antigen_id(&self) -> u32;

    /// Force of infection for the antigen, aggregated over substrains.
    fn quantity(&self) -> &T;

    fn total_contagion(&self) -> f32 {
        self.quantity().total()
    }

    /// Choose the infecting substrain proportional to its contagion.
    ///
    /// Returns `None` if no substrain carries contagion.
    fn resolve_infecting_strain(&self, rng: &mut dyn RandomSource) -> Option<StrainIdentity>;
}

/// A host that can be exposed to contagion.
pub trait Infectable<T: ContagionQuantity = f32> {
    fn expose(&mut self, contagion: &dyn ContagionPopulation<T>, dt: f32, route: TransmissionRoute);
}
