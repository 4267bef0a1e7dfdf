//! Co-transmission
//!
//! With co-transmission many hosts are exposed to the same source distribution within one
//! timestep, e.g. every host bitten by a cohort of vectors. Instead of building a view per
//! exposure, the cumulative substrain distribution of every antigen and group is computed once at
//! the end of the update and strains are resolved against it by binary search.
//!
//! The groups also remember which strain identity deposited under each genetic ID during the
//! current timestep, so that an infecting substrain can be traced back to its source.

use std::collections::HashMap;

use super::genetic_probability::GeneticProbability;
use super::groups::{Phase, TransmissionGroups};
use super::hosts::{ContagionPopulation, Infectable, TransmissionRoute};
use super::properties::GroupIndex;
use super::quantity::ContagionQuantity;
use super::random::RandomSource;
use super::resolver::CumulativeDistribution;
use super::strain::StrainIdentity;
use crate::errors::{ContagionError, Result};

/// Exposure view backed by a cached cumulative distribution.
#[derive(Clone, Copy, Debug)]
pub struct CachedPopulation<'a> {
    antigen_id: u32,
    quantity: &'a GeneticProbability,
    total: f32,
    distribution: &'a CumulativeDistribution,
}

impl CachedPopulation<'_> {
    pub fn distribution(&self) -> &CumulativeDistribution {
        self.distribution
    }

    pub fn resolve<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Option<StrainIdentity> {
        self.distribution
            .resolve(rng)
            .map(|genetic_id| StrainIdentity::new(self.antigen_id, genetic_id))
    }
}

impl ContagionPopulation<GeneticProbability> for CachedPopulation<'_> {
    fn antigen_id(&self) -> u32 {
        self.antigen_id
    }

    fn quantity(&self) -> &GeneticProbability {
        self.quantity
    }

    fn total_contagion(&self) -> f32 {
        self.total
    }

    fn resolve_infecting_strain(&self, rng: &mut dyn RandomSource) -> Option<StrainIdentity> {
        self.resolve(rng)
    }
}

/// Genetic probability transmission groups with per timestep exposure caches.
#[derive(Clone, Debug)]
pub struct CoTransmissionGroups {
    groups: TransmissionGroups<GeneticProbability>,
    distributions: Vec<CumulativeDistribution>,
    totals: Vec<f32>,
    strains: HashMap<u32, StrainIdentity>,
    deposited_since_update: bool,
}

impl From<TransmissionGroups<GeneticProbability>> for CoTransmissionGroups {
    fn from(groups: TransmissionGroups<GeneticProbability>) -> Self {
        Self::new(groups)
    }
}

impl CoTransmissionGroups {
    pub fn new(groups: TransmissionGroups<GeneticProbability>) -> Self {
        let size = groups.forces().len();
        Self {
            groups,
            distributions: vec![CumulativeDistribution::default(); size],
            totals: vec![0.0; size],
            strains: HashMap::new(),
            deposited_since_update: false,
        }
    }

    pub fn groups(&self) -> &TransmissionGroups<GeneticProbability> {
        &self.groups
    }

    pub fn update_population_size(
        &mut self,
        group: GroupIndex,
        size_change: f32,
        weight: f32,
    ) -> Result<()> {
        self.groups.update_population_size(group, size_change, weight)
    }

    pub fn clear_population_size(&mut self) {
        self.groups.clear_population_size();
    }

    /// Deposit contagion and record the depositing strain under its genetic ID.
    ///
    /// Amounts whose sum is not positive are ignored and do not register the strain.
    pub fn deposit_contagion(
        &mut self,
        strain: &StrainIdentity,
        amount: &GeneticProbability,
        group: GroupIndex,
    ) -> Result<()> {
        self.groups.deposit_contagion_gp(strain, amount, group)?;
        if !amount.is_positive() {
            return Ok(());
        }

        if !self.deposited_since_update {
            self.reset_strains();
            self.deposited_since_update = true;
        }
        self.strains.insert(strain.genetic_id(), *strain);
        Ok(())
    }

    fn reset_strains(&mut self) {
        log::trace!(
            "({}) Resetting {} registered strains",
            self.groups.tag(),
            self.strains.len()
        );
        self.strains.clear();
    }

    pub fn correct_infectivity_by_group(
        &mut self,
        infectivity_multiplier: f32,
        group: GroupIndex,
    ) -> Result<()> {
        self.groups
            .correct_infectivity_by_group(infectivity_multiplier, group)
    }

    /// Reduce the deposits and rebuild the exposure caches of every antigen and group.
    pub fn end_update(&mut self, infectivity_multiplier: f32, infectivity_addition: f32) {
        self.groups
            .end_update(infectivity_multiplier, infectivity_addition);
        if !self.deposited_since_update {
            self.reset_strains();
        }
        self.deposited_since_update = false;

        for (index, (distribution, total)) in self
            .distributions
            .iter_mut()
            .zip(self.totals.iter_mut())
            .enumerate()
        {
            *distribution =
                CumulativeDistribution::from_distribution(&self.groups.substrain_forces()[index]);
            *total = self.groups.forces()[index].total();
        }

        log::debug!(
            "({}) Cached {} exposure distributions for {} strains",
            self.groups.tag(),
            self.distributions.len(),
            self.strains.len()
        );
    }

    /// Strain that deposited under `genetic_id` during the current timestep.
    pub fn strain_identity(&self, genetic_id: u32) -> Result<&StrainIdentity> {
        self.strains.get(&genetic_id).ok_or_else(|| {
            ContagionError::IllegalOperation(format!(
                "({}) no strain with genetic ID {} deposited contagion this timestep",
                self.groups.tag(),
                genetic_id
            ))
        })
    }

    pub fn contagion_population(
        &self,
        antigen: u32,
        group: GroupIndex,
    ) -> Result<CachedPopulation<'_>> {
        let index = self.groups.slot(antigen, group)?;
        Ok(self.cached(antigen, index))
    }

    fn cached(&self, antigen: u32, index: usize) -> CachedPopulation<'_> {
        CachedPopulation {
            antigen_id: antigen,
            quantity: &self.groups.forces()[index],
            total: self.totals[index],
            distribution: &self.distributions[index],
        }
    }

    /// Expose `host` to every antigen with positive force of infection in `group`.
    pub fn expose_to_contagion<H>(
        &self,
        host: &mut H,
        group: GroupIndex,
        dt: f32,
        route: TransmissionRoute,
    ) -> Result<()>
    where
        H: Infectable<GeneticProbability> + ?Sized,
    {
        debug_assert_eq!(self.groups.phase(), Phase::Exposing);

        for antigen in 0..self.groups.antigen_count() as u32 {
            let index = self.groups.slot(antigen, group)?;
            if self.totals[index] > 0.0 {
                host.expose(&self.cached(antigen, index), dt, route);
            }
        }
        Ok(())
    }

    /// Remove a substrain from the exposure distribution of `group` and rebuild its cache.
    pub fn clear_strain(&mut self, strain: &StrainIdentity, group: GroupIndex) -> Result<()> {
        self.groups.clear_strain(strain, group)?;
        let index = self.groups.slot(strain.antigen_id(), group)?;
        self.distributions[index] =
            CumulativeDistribution::from_distribution(&self.groups.substrain_forces()[index]);
        Ok(())
    }

    pub fn total_contagion(&self) -> &GeneticProbability {
        self.groups.total_contagion_gp()
    }
}
