//! Transmission groups
//!
//! The transmission groups accumulate the contagion shed by infectious hosts and turn it into the
//! force of infection experienced by susceptible hosts. Contagion is tracked per antigen and group,
//! and in parallel per antigen, group and substrain. Each timestep follows the same cycle:
//!
//! 1. Deposit: infectious hosts add contagion to the group they belong to.
//! 2. End update: accumulated contagion decays, newly deposited contagion is added, the result is
//!    mixed across groups with the mixing matrix and normalized by the population size.
//! 3. Expose: every host is exposed to the force of infection of its group and decides on its own
//!    whether it gets infected.
//!
//! The accumulator is generic over the contagion quantity. Operations that only make sense for
//! scalar contagion are implemented on `TransmissionGroups<f32>` and those for genetic
//! probabilities on `TransmissionGroups<GeneticProbability>`.

use std::collections::HashMap;

use super::genetic_probability::GeneticProbability;
use super::hosts::{Infectable, TransmissionRoute};
use super::properties::{GroupIndex, GroupMapper, PropertyRegistry};
use super::quantity::{ContagionQuantity, dot};
use super::resolver::{SubstrainMap, SubstrainPopulation};
use super::strain::StrainIdentity;
use crate::errors::{ContagionError, Result};

/// Contagion by substrain ID, unordered.
pub type SubstrainAccumulator<T> = HashMap<u32, T>;

/// Position in the timestep cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Accepting,
    Reducing,
    Exposing,
}

/// Setup phase of the transmission groups.
#[derive(Clone, Debug)]
pub struct TransmissionGroupsBuilder {
    registry: PropertyRegistry,
    normalize_by_total_population: bool,
    tag: String,
}

impl Default for TransmissionGroupsBuilder {
    fn default() -> Self {
        Self {
            registry: PropertyRegistry::new(),
            normalize_by_total_population: true,
            tag: "contact".to_string(),
        }
    }
}

impl TransmissionGroupsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property with its values and `[source][destination]` scaling matrix.
    pub fn add_property<S: Into<String>>(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = S>,
        scaling_matrix: &[Vec<f32>],
    ) -> Result<()> {
        self.registry.add_property(name, values, scaling_matrix)
    }

    pub fn use_total_population_for_normalization(&mut self) {
        self.normalize_by_total_population = true;
    }

    pub fn use_group_population_for_normalization(&mut self) {
        self.normalize_by_total_population = false;
    }

    pub fn set_tag<S: Into<String>>(&mut self, tag: S) {
        self.tag = tag.into();
    }

    /// Compose the mixing matrix and allocate the accumulators.
    pub fn build<T: ContagionQuantity>(
        self,
        decay_rate: f32,
        antigen_count: usize,
        substrain_count: usize,
    ) -> Result<TransmissionGroups<T>> {
        if antigen_count == 0 {
            return Err(ContagionError::InitializationError(format!(
                "({}) transmission groups require at least one antigen",
                self.tag
            )));
        }
        if !(0.0..=1.0).contains(&decay_rate) {
            return Err(ContagionError::InitializationError(format!(
                "({}) decay rate must be within [0, 1], got {}",
                self.tag, decay_rate
            )));
        }

        let mapper = self.registry.build();
        let group_count = mapper.group_count();
        let size = antigen_count * group_count;

        log::debug!(
            "({}) Built {} groups with {} antigens and {} substrains",
            self.tag,
            group_count,
            antigen_count,
            substrain_count
        );

        Ok(TransmissionGroups {
            tag: self.tag,
            mapper,
            decay_rate,
            antigen_count,
            substrain_count,
            normalize_by_total_population: self.normalize_by_total_population,
            population_size: 0.0,
            population_size_by_group: vec![0.0; group_count],
            newly_deposited: vec![T::zero(); size],
            current_by_source: vec![T::zero(); size],
            current_by_destination: vec![T::zero(); size],
            force_of_infection: vec![T::zero(); size],
            new_by_substrain: vec![SubstrainAccumulator::new(); size],
            current_by_source_substrain: vec![SubstrainAccumulator::new(); size],
            current_by_destination_substrain: vec![SubstrainAccumulator::new(); size],
            force_of_infection_by_substrain: vec![SubstrainMap::new(); size],
            total_contagion: T::zero(),
            phase: Phase::Accepting,
        })
    }
}

/// Run phase of the transmission groups.
///
/// All per antigen and group tensors are flat and indexed by `antigen * group_count + group`.
#[derive(Clone, Debug)]
pub struct TransmissionGroups<T: ContagionQuantity = f32> {
    tag: String,
    mapper: GroupMapper,
    decay_rate: f32,
    antigen_count: usize,
    substrain_count: usize,
    normalize_by_total_population: bool,
    population_size: f32,
    population_size_by_group: Vec<f32>,
    newly_deposited: Vec<T>,
    current_by_source: Vec<T>,
    current_by_destination: Vec<T>,
    force_of_infection: Vec<T>,
    new_by_substrain: Vec<SubstrainAccumulator<T>>,
    current_by_source_substrain: Vec<SubstrainAccumulator<T>>,
    current_by_destination_substrain: Vec<SubstrainAccumulator<T>>,
    force_of_infection_by_substrain: Vec<SubstrainMap<T>>,
    total_contagion: T,
    phase: Phase,
}

impl<T: ContagionQuantity> TransmissionGroups<T> {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn set_tag<S: Into<String>>(&mut self, tag: S) {
        self.tag = tag.into();
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn group_count(&self) -> usize {
        self.mapper.group_count()
    }

    pub fn antigen_count(&self) -> usize {
        self.antigen_count
    }

    pub fn substrain_count(&self) -> usize {
        self.substrain_count
    }

    pub fn decay_rate(&self) -> f32 {
        self.decay_rate
    }

    pub fn normalizes_by_total_population(&self) -> bool {
        self.normalize_by_total_population
    }

    pub fn mapper(&self) -> &GroupMapper {
        &self.mapper
    }

    pub fn mixing_matrix(&self) -> &ndarray::Array2<f32> {
        self.mapper.mixing_matrix()
    }

    /// Group membership of a host with the given properties.
    pub fn group_for_properties<K, V>(
        &self,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<GroupIndex>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let group = self.mapper.group_for_properties(properties)?;
        log::debug!("({}) Host assigned to group {}", self.tag, group);
        Ok(group)
    }

    #[inline]
    fn index(&self, antigen: usize, group: usize) -> usize {
        antigen * self.group_count() + group
    }

    fn check_antigen(&self, antigen: u32) -> Result<usize> {
        let index = antigen as usize;
        if index >= self.antigen_count {
            return Err(ContagionError::AntigenOutOfRange {
                antigen,
                antigen_count: self.antigen_count,
            });
        }
        Ok(index)
    }

    fn check_group(&self, group: GroupIndex) -> Result<usize> {
        let index = group.index();
        if index >= self.group_count() {
            return Err(ContagionError::GroupOutOfRange {
                group: index,
                group_count: self.group_count(),
            });
        }
        Ok(index)
    }

    fn check_slot(&self, antigen: u32, group: GroupIndex) -> Result<usize> {
        let antigen = self.check_antigen(antigen)?;
        let group = self.check_group(group)?;
        Ok(self.index(antigen, group))
    }

    fn begin_accepting(&mut self) {
        if self.phase != Phase::Accepting {
            log::trace!("({}) Accepting deposits for the next timestep", self.tag);
            self.phase = Phase::Accepting;
        }
    }

    /// Add `size_change * weight` hosts to `group`.
    pub fn update_population_size(
        &mut self,
        group: GroupIndex,
        size_change: f32,
        weight: f32,
    ) -> Result<()> {
        let group = self.check_group(group)?;
        let delta = size_change * weight;
        self.population_size += delta;
        self.population_size_by_group[group] += delta;
        Ok(())
    }

    /// Population used to normalize the contagion of `group`.
    pub fn population_size(&self, group: GroupIndex) -> Result<f32> {
        let group = self.check_group(group)?;
        Ok(self.normalization_population(group))
    }

    pub fn clear_population_size(&mut self) {
        self.population_size = 0.0;
        self.population_size_by_group.fill(0.0);
    }

    #[inline]
    fn normalization_population(&self, group: usize) -> f32 {
        if self.normalize_by_total_population {
            self.population_size
        } else {
            self.population_size_by_group[group]
        }
    }

    fn deposit(&mut self, strain: &StrainIdentity, amount: &T, group: GroupIndex) -> Result<()> {
        let index = self.check_slot(strain.antigen_id(), group)?;
        if !amount.is_positive() {
            return Ok(());
        }

        self.begin_accepting();
        self.newly_deposited[index].accumulate(amount);
        self.new_by_substrain[index]
            .entry(strain.genetic_id())
            .or_insert_with(T::zero)
            .accumulate(amount);

        log::trace!(
            "({}) Deposit for strain {} in group {} increased by {}",
            self.tag,
            strain,
            group,
            amount.total()
        );
        Ok(())
    }

    /// Scale the contagion deposited into `group` since the last end update.
    pub fn correct_infectivity_by_group(
        &mut self,
        infectivity_multiplier: f32,
        group: GroupIndex,
    ) -> Result<()> {
        let group = self.check_group(group)?;
        self.begin_accepting();

        for antigen in 0..self.antigen_count {
            let index = self.index(antigen, group);
            log::debug!(
                "({}) Correcting infectivity of antigen {} in group {} by {} (before {})",
                self.tag,
                antigen,
                group,
                infectivity_multiplier,
                self.newly_deposited[index].total()
            );
            self.newly_deposited[index].scale(infectivity_multiplier);
            for contagion in self.new_by_substrain[index].values_mut() {
                contagion.scale(infectivity_multiplier);
            }
        }
        Ok(())
    }

    /// Reduce the deposits of this timestep into the force of infection.
    ///
    /// A nonzero `infectivity_addition` is only applied to a single group with a single antigen and
    /// substrain. Any other configuration uses zero instead.
    pub fn end_update(&mut self, infectivity_multiplier: f32, infectivity_addition: f32) {
        self.phase = Phase::Reducing;

        let group_count = self.group_count();
        let additional_contagion = if infectivity_addition != 0.0
            && (group_count > 1 || self.antigen_count > 1 || self.substrain_count > 1)
        {
            log::warn!(
                "({}) Infectivity addition {} requires a single group, antigen and substrain (have {} groups, {} antigens, {} substrains); using 0",
                self.tag,
                infectivity_addition,
                group_count,
                self.antigen_count,
                self.substrain_count
            );
            0.0
        } else {
            infectivity_addition
        };

        if log::log_enabled!(log::Level::Trace) {
            self.trace_sources();
        }

        let decay_factor = 1.0 - self.decay_rate;
        log::trace!(
            "({}) Decay rate {} => decay factor {}",
            self.tag,
            self.decay_rate,
            decay_factor
        );

        for antigen in 0..self.antigen_count {
            let begin = antigen * group_count;
            let end = begin + group_count;

            // decay and fold in new contagion by source group
            for (current, deposited) in self.current_by_source[begin..end]
                .iter_mut()
                .zip(self.newly_deposited[begin..end].iter_mut())
            {
                if decay_factor == 0.0 {
                    *current = T::zero();
                } else {
                    current.scale(decay_factor);
                }
                current.accumulate(deposited);
                current.add_scalar(additional_contagion);
                *deposited = T::zero();
            }

            // mix into destination groups and normalize
            for group in 0..group_count {
                let row = self.mapper.mixing_row(group);
                let destination = dot(&self.current_by_source[begin..end], row);

                let population = self.normalization_population(group);
                let normalization = if population == 0.0 { 0.0 } else { 1.0 / population };
                let mut force = destination.scaled(infectivity_multiplier);
                force.scale(normalization);

                self.current_by_destination[begin + group] = destination;
                self.force_of_infection[begin + group] = force;
            }

            for group in begin..end {
                let current = &mut self.current_by_source_substrain[group];
                if decay_factor > 0.0 {
                    for contagion in current.values_mut() {
                        contagion.scale(decay_factor);
                    }
                } else {
                    current.clear();
                }

                for (substrain, mut contagion) in self.new_by_substrain[group].drain() {
                    contagion.add_scalar(additional_contagion);
                    current
                        .entry(substrain)
                        .or_insert_with(T::zero)
                        .accumulate(&contagion);
                }
            }

            for group in 0..group_count {
                let row = self.mapper.mixing_row(group);
                let destination = &mut self.current_by_destination_substrain[begin + group];
                destination.clear();
                for (source, &beta) in row.iter().enumerate() {
                    for (&substrain, contagion) in &self.current_by_source_substrain[begin + source] {
                        destination
                            .entry(substrain)
                            .or_insert_with(T::zero)
                            .accumulate(&contagion.scaled(beta));
                    }
                }

                let population = if self.normalize_by_total_population {
                    self.population_size
                } else {
                    self.population_size_by_group[group]
                };
                let normalization = if population == 0.0 { 0.0 } else { 1.0 / population };

                let force = &mut self.force_of_infection_by_substrain[begin + group];
                force.clear();
                for (&substrain, contagion) in destination.iter() {
                    let mut value = contagion.scaled(infectivity_multiplier);
                    value.scale(normalization);
                    force.insert(substrain, value);
                }
            }
        }

        self.total_contagion = self.sum_force_of_infection();

        if log::log_enabled!(log::Level::Trace) {
            self.trace_destinations();
        }

        self.phase = Phase::Exposing;
    }

    fn sum_force_of_infection(&self) -> T {
        self.force_of_infection
            .iter()
            .fold(T::zero(), |mut total, force| {
                total.accumulate(force);
                total
            })
    }

    fn trace_sources(&self) {
        let group_count = self.group_count();
        for antigen in 0..self.antigen_count {
            for group in 0..group_count {
                let index = self.index(antigen, group);
                log::trace!(
                    "({}) New contagion (antigen = {}, group = {}) = {}",
                    self.tag,
                    antigen,
                    group,
                    self.newly_deposited[index].total()
                );
                for (substrain, contagion) in &self.new_by_substrain[index] {
                    log::trace!(
                        "({}) New contagion (antigen = {}, group = {}, substrain = {}) = {}",
                        self.tag,
                        antigen,
                        group,
                        substrain,
                        contagion.total()
                    );
                }
                log::trace!(
                    "({}) Current contagion [source] (antigen = {}, group = {}) = {}",
                    self.tag,
                    antigen,
                    group,
                    self.current_by_source[index].total()
                );
            }
        }
    }

    fn trace_destinations(&self) {
        let group_count = self.group_count();
        for antigen in 0..self.antigen_count {
            for group in 0..group_count {
                let index = self.index(antigen, group);
                log::trace!(
                    "({}) Current contagion [dest] (antigen = {}, group = {}) = {}",
                    self.tag,
                    antigen,
                    group,
                    self.current_by_destination[index].total()
                );
                log::trace!(
                    "({}) Force of infection (antigen = {}, group = {}) = {}",
                    self.tag,
                    antigen,
                    group,
                    self.force_of_infection[index].total()
                );
                for (substrain, force) in &self.force_of_infection_by_substrain[index] {
                    log::trace!(
                        "({}) Force of infection (antigen = {}, group = {}, substrain = {}) = {}",
                        self.tag,
                        antigen,
                        group,
                        substrain,
                        force.total()
                    );
                }
            }
        }
    }

    /// Exposure view of one antigen in one group.
    pub fn contagion_population(
        &self,
        antigen: u32,
        group: GroupIndex,
    ) -> Result<SubstrainPopulation<'_, T>> {
        let index = self.check_slot(antigen, group)?;
        Ok(SubstrainPopulation::new(
            antigen,
            &self.force_of_infection[index],
            &self.force_of_infection_by_substrain[index],
        ))
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
        H: Infectable<T> + ?Sized,
    {
        debug_assert_eq!(
            self.phase,
            Phase::Exposing,
            "({}) exposure before the end of the update",
            self.tag
        );
        let group = self.check_group(group)?;

        for antigen in 0..self.antigen_count {
            let index = self.index(antigen, group);
            let force = &self.force_of_infection[index];
            if force.is_positive() {
                log::debug!(
                    "({}) Exposure to antigen {} in group {} via {}: {}",
                    self.tag,
                    antigen,
                    group,
                    route,
                    force.total()
                );
                let population = SubstrainPopulation::new(
                    antigen as u32,
                    force,
                    &self.force_of_infection_by_substrain[index],
                );
                host.expose(&population, dt, route);
            }
        }
        Ok(())
    }

    /// Remove a substrain from the exposure distribution of `group` for the rest of the timestep.
    ///
    /// The force of infection of the antigen is left untouched so that hosts exposed later in the
    /// timestep see the same total contagion.
    pub fn clear_strain(&mut self, strain: &StrainIdentity, group: GroupIndex) -> Result<()> {
        let index = self.check_slot(strain.antigen_id(), group)?;
        self.force_of_infection_by_substrain[index].remove(&strain.genetic_id());
        Ok(())
    }

    pub fn force_of_infection(&self, antigen: u32, group: GroupIndex) -> Result<&T> {
        let index = self.check_slot(antigen, group)?;
        Ok(&self.force_of_infection[index])
    }

    pub fn current_contagion_by_source(&self, antigen: u32, group: GroupIndex) -> Result<&T> {
        let index = self.check_slot(antigen, group)?;
        Ok(&self.current_by_source[index])
    }

    pub fn current_contagion_by_destination(&self, antigen: u32, group: GroupIndex) -> Result<&T> {
        let index = self.check_slot(antigen, group)?;
        Ok(&self.current_by_destination[index])
    }

    pub fn current_contagion_by_source_substrain(
        &self,
        antigen: u32,
        group: GroupIndex,
    ) -> Result<&SubstrainAccumulator<T>> {
        let index = self.check_slot(antigen, group)?;
        Ok(&self.current_by_source_substrain[index])
    }

    pub fn force_of_infection_by_substrain(
        &self,
        antigen: u32,
        group: GroupIndex,
    ) -> Result<&SubstrainMap<T>> {
        let index = self.check_slot(antigen, group)?;
        Ok(&self.force_of_infection_by_substrain[index])
    }

    /// Flat force of infection of every antigen and group.
    pub(crate) fn forces(&self) -> &[T] {
        &self.force_of_infection
    }

    /// Flat force of infection by substrain of every antigen and group.
    pub(crate) fn substrain_forces(&self) -> &[SubstrainMap<T>] {
        &self.force_of_infection_by_substrain
    }

    pub(crate) fn slot(&self, antigen: u32, group: GroupIndex) -> Result<usize> {
        self.check_slot(antigen, group)
    }

    fn total_for_group(&self, group: GroupIndex) -> Result<T> {
        let group = self.check_group(group)?;
        let mut total = T::zero();
        for antigen in 0..self.antigen_count {
            total.accumulate(&self.force_of_infection[self.index(antigen, group)]);
        }
        Ok(total)
    }
}

impl TransmissionGroups<f32> {
    /// Deposit scalar contagion of `strain` into `group`.
    ///
    /// Amounts that are not positive are ignored after the strain and group are validated.
    pub fn deposit_contagion(
        &mut self,
        strain: &StrainIdentity,
        amount: f32,
        group: GroupIndex,
    ) -> Result<()> {
        self.deposit(strain, &amount, group)
    }

    /// Force of infection summed over all antigens and groups at the last end update.
    pub fn get_total_contagion(&self) -> f32 {
        self.total_contagion
    }

    pub fn get_total_contagion_for_group(&self, group: GroupIndex) -> Result<f32> {
        self.total_for_group(group)
    }

    /// Force of infection summed over all antigens and all groups with property `name` equal to
    /// `value`.
    pub fn get_contagion_by_property(&self, name: &str, value: &str) -> Result<f32> {
        let indices = self.mapper.group_indices_for_property(name, value)?;
        let group_count = self.group_count();
        let mut total = 0.0f32;
        for antigen in 0..self.antigen_count {
            let force = &self.force_of_infection[antigen * group_count..(antigen + 1) * group_count];
            total += indices.iter().fold(0.0f32, |acc, &index| acc + force[index]);
        }
        Ok(total)
    }
}

impl TransmissionGroups<GeneticProbability> {
    /// Deposit genetic probability contagion of `strain` into `group`.
    ///
    /// Amounts whose sum is not positive are ignored after the strain and group are validated.
    pub fn deposit_contagion_gp(
        &mut self,
        strain: &StrainIdentity,
        amount: &GeneticProbability,
        group: GroupIndex,
    ) -> Result<()> {
        self.deposit(strain, amount, group)
    }

    pub fn total_contagion_gp(&self) -> &GeneticProbability {
        &self.total_contagion
    }

    pub fn total_contagion_for_group_gp(&self, group: GroupIndex) -> Result<GeneticProbability> {
        self.total_for_group(group)
    }
}
