//! Strain resolution
//!
//! Once a host is infected, the infecting substrain is drawn proportional to the contagion each
//! substrain contributes. Substrains are walked in ascending ID order and the first substrain whose
//! running sum reaches the target `r * total` is selected. `CumulativeDistribution` precomputes the
//! running sums once so that many draws against the same distribution resolve by binary search with
//! identical results.

use std::collections::BTreeMap;

use super::hosts::ContagionPopulation;
use super::quantity::ContagionQuantity;
use super::random::RandomSource;
use super::strain::StrainIdentity;

/// Contagion by substrain ID for one antigen and group.
pub type SubstrainMap<T> = BTreeMap<u32, T>;

/// Linear walk over substrain weights in ascending ID order.
///
/// No draw is consumed if the total weight is zero.
pub fn resolve_substrain<R: RandomSource + ?Sized>(
    weights: impl Iterator<Item = (u32, f32)> + Clone,
    rng: &mut R,
) -> Option<u32> {
    let total = weights.clone().fold(0.0f32, |acc, (_, weight)| acc + weight);
    if total == 0.0 {
        return None;
    }

    let target = total * rng.uniform01();
    let mut seen = 0.0f32;
    let mut last = None;
    for (substrain, weight) in weights {
        if weight > 0.0 {
            last = Some(substrain);
            seen += weight;
            if seen >= target {
                log::trace!("Selected substrain {}", substrain);
                return Some(substrain);
            }
        }
    }

    // rounding left the running sum short of the target
    last
}

/// Exposure view over the substrain distribution of one antigen in one group.
#[derive(Clone, Copy, Debug)]
pub struct SubstrainPopulation<'a, T: ContagionQuantity = f32> {
    antigen_id: u32,
    quantity: &'a T,
    distribution: &'a SubstrainMap<T>,
}

impl<'a, T: ContagionQuantity> SubstrainPopulation<'a, T> {
    pub fn new(antigen_id: u32, quantity: &'a T, distribution: &'a SubstrainMap<T>) -> Self {
        Self {
            antigen_id,
            quantity,
            distribution,
        }
    }

    pub fn distribution(&self) -> &SubstrainMap<T> {
        self.distribution
    }

    pub fn resolve<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Option<StrainIdentity> {
        let weights = self
            .distribution
            .iter()
            .map(|(&substrain, contagion)| (substrain, contagion.total()));
        resolve_substrain(weights, rng).map(|genetic_id| StrainIdentity::new(self.antigen_id, genetic_id))
    }
}

impl<T: ContagionQuantity> ContagionPopulation<T> for SubstrainPopulation<'_, T> {
    fn antigen_id(&self) -> u32 {
        self.antigen_id
    }

    fn quantity(&self) -> &T {
        self.quantity
    }

    fn resolve_infecting_strain(&self, rng: &mut dyn RandomSource) -> Option<StrainIdentity> {
        self.resolve(rng)
    }
}

/// Running sums of a substrain distribution for repeated draws.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CumulativeDistribution {
    substrains: Vec<u32>,
    cumulative: Vec<f32>,
    total: f32,
}

impl CumulativeDistribution {
    /// Build from weights given in ascending substrain order.
    pub fn new(weights: impl IntoIterator<Item = (u32, f32)>) -> Self {
        let mut distribution = Self::default();
        let mut seen = 0.0f32;
        for (substrain, weight) in weights {
            distribution.total += weight;
            if weight > 0.0 {
                seen += weight;
                distribution.substrains.push(substrain);
                distribution.cumulative.push(seen);
            }
        }
        distribution
    }

    pub fn from_distribution<T: ContagionQuantity>(distribution: &SubstrainMap<T>) -> Self {
        Self::new(
            distribution
                .iter()
                .map(|(&substrain, contagion)| (substrain, contagion.total())),
        )
    }

    pub fn total(&self) -> f32 {
        self.total
    }

    /// Number of substrains with positive weight.
    pub fn len(&self) -> usize {
        self.substrains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substrains.is_empty()
    }

    /// Draw a substrain, equivalent to the linear walk of `resolve_substrain`.
    pub fn resolve<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Option<u32> {
        if self.total == 0.0 {
            return None;
        }

        let target = self.total * rng.uniform01();
        let index = self.cumulative.partition_point(|&seen| seen < target);
        self.substrains
            .get(index)
            .or_else(|| self.substrains.last())
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::random::testing::ScriptedRandom;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn distribution(entries: &[(u32, f32)]) -> SubstrainMap<f32> {
        entries.iter().copied().collect()
    }

    #[test]
    fn all_zero_is_no_strain() {
        let map = distribution(&[(5, 0.0), (7, 0.0)]);
        let quantity = 0.0;
        let population = SubstrainPopulation::new(0, &quantity, &map);
        let mut rng = ScriptedRandom::new(vec![0.0, 0.5, 0.99]);
        for _ in 0..3 {
            assert_eq!(population.resolve(&mut rng), None);
        }
        assert_eq!(CumulativeDistribution::from_distribution(&map).resolve(&mut rng), None);
    }

    #[test]
    fn empty_is_no_strain() {
        let map = SubstrainMap::<f32>::new();
        let mut rng = ScriptedRandom::new(vec![0.5]);
        assert_eq!(SubstrainPopulation::new(3, &1.0, &map).resolve(&mut rng), None);
    }

    #[test]
    fn single_nonzero_substrain_always_wins() {
        let map = distribution(&[(1, 0.0), (4, 2.5), (9, 0.0)]);
        let quantity = 2.5;
        let population = SubstrainPopulation::new(2, &quantity, &map);
        let mut rng = ScriptedRandom::new(vec![1e-6, 0.25, 0.5, 0.75, 0.999_999]);
        for _ in 0..5 {
            assert_eq!(population.resolve(&mut rng), Some(StrainIdentity::new(2, 4)));
        }
    }

    #[test]
    fn tie_break_reaching_target() {
        // target = 0.5 * 2.0 = 1.0 is reached exactly by the first substrain
        let map = distribution(&[(3, 1.0), (8, 1.0)]);
        let mut rng = ScriptedRandom::new(vec![0.5]);
        assert_eq!(resolve_substrain(map.iter().map(|(&s, &w)| (s, w)), &mut rng), Some(3));

        let mut rng = ScriptedRandom::new(vec![0.5]);
        assert_eq!(CumulativeDistribution::from_distribution(&map).resolve(&mut rng), Some(3));
    }

    #[test]
    fn zero_draw_selects_first_positive() {
        let map = distribution(&[(0, 0.0), (2, 0.3), (6, 0.7)]);
        let mut rng = ScriptedRandom::new(vec![0.0]);
        assert_eq!(resolve_substrain(map.iter().map(|(&s, &w)| (s, w)), &mut rng), Some(2));
    }

    #[test]
    fn batch_matches_linear_walk() {
        let map = distribution(&[(0, 0.1), (1, 0.0), (2, 0.35), (5, 0.05), (11, 1.5), (12, 0.2)]);
        let batch = CumulativeDistribution::from_distribution(&map);
        assert_eq!(batch.len(), 5);

        let mut linear_rng = StdRng::seed_from_u64(1234);
        let mut batch_rng = StdRng::seed_from_u64(1234);
        for _ in 0..10_000 {
            let linear = resolve_substrain(map.iter().map(|(&s, &w)| (s, w)), &mut linear_rng);
            assert_eq!(linear, batch.resolve(&mut batch_rng));
        }
    }

    #[test]
    fn draws_follow_weights() {
        let map = distribution(&[(1, 1.0), (2, 3.0)]);
        let batch = CumulativeDistribution::from_distribution(&map);
        let mut rng = StdRng::seed_from_u64(99);
        let n = 20_000;
        let second = (0..n)
            .filter(|_| batch.resolve(&mut rng) == Some(2))
            .count();
        let fraction = second as f64 / n as f64;
        assert!((fraction - 0.75).abs() < 0.02);
    }

    #[test]
    fn view_reports_quantity() {
        let map = distribution(&[(1, 0.5)]);
        let quantity = 0.5;
        let population = SubstrainPopulation::new(1, &quantity, &map);
        let view: &dyn ContagionPopulation = &population;
        assert_eq!(view.antigen_id(), 1);
        assert_eq!(view.total_contagion(), 0.5);
        let mut rng = ScriptedRandom::new(vec![0.3]);
        assert_eq!(
            view.resolve_infecting_strain(&mut rng),
            Some(StrainIdentity::new(1, 1))
        );
    }
}
