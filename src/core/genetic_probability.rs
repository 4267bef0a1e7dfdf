//! Genetic probability
//!
//! A `GeneticProbability` replaces a scalar contagion amount by a probability that depends on the
//! genetic state of the receiver. It consists of a default value that applies to every genome and
//! a sparse list of allele-combo specific values that override the default for genomes carrying
//! that combination of alleles.
//!
//! Allele combos are opaque identifiers here. How a combo is derived from a genome is up to the
//! caller; this type only implements the arithmetic. Binary operations act element-wise on the
//! union of the combos of both operands, where an operand that does not list a combo contributes
//! its default value.

use smallvec::SmallVec;
use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign};

use super::quantity::ContagionQuantity;

pub type AlleleCombo = u32;

type Combos = SmallVec<[(AlleleCombo, f32); 4]>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeneticProbability {
    default_value: f32,
    combos: Combos,
}

impl From<f32> for GeneticProbability {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl GeneticProbability {
    /// A probability with the same value for every genome.
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            combos: Combos::new(),
        }
    }

    /// A probability that is zero except for genomes carrying `combo`.
    pub fn from_combo(combo: AlleleCombo, value: f32) -> Self {
        let mut probability = Self::new(0.0);
        probability.set(combo, value);
        probability
    }

    /// Set the value of a combo, inserting it if it is not listed yet.
    pub fn set(&mut self, combo: AlleleCombo, value: f32) {
        match self.combos.binary_search_by_key(&combo, |&(c, _)| c) {
            Ok(index) => self.combos[index].1 = value,
            Err(index) => self.combos.insert(index, (combo, value)),
        }
    }

    /// Value for genomes carrying `combo`, falling back to the default value.
    pub fn value(&self, combo: AlleleCombo) -> f32 {
        match self.combos.binary_search_by_key(&combo, |&(c, _)| c) {
            Ok(index) => self.combos[index].1,
            Err(_) => self.default_value,
        }
    }

    pub fn default_value(&self) -> f32 {
        self.default_value
    }

    pub fn num_combos(&self) -> usize {
        self.combos.len()
    }

    pub fn combos(&self) -> impl Iterator<Item = (AlleleCombo, f32)> + '_ {
        self.combos.iter().copied()
    }

    /// Sum of the default value and all combo specific values.
    pub fn sum(&self) -> f32 {
        self.combos
            .iter()
            .fold(self.default_value, |acc, &(_, value)| acc + value)
    }

    /// Cumulative probability of at least one event within `dt` for every component.
    pub fn expcdf(&self, dt: f32) -> Self {
        self.map(|value| 1.0 - (-dt * value).exp())
    }

    fn map(&self, operation: impl Fn(f32) -> f32) -> Self {
        Self {
            default_value: operation(self.default_value),
            combos: self
                .combos
                .iter()
                .map(|&(combo, value)| (combo, operation(value)))
                .collect(),
        }
    }

    fn combine(&self, other: &Self, operation: impl Fn(f32, f32) -> f32) -> Self {
        let default_value = operation(self.default_value, other.default_value);
        if self.combos.is_empty() && other.combos.is_empty() {
            return Self::new(default_value);
        }

        let mut combos = Combos::with_capacity(self.combos.len().max(other.combos.len()));
        let mut left = self.combos.iter().peekable();
        let mut right = other.combos.iter().peekable();
        loop {
            let entry = match (left.peek(), right.peek()) {
                (None, None) => break,
                (Some(&&(combo, value)), None) => {
                    left.next();
                    (combo, operation(value, other.default_value))
                }
                (None, Some(&&(combo, value))) => {
                    right.next();
                    (combo, operation(self.default_value, value))
                }
                (Some(&&(lc, lv)), Some(&&(rc, rv))) => match lc.cmp(&rc) {
                    Ordering::Less => {
                        left.next();
                        (lc, operation(lv, other.default_value))
                    }
                    Ordering::Greater => {
                        right.next();
                        (rc, operation(self.default_value, rv))
                    }
                    Ordering::Equal => {
                        left.next();
                        right.next();
                        (lc, operation(lv, rv))
                    }
                },
            };
            combos.push(entry);
        }

        Self {
            default_value,
            combos,
        }
    }
}

impl AddAssign<&GeneticProbability> for GeneticProbability {
    fn add_assign(&mut self, rhs: &GeneticProbability) {
        if self.combos.is_empty() && rhs.combos.is_empty() {
            self.default_value += rhs.default_value;
        } else {
            *self = self.combine(rhs, |l, r| l + r);
        }
    }
}

impl Add for &GeneticProbability {
    type Output = GeneticProbability;

    fn add(self, rhs: &GeneticProbability) -> GeneticProbability {
        self.combine(rhs, |l, r| l + r)
    }
}

impl Mul for &GeneticProbability {
    type Output = GeneticProbability;

    fn mul(self, rhs: &GeneticProbability) -> GeneticProbability {
        self.combine(rhs, |l, r| l * r)
    }
}

impl Add<f32> for &GeneticProbability {
    type Output = GeneticProbability;

    fn add(self, rhs: f32) -> GeneticProbability {
        self.map(|value| value + rhs)
    }
}

impl Mul<f32> for &GeneticProbability {
    type Output = GeneticProbability;

    fn mul(self, rhs: f32) -> GeneticProbability {
        self.map(|value| value * rhs)
    }
}

impl Div<f32> for &GeneticProbability {
    type Output = GeneticProbability;

    fn div(self, rhs: f32) -> GeneticProbability {
        self.map(|value| value / rhs)
    }
}

impl MulAssign<f32> for GeneticProbability {
    fn mul_assign(&mut self, rhs: f32) {
        self.default_value *= rhs;
        for (_, value) in self.combos.iter_mut() {
            *value *= rhs;
        }
    }
}

impl ContagionQuantity for GeneticProbability {
    fn accumulate(&mut self, other: &Self) {
        *self += other;
    }

    fn add_scalar(&mut self, value: f32) {
        self.default_value += value;
        for (_, v) in self.combos.iter_mut() {
            *v += value;
        }
    }

    fn scale(&mut self, factor: f32) {
        *self *= factor;
    }

    fn total(&self) -> f32 {
        self.sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_only_arithmetic() {
        let mut gp = GeneticProbability::new(0.25);
        gp += &GeneticProbability::new(0.5);
        assert_eq!(gp.default_value(), 0.75);
        assert_eq!(gp.num_combos(), 0);

        gp *= 2.0;
        assert_eq!(gp.sum(), 1.5);
        assert_eq!((&gp / 3.0).sum(), 0.5);
    }

    #[test]
    fn combos_stay_sorted() {
        let mut gp = GeneticProbability::new(0.0);
        gp.set(9, 0.1);
        gp.set(2, 0.2);
        gp.set(5, 0.3);
        let combos: Vec<AlleleCombo> = gp.combos().map(|(c, _)| c).collect();
        assert_eq!(combos, vec![2, 5, 9]);

        gp.set(5, 0.4);
        assert_eq!(gp.num_combos(), 3);
        assert_eq!(gp.value(5), 0.4);
    }

    #[test]
    fn missing_combo_uses_default() {
        let left = {
            let mut gp = GeneticProbability::new(1.0);
            gp.set(1, 0.5);
            gp
        };
        let right = {
            let mut gp = GeneticProbability::new(0.25);
            gp.set(2, 2.0);
            gp
        };

        let sum = &left + &right;
        assert_eq!(sum.default_value(), 1.25);
        assert_eq!(sum.value(1), 0.75);
        assert_eq!(sum.value(2), 3.0);
        assert_eq!(sum.value(3), 1.25);

        let product = &left * &right;
        assert_eq!(product.default_value(), 0.25);
        assert_eq!(product.value(1), 0.125);
        assert_eq!(product.value(2), 2.0);
    }

    #[test]
    fn sum_includes_default() {
        let mut gp = GeneticProbability::from_combo(4, 0.5);
        assert_eq!(gp.sum(), 0.5);
        gp.add_scalar(0.25);
        assert_eq!(gp.default_value(), 0.25);
        assert_eq!(gp.value(4), 0.75);
        assert_eq!(gp.sum(), 1.0);
        assert!(gp.is_positive());
        assert!(!GeneticProbability::zero().is_positive());
    }

    #[test]
    fn add_assign_matches_add() {
        let a = GeneticProbability::from_combo(3, 0.5);
        let b = GeneticProbability::from_combo(7, 0.25);
        let mut c = a.clone();
        c += &b;
        assert_eq!(c, &a + &b);
    }

    #[test]
    fn expcdf_of_zero_is_zero() {
        let gp = GeneticProbability::from_combo(1, 0.0).expcdf(1.0);
        assert_eq!(gp.default_value(), 0.0);
        assert_eq!(gp.value(1), 0.0);

        let gp = GeneticProbability::new(1.0).expcdf(1.0);
        assert!((gp.default_value() - (1.0 - (-1.0f32).exp())).abs() < 1e-6);
    }
}
