//! Contagion quantities
//!
//! The accumulator is generic over the quantity it accumulates. A quantity is either a plain
//! `f32` amount or a vector valued `GeneticProbability`. Both support the same small algebra:
//! accumulation, scalar addition, scaling, and a `total` reduction that is used wherever a scalar
//! would be compared against zero.

use std::fmt::Debug;

pub trait ContagionQuantity: Clone + Debug + Default + PartialEq {
    /// The additive identity.
    fn zero() -> Self {
        Self::default()
    }

    /// Add `other` into `self`.
    fn accumulate(&mut self, other: &Self);

    /// Add a flat scalar to every component.
    fn add_scalar(&mut self, value: f32);

    /// Multiply every component by `factor`.
    fn scale(&mut self, factor: f32);

    /// Scalar reduction of the quantity.
    fn total(&self) -> f32;

    fn scaled(&self, factor: f32) -> Self {
        let mut result = self.clone();
        result.scale(factor);
        result
    }

    fn is_positive(&self) -> bool {
        self.total() > 0.0
    }
}

impl ContagionQuantity for f32 {
    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn accumulate(&mut self, other: &Self) {
        *self += *other;
    }

    #[inline]
    fn add_scalar(&mut self, value: f32) {
        *self += value;
    }

    #[inline]
    fn scale(&mut self, factor: f32) {
        *self *= factor;
    }

    #[inline]
    fn total(&self) -> f32 {
        *self
    }

    #[inline]
    fn scaled(&self, factor: f32) -> Self {
        *self * factor
    }
}

/// Dot product of a quantity vector with a row of scalar weights.
///
/// Terms are accumulated from the first to the last index.
pub fn dot<T: ContagionQuantity>(values: &[T], weights: &[f32]) -> T {
    debug_assert_eq!(values.len(), weights.len());
    values
        .iter()
        .zip(weights)
        .fold(T::zero(), |mut acc, (value, &weight)| {
            acc.accumulate(&value.scaled(weight));
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_algebra() {
        let mut amount = 2.0f32;
        amount.accumulate(&3.0);
        assert_eq!(amount, 5.0);
        amount.scale(0.5);
        assert_eq!(amount, 2.5);
        amount.add_scalar(1.0);
        assert_eq!(amount.total(), 3.5);
        assert!(amount.is_positive());
        assert!(!f32::zero().is_positive());
    }

    #[test]
    fn dot_matches_sequential_sum() {
        let values = [10.0f32, 0.0, 0.1];
        let weights = [0.5f32, 0.5, 0.3];
        let mut expected = 0.0f32;
        for (v, w) in values.iter().zip(weights.iter()) {
            expected += v * w;
        }
        assert_eq!(dot(&values, &weights).to_bits(), expected.to_bits());
    }

    #[test]
    fn dot_of_empty_is_zero() {
        let values: [f32; 0] = [];
        assert_eq!(dot(&values, &[]), 0.0);
    }
}
