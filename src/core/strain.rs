//! Strain identity of a pathogen variant.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifies a pathogen variant by antigen and genetic substrain.
///
/// Contagion is partitioned first by antigen, the genetic ID distinguishes substrains within one
/// antigen.
#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[display("{antigen_id}:{genetic_id}")]
pub struct StrainIdentity {
    antigen_id: u32,
    genetic_id: u32,
}

impl StrainIdentity {
    pub fn new(antigen_id: u32, genetic_id: u32) -> Self {
        Self {
            antigen_id,
            genetic_id,
        }
    }

    pub fn antigen_id(&self) -> u32 {
        self.antigen_id
    }

    pub fn genetic_id(&self) -> u32 {
        self.genetic_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn usable_as_key() {
        let mut map = HashMap::new();
        map.insert(StrainIdentity::new(0, 5), 1.0f32);
        map.insert(StrainIdentity::new(1, 5), 2.0f32);
        assert_eq!(map[&StrainIdentity::new(0, 5)], 1.0);
        assert_eq!(map[&StrainIdentity::new(1, 5)], 2.0);
    }

    #[test]
    fn display() {
        assert_eq!(StrainIdentity::new(2, 7).to_string(), "2:7");
    }
}
