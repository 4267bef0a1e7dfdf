//! Property-to-group mapping and scaling matrix composition
//!
//! Hosts carry categorical properties (age band, risk group, spatial cell, ...). Each registered
//! property brings its own `N x N` scaling matrix with entry `[source][destination]` describing how
//! much contagion shed by hosts with the source value reaches hosts with the destination value.
//!
//! During setup all registered properties are combined into one linear group index and one
//! cumulative mixing matrix. Properties are folded in registration order: a property registered
//! while the cumulative matrix has size `M` assigns the offset `k * M` to its value at index `k`,
//! and the cumulative matrix grows by a Kronecker product with that property's matrix. The
//! composed matrix is stored by destination, i.e. row `i` holds the weights with which every source
//! group contributes to destination group `i`.

use derive_more::{Display, From, Into};
use ndarray::Array2;
use smallvec::{SmallVec, smallvec};
use std::collections::HashMap;

use crate::errors::{ContagionError, Result};

/// Linear index of a transmission group.
#[derive(Clone, Copy, Debug, Default, Display, From, Into, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupIndex(usize);

impl GroupIndex {
    pub fn new(index: usize) -> Self {
        GroupIndex(index)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Group indices matching one property value.
pub type GroupIndices = SmallVec<[usize; 8]>;

#[derive(Clone, Debug, PartialEq)]
struct PropertyDefinition {
    name: String,
    values: Vec<String>,
    matrix: Array2<f32>,
}

/// Registry of properties during the setup phase.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyRegistry {
    properties: Vec<PropertyDefinition>,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Register a property with its values and `[source][destination]` scaling matrix.
    pub fn add_property<S: Into<String>>(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = S>,
        scaling_matrix: &[Vec<f32>],
    ) -> Result<()> {
        log::debug!("Adding property {}", name);

        if self.properties.iter().any(|p| p.name == name) {
            return Err(ContagionError::DuplicateProperty {
                name: name.to_string(),
            });
        }

        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(ContagionError::InvalidValueList {
                name: name.to_string(),
            });
        }
        for (index, value) in values.iter().enumerate() {
            if values[..index].contains(value) {
                return Err(ContagionError::InvalidValueList {
                    name: name.to_string(),
                });
            }
        }

        let n_values = values.len();
        let invalid_matrix = |columns: usize| ContagionError::InvalidScalingMatrix {
            name: name.to_string(),
            expected: n_values,
            rows: scaling_matrix.len(),
            columns,
        };
        if scaling_matrix.len() != n_values {
            let columns = scaling_matrix.first().map_or(0, Vec::len);
            return Err(invalid_matrix(columns));
        }
        if let Some(row) = scaling_matrix.iter().find(|row| row.len() != n_values) {
            return Err(invalid_matrix(row.len()));
        }

        if let Some((row, column)) = (0..n_values)
            .flat_map(|i| (0..n_values).map(move |j| (i, j)))
            .find(|&(i, j)| {
                let weight = scaling_matrix[i][j];
                !weight.is_finite() || weight < 0.0
            })
        {
            return Err(ContagionError::InvalidScalingWeight {
                name: name.to_string(),
                row,
                column,
                weight: scaling_matrix[row][column],
            });
        }

        let matrix = Array2::from_shape_fn((n_values, n_values), |(i, j)| scaling_matrix[i][j]);

        self.properties.push(PropertyDefinition {
            name: name.to_string(),
            values,
            matrix,
        });
        Ok(())
    }

    /// Compose all registered properties into a group mapper.
    pub fn build(self) -> GroupMapper {
        log::debug!("Building scaling matrix for {} properties", self.properties.len());

        let mut cumulative = Array2::<f32>::ones((1, 1));
        let mut offsets = HashMap::with_capacity(self.properties.len());
        let mut properties = Vec::with_capacity(self.properties.len());

        for property in self.properties {
            let current_size = cumulative.nrows();
            let value_offsets: HashMap<String, usize> = property
                .values
                .iter()
                .enumerate()
                .map(|(k, value)| (value.clone(), k * current_size))
                .collect();
            cumulative = aggregate(&property.matrix, &cumulative);
            offsets.insert(property.name.clone(), value_offsets);
            properties.push((property.name, property.values));
        }

        GroupMapper {
            properties,
            offsets,
            mixing_matrix: cumulative,
        }
    }
}

/// Fold a `[source][destination]` property matrix into a cumulative `[destination][source]`
/// matrix. The property becomes the slow index of the result.
fn aggregate(property: &Array2<f32>, cumulative: &Array2<f32>) -> Array2<f32> {
    let n = property.nrows();
    let m = cumulative.nrows();
    Array2::from_shape_fn((n * m, n * m), |(i, j)| {
        let (dst_value, dst_inner) = (i / m, i % m);
        let (src_value, src_inner) = (j / m, j % m);
        property[[src_value, dst_value]] * cumulative[[dst_inner, src_inner]]
    })
}

/// Mapping of host properties to group indices and the composed mixing matrix.
///
/// Created by `PropertyRegistry::build` and immutable afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupMapper {
    properties: Vec<(String, Vec<String>)>,
    offsets: HashMap<String, HashMap<String, usize>>,
    mixing_matrix: Array2<f32>,
}

impl Default for GroupMapper {
    fn default() -> Self {
        PropertyRegistry::new().build()
    }
}

impl GroupMapper {
    pub fn group_count(&self) -> usize {
        self.mixing_matrix.nrows()
    }

    /// Mixing matrix with rows by destination group.
    pub fn mixing_matrix(&self) -> &Array2<f32> {
        &self.mixing_matrix
    }

    /// Mixing weights from every source group into group `destination`.
    pub fn mixing_row(&self, destination: usize) -> &[f32] {
        let columns = self.group_count();
        let begin = destination * columns;
        // standard layout is guaranteed by construction
        &self.mixing_matrix.as_slice().unwrap_or(&[])[begin..begin + columns]
    }

    /// Registered property names in registration order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.offsets.contains_key(name)
    }

    /// Offset contributed by `value` of property `name`.
    pub fn offset(&self, name: &str, value: &str) -> Option<usize> {
        self.offsets.get(name).and_then(|values| values.get(value)).copied()
    }

    /// Group membership of a host with the given properties.
    ///
    /// Property names that are not registered are ignored. A registered property with an unknown
    /// value is an error.
    pub fn group_for_properties<K, V>(
        &self,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<GroupIndex>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut group = 0;
        for (name, value) in properties {
            let (name, value) = (name.as_ref(), value.as_ref());
            match self.offsets.get(name) {
                Some(values) => {
                    let offset = values.get(value).ok_or_else(|| {
                        ContagionError::UnknownPropertyValue {
                            name: name.to_string(),
                            value: value.to_string(),
                        }
                    })?;
                    log::trace!("Increasing group membership ({}={}) by {}", name, value, offset);
                    group += offset;
                }
                None => log::trace!("Property {} not used for transmission groups", name),
            }
        }
        Ok(GroupIndex(group))
    }

    /// All groups whose `name` property equals `value`.
    ///
    /// If `name` is not registered it does not partition the groups, and every group matches.
    pub fn group_indices_for_property(&self, name: &str, value: &str) -> Result<GroupIndices> {
        let mut indices: GroupIndices = smallvec![0];
        for (property, values) in self.properties.iter() {
            if property == name {
                let offset = self.offset(name, value).ok_or_else(|| {
                    ContagionError::UnknownPropertyValue {
                        name: name.to_string(),
                        value: value.to_string(),
                    }
                })?;
                indices.iter_mut().for_each(|index| *index += offset);
            } else {
                let previous = std::mem::take(&mut indices);
                for other in values {
                    // every value of a registered property has an offset
                    let offset = self.offset(property, other).unwrap_or_default();
                    indices.extend(previous.iter().map(|index| index + offset));
                }
            }
        }
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(n: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect()
    }

    #[test]
    fn no_properties_single_group() {
        let mapper = PropertyRegistry::new().build();
        assert_eq!(mapper.group_count(), 1);
        assert_eq!(mapper.mixing_row(0), &[1.0]);
        let bag: [(&str, &str); 0] = [];
        assert_eq!(mapper.group_for_properties(bag).unwrap().index(), 0);
    }

    #[test]
    fn duplicate_property_name() {
        let mut registry = PropertyRegistry::new();
        registry
            .add_property("Risk", ["Low", "High"], &identity(2))
            .unwrap();
        let result = registry.add_property("Risk", ["Low", "High"], &identity(2));
        assert_eq!(
            result,
            Err(ContagionError::DuplicateProperty {
                name: "Risk".to_string()
            })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn mismatched_matrix() {
        let mut registry = PropertyRegistry::new();
        let result = registry.add_property("Risk", ["Low", "High"], &identity(3));
        assert!(matches!(
            result,
            Err(ContagionError::InvalidScalingMatrix {
                expected: 2,
                rows: 3,
                ..
            })
        ));

        let ragged = vec![vec![1.0, 0.0], vec![1.0]];
        let result = registry.add_property("Risk", ["Low", "High"], &ragged);
        assert!(matches!(
            result,
            Err(ContagionError::InvalidScalingMatrix { columns: 1, .. })
        ));
    }

    #[test]
    fn negative_or_non_finite_weights() {
        let mut registry = PropertyRegistry::new();
        let result =
            registry.add_property("Risk", ["Low", "High"], &[vec![1.0, -1.0], vec![0.0, 1.0]]);
        assert_eq!(
            result,
            Err(ContagionError::InvalidScalingWeight {
                name: "Risk".to_string(),
                row: 0,
                column: 1,
                weight: -1.0
            })
        );

        let result = registry.add_property(
            "Risk",
            ["Low", "High"],
            &[vec![1.0, 0.0], vec![f32::INFINITY, 1.0]],
        );
        assert!(matches!(
            result,
            Err(ContagionError::InvalidScalingWeight { row: 1, column: 0, .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn empty_value_list() {
        let mut registry = PropertyRegistry::new();
        let values: [&str; 0] = [];
        let result = registry.add_property("Risk", values, &[]);
        assert!(matches!(result, Err(ContagionError::InvalidValueList { .. })));

        let result = registry.add_property("Risk", ["Low", "Low"], &identity(2));
        assert!(matches!(result, Err(ContagionError::InvalidValueList { .. })));
    }

    #[test]
    fn offsets_follow_registration_order() {
        let mut registry = PropertyRegistry::new();
        registry
            .add_property("Risk", ["High", "Medium", "Low"], &identity(3))
            .unwrap();
        registry
            .add_property("Location", ["A", "B", "C", "D"], &identity(4))
            .unwrap();
        let mapper = registry.build();

        assert_eq!(mapper.group_count(), 12);
        assert_eq!(mapper.offset("Risk", "Low"), Some(2));
        assert_eq!(mapper.offset("Location", "B"), Some(3));
        assert_eq!(mapper.offset("Location", "D"), Some(9));

        let group = mapper
            .group_for_properties([("Risk", "Medium"), ("Location", "C")])
            .unwrap();
        assert_eq!(group.index(), 7);
    }

    #[test]
    fn unregistered_properties_are_ignored() {
        let mut registry = PropertyRegistry::new();
        registry
            .add_property("Risk", ["Low", "High"], &identity(2))
            .unwrap();
        let mapper = registry.build();

        let group = mapper
            .group_for_properties([("Age", "Old"), ("Risk", "High")])
            .unwrap();
        assert_eq!(group.index(), 1);

        let group = mapper.group_for_properties([("Age", "Old")]).unwrap();
        assert_eq!(group.index(), 0);
    }

    #[test]
    fn unknown_value_is_error() {
        let mut registry = PropertyRegistry::new();
        registry
            .add_property("Risk", ["Low", "High"], &identity(2))
            .unwrap();
        let mapper = registry.build();

        let result = mapper.group_for_properties([("Risk", "Extreme")]);
        assert_eq!(
            result,
            Err(ContagionError::UnknownPropertyValue {
                name: "Risk".to_string(),
                value: "Extreme".to_string()
            })
        );
    }

    #[test]
    fn kronecker_composition_is_by_destination() {
        let mut registry = PropertyRegistry::new();
        // [source][destination]
        registry
            .add_property("Risk", ["Low", "High"], &[vec![1.0, 0.5], vec![0.0, 2.0]])
            .unwrap();
        registry
            .add_property("Place", ["In", "Out"], &[vec![0.75, 0.25], vec![0.0, 1.0]])
            .unwrap();
        let mapper = registry.build();

        assert_eq!(mapper.group_count(), 4);
        // destination (High, In) = 1, source (Low, In) = 0
        assert_eq!(mapper.mixing_matrix()[[1, 0]], 0.5 * 0.75);
        // destination (Low, Out) = 2, source (Low, In) = 0
        assert_eq!(mapper.mixing_matrix()[[2, 0]], 1.0 * 0.25);
        // destination (Low, In) = 0, source (Low, Out) = 2
        assert_eq!(mapper.mixing_matrix()[[0, 2]], 0.0);
        // destination (High, Out) = 3
        assert_eq!(mapper.mixing_row(3), &[0.5 * 0.25, 2.0 * 0.25, 0.5, 2.0]);
    }

    #[test]
    fn indices_for_property() {
        let mut registry = PropertyRegistry::new();
        registry
            .add_property("Risk", ["High", "Medium", "Low"], &identity(3))
            .unwrap();
        registry
            .add_property("Location", ["A", "B", "C", "D"], &identity(4))
            .unwrap();
        let mapper = registry.build();

        let mut indices = mapper.group_indices_for_property("Risk", "Low").unwrap();
        indices.sort();
        assert_eq!(indices.as_slice(), &[2, 5, 8, 11]);

        let mut indices = mapper.group_indices_for_property("Location", "B").unwrap();
        indices.sort();
        assert_eq!(indices.as_slice(), &[3, 4, 5]);

        let indices = mapper.group_indices_for_property("Age", "Old").unwrap();
        assert_eq!(indices.len(), 12);

        assert!(mapper.group_indices_for_property("Risk", "None").is_err());
    }
}
