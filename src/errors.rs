//! All errors that can occur in the contagion library.

use std::fmt;

pub type Result<T> = std::result::Result<T, ContagionError>;

#[derive(Clone, Debug, PartialEq)]
pub enum ContagionError {
    DuplicateProperty {
        name: String,
    },
    InvalidValueList {
        name: String,
    },
    InvalidScalingMatrix {
        name: String,
        expected: usize,
        rows: usize,
        columns: usize,
    },
    InvalidScalingWeight {
        name: String,
        row: usize,
        column: usize,
        weight: f32,
    },
    AntigenOutOfRange {
        antigen: u32,
        antigen_count: usize,
    },
    GroupOutOfRange {
        group: usize,
        group_count: usize,
    },
    UnknownPropertyValue {
        name: String,
        value: String,
    },
    IllegalOperation(String),
    InitializationError(String),
}

impl fmt::Display for ContagionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContagionError::DuplicateProperty { name } => {
                write!(f, "ConfigurationError: Duplicated property name {}", name)
            }
            ContagionError::InvalidValueList { name } => {
                write!(
                    f,
                    "ConfigurationError: Property {} needs a non-empty list of distinct values",
                    name
                )
            }
            ContagionError::InvalidScalingMatrix {
                name,
                expected,
                rows,
                columns,
            } => write!(
                f,
                "ConfigurationError: Scaling matrix for property {} is {}x{} but {} has {} values",
                name, rows, columns, name, expected
            ),
            ContagionError::InvalidScalingWeight {
                name,
                row,
                column,
                weight,
            } => write!(
                f,
                "ConfigurationError: Scaling matrix for property {} has invalid weight {} at [{}][{}]",
                name, weight, row, column
            ),
            ContagionError::AntigenOutOfRange {
                antigen,
                antigen_count,
            } => write!(
                f,
                "OutOfRange: Strain antigen ID ({}) >= configured number of strains ({})",
                antigen, antigen_count
            ),
            ContagionError::GroupOutOfRange { group, group_count } => write!(
                f,
                "OutOfRange: Group index ({}) >= number of groups ({})",
                group, group_count
            ),
            ContagionError::UnknownPropertyValue { name, value } => write!(
                f,
                "BadMapKey: Value {} is not known for property {}",
                value, name
            ),
            ContagionError::IllegalOperation(message) => {
                write!(f, "IllegalOperation: {}", message)
            }
            ContagionError::InitializationError(message) => {
                write!(f, "InitializationError: {}", message)
            }
        }
    }
}

impl std::error::Error for ContagionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let error = ContagionError::AntigenOutOfRange {
            antigen: 3,
            antigen_count: 3,
        };
        assert_eq!(
            error.to_string(),
            "OutOfRange: Strain antigen ID (3) >= configured number of strains (3)"
        );

        let error = ContagionError::InvalidScalingMatrix {
            name: "Risk".to_string(),
            expected: 2,
            rows: 3,
            columns: 2,
        };
        assert!(error.to_string().contains("3x2"));
    }
}
