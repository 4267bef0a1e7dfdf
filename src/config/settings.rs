//! Settings module.

use serde::{Deserialize, Serialize};
use std::fs;

use crate::core::{ContagionQuantity, TransmissionGroups, TransmissionGroupsBuilder};

fn default_tag() -> String {
    "contact".to_string()
}

fn default_decay_rate() -> f32 {
    1.0
}

fn default_count() -> usize {
    1
}

/// Population used to normalize the force of infection.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    #[default]
    TotalPopulation,
    GroupPopulation,
}

/// A categorical host property with its `[source][destination]` scaling matrix.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PropertySettings {
    pub name: String,
    pub values: Vec<String>,
    pub matrix: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,
    #[serde(default = "default_count")]
    pub antigen_count: usize,
    #[serde(default = "default_count")]
    pub substrain_count: usize,
    #[serde(default)]
    pub normalization: Normalization,
    #[serde(default)]
    pub properties: Vec<PropertySettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tag: default_tag(),
            decay_rate: default_decay_rate(),
            antigen_count: default_count(),
            substrain_count: default_count(),
            normalization: Normalization::default(),
            properties: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum SettingsError {
    IoError(std::io::Error),
    YamlError(serde_yaml::Error),
}

impl std::error::Error for SettingsError {}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::IoError(error) => write!(formatter, "IO error: {}", error),
            SettingsError::YamlError(error) => write!(formatter, "YAML error: {}", error),
        }
    }
}

impl std::fmt::Display for Settings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut output = vec![];
        self.write(&mut output).map_err(|_| std::fmt::Error)?;
        let output = String::from_utf8(output).map_err(|_| std::fmt::Error)?;
        write!(formatter, "{}", output)
    }
}

impl Settings {
    pub fn write(&self, writer: &mut dyn std::io::Write) -> Result<(), SettingsError> {
        serde_yaml::to_writer(writer, self).map_err(SettingsError::YamlError)
    }

    pub fn read(reader: &mut dyn std::io::Read) -> Result<Settings, SettingsError> {
        serde_yaml::from_reader(reader).map_err(SettingsError::YamlError)
    }

    pub fn write_to_file(&self, filename: &str) -> Result<(), SettingsError> {
        let file = fs::File::create(filename).map_err(SettingsError::IoError)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write(&mut writer)
    }

    pub fn read_from_file(filename: &str) -> Result<Settings, SettingsError> {
        let file = fs::File::open(filename).map_err(SettingsError::IoError)?;
        let mut reader = std::io::BufReader::new(file);
        Self::read(&mut reader)
    }

    /// Setup phase with every configured property registered.
    pub fn builder(&self) -> crate::errors::Result<TransmissionGroupsBuilder> {
        let mut builder = TransmissionGroupsBuilder::new();
        builder.set_tag(self.tag.as_str());
        match self.normalization {
            Normalization::TotalPopulation => builder.use_total_population_for_normalization(),
            Normalization::GroupPopulation => builder.use_group_population_for_normalization(),
        }
        for property in self.properties.iter() {
            builder.add_property(
                &property.name,
                property.values.iter().cloned(),
                &property.matrix,
            )?;
        }
        Ok(builder)
    }

    pub fn build<T: ContagionQuantity>(&self) -> crate::errors::Result<TransmissionGroups<T>> {
        self.builder()?
            .build(self.decay_rate, self.antigen_count, self.substrain_count)
    }
}
