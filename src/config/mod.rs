//! Configuration of the transmission groups setup phase.

mod settings;

pub use settings::{Normalization, PropertySettings, Settings, SettingsError};
