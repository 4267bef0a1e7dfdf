pub mod args;
pub mod config;
pub mod core;
pub mod errors;
pub mod runner;

pub use errors::{ContagionError, Result};
