//! Utility modules.

pub mod settings;

pub use settings::{get_env_vars, Settings};
