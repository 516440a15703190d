// ABOUTME: Configuration helpers shared by the Crowbox crates
// ABOUTME: Environment variable names plus typed parsing with logged fallbacks

pub mod constants;
pub mod env;

pub use env::{parse_env_or_default_with_validation, parse_env_string};
