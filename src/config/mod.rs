//! Configuration model for crewfs.
//!
//! This module defines the Config struct that represents `<root>/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for every field, and validation of config values.

mod model;
mod operations;


pub use model::Config;
