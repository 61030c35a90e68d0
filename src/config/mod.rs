// src/config/mod.rs

//! Procedure files for the command-line runner.
//!
//! - `model.rs`: TOML-backed data model.
//! - `loader.rs`: reading files from disk.
//! - `validate.rs`: graph and field validation, turning a
//!   [`RawConfigFile`] into a [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, ProcedureConfig, QueueSection, RawConfigFile};
pub use validate::topological_order;
