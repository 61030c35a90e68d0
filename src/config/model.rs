// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{Limit, parse_duration};

/// Procedure file as read from TOML, before validation.
///
/// ```toml
/// [queue]
/// name = "build"
/// max_concurrent = 2
///
/// [procedure.fetch]
/// cmd = "git fetch"
///
/// [procedure.build]
/// cmd = "cargo build"
/// after = ["fetch"]
/// timeout = "30s"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub queue: QueueSection,

    /// Keys are procedure names.
    #[serde(default)]
    pub procedure: BTreeMap<String, ProcedureConfig>,
}

/// `[queue]` section.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct QueueSection {
    #[serde(default)]
    pub name: Option<String>,

    /// `0` means unlimited; omitted means the machine's available
    /// parallelism.
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

impl QueueSection {
    pub fn limit(&self) -> Limit {
        match self.max_concurrent {
            None => Limit::Default,
            Some(max) => Limit::from(max),
        }
    }

    pub fn effective_name(&self) -> &str {
        self.name.as_deref().unwrap_or("procqueue")
    }
}

/// `[procedure.<name>]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProcedureConfig {
    /// Shell command to run.
    pub cmd: String,

    /// Procedures that must finish first.
    #[serde(default)]
    pub after: Vec<String>,

    /// Skip this procedure (cancelled with an error) if any procedure in
    /// `after` failed.
    #[serde(default = "default_skip_if_dependencies_failed")]
    pub skip_if_dependencies_failed: bool,

    /// Optional deadline once the command has started, e.g. `"30s"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_skip_if_dependencies_failed() -> bool {
    true
}

impl ProcedureConfig {
    /// Parsed `timeout`. Validation guarantees the string parses.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
            .as_deref()
            .and_then(|timeout| parse_duration(timeout).ok())
    }
}

/// Validated procedure file. Only constructed through
/// `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    queue: QueueSection,
    procedure: BTreeMap<String, ProcedureConfig>,
    order: Vec<String>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        queue: QueueSection,
        procedure: BTreeMap<String, ProcedureConfig>,
        order: Vec<String>,
    ) -> Self {
        Self {
            queue,
            procedure,
            order,
        }
    }

    pub fn queue(&self) -> &QueueSection {
        &self.queue
    }

    pub fn procedures(&self) -> &BTreeMap<String, ProcedureConfig> {
        &self.procedure
    }

    pub fn procedure(&self, name: &str) -> Option<&ProcedureConfig> {
        self.procedure.get(name)
    }

    /// Procedure names, dependencies before dependents.
    pub fn order(&self) -> &[String] {
        &self.order
    }
}
