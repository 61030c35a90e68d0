// src/config/validate.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, ProcedureConfig, RawConfigFile};
use crate::errors::{ProcqueueError, Result};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ProcqueueError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let order = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.queue, raw.procedure, order))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<Vec<String>> {
    ensure_has_procedures(cfg)?;
    validate_procedures(cfg)?;
    validate_dependencies(cfg)?;
    topological_order(&cfg.procedure)
}

fn ensure_has_procedures(cfg: &RawConfigFile) -> Result<()> {
    if cfg.procedure.is_empty() {
        return Err(ProcqueueError::ConfigError(
            "config must contain at least one [procedure.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_procedures(cfg: &RawConfigFile) -> Result<()> {
    for (name, procedure) in cfg.procedure.iter() {
        if procedure.cmd.trim().is_empty() {
            return Err(ProcqueueError::ConfigError(format!(
                "procedure '{}' has an empty `cmd`",
                name
            )));
        }
        if let Some(timeout) = procedure.timeout.as_deref() {
            parse_duration(timeout).map_err(|err| {
                ProcqueueError::ConfigError(format!(
                    "procedure '{}' has invalid `timeout`: {}",
                    name, err
                ))
            })?;
        }
    }
    Ok(())
}

fn validate_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, procedure) in cfg.procedure.iter() {
        for dep in procedure.after.iter() {
            if dep == name {
                return Err(ProcqueueError::ConfigError(format!(
                    "procedure '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !cfg.procedure.contains_key(dep) {
                return Err(ProcqueueError::ConfigError(format!(
                    "procedure '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

/// Topological order of the procedure graph, failing on a cycle.
///
/// Edge direction is dependency -> dependent, so `after = ["A"]` on `B`
/// adds `A -> B`.
pub fn topological_order(procedures: &BTreeMap<String, ProcedureConfig>) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in procedures.keys() {
        graph.add_node(name.as_str());
    }

    for (name, procedure) in procedures.iter() {
        for dep in procedure.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(ProcqueueError::DagCycle(format!(
            "cycle detected in procedure graph involving '{}'",
            cycle.node_id()
        ))),
    }
}
