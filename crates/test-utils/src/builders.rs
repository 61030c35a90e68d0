#![allow(dead_code)]

use procqueue::config::{ConfigFile, ProcedureConfig, QueueSection, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                queue: QueueSection::default(),
                procedure: Default::default(),
            },
        }
    }

    pub fn with_procedure(mut self, name: &str, procedure: ProcedureConfig) -> Self {
        self.config.procedure.insert(name.to_string(), procedure);
        self
    }

    pub fn with_queue_name(mut self, name: &str) -> Self {
        self.config.queue.name = Some(name.to_string());
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.config.queue.max_concurrent = Some(max);
        self
    }

    /// The raw file, for tests that exercise validation failures.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ProcedureConfig`.
pub struct ProcedureConfigBuilder {
    procedure: ProcedureConfig,
}

impl ProcedureConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            procedure: ProcedureConfig {
                cmd: cmd.to_string(),
                after: vec![],
                skip_if_dependencies_failed: true,
                timeout: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.procedure.after.push(dep.to_string());
        self
    }

    pub fn skip_if_dependencies_failed(mut self, val: bool) -> Self {
        self.procedure.skip_if_dependencies_failed = val;
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.procedure.timeout = Some(duration.to_string());
        self
    }

    pub fn build(self) -> ProcedureConfig {
        self.procedure
    }
}
