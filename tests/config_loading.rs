use std::error::Error;
use std::fs;
use std::time::Duration;

use procqueue::cli::LogLevel;
use procqueue::config::{ConfigFile, load_and_validate, load_from_str, topological_order};
use procqueue::errors::ProcqueueError;
use procqueue::logging::resolve_level;
use procqueue::runner::build_operations;
use procqueue::Limit;
use procqueue_test_utils::builders::{ConfigFileBuilder, ProcedureConfigBuilder};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

const SAMPLE: &str = r#"
[queue]
name = "build"
max_concurrent = 2

[procedure.fetch]
cmd = "git fetch"

[procedure.build]
cmd = "cargo build"
after = ["fetch"]
timeout = "30s"

[procedure.lint]
cmd = "cargo clippy"
after = ["fetch"]
skip_if_dependencies_failed = false
"#;

fn config_error(result: Result<ConfigFile, ProcqueueError>) -> String {
    match result {
        Err(ProcqueueError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn loads_and_validates_a_file_on_disk() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("Procqueue.toml");
    fs::write(&path, SAMPLE)?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.queue().effective_name(), "build");
    assert_eq!(cfg.queue().limit(), Limit::from(2usize));
    assert_eq!(cfg.procedures().len(), 3);

    let build = cfg.procedure("build").ok_or("missing build")?;
    assert_eq!(build.after, vec!["fetch".to_string()]);
    assert!(build.skip_if_dependencies_failed);
    assert_eq!(build.timeout_duration(), Some(Duration::from_secs(30)));

    let lint = cfg.procedure("lint").ok_or("missing lint")?;
    assert!(!lint.skip_if_dependencies_failed);

    assert_eq!(cfg.order().first().map(String::as_str), Some("fetch"));
    Ok(())
}

#[test]
fn queue_section_defaults() -> TestResult {
    let raw = load_from_str("[procedure.only]\ncmd = \"true\"\n")?;
    let cfg = ConfigFile::try_from(raw)?;

    assert_eq!(cfg.queue().effective_name(), "procqueue");
    assert_eq!(cfg.queue().limit(), Limit::Default);
    Ok(())
}

#[test]
fn zero_max_concurrent_means_unlimited() {
    let cfg = ConfigFileBuilder::new()
        .with_max_concurrent(0)
        .with_procedure("a", ProcedureConfigBuilder::new("true").build())
        .build();

    assert_eq!(cfg.queue().limit(), Limit::None);
    assert_eq!(Limit::None.resolve(), None);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let result = load_and_validate(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ProcqueueError::IoError(_))));
}

#[test]
fn malformed_toml_is_rejected() {
    let result = load_from_str("[procedure.a\ncmd = ");
    assert!(matches!(result, Err(ProcqueueError::TomlError(_))));
}

#[test]
fn empty_file_is_rejected() {
    let raw = ConfigFileBuilder::new().build_raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert!(msg.contains("at least one"));
}

#[test]
fn empty_command_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_procedure("blank", ProcedureConfigBuilder::new("   ").build())
        .build_raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert!(msg.contains("blank"));
    assert!(msg.contains("empty `cmd`"));
}

#[test]
fn bad_timeout_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_procedure("slow", ProcedureConfigBuilder::new("true").timeout("10 parsecs").build())
        .build_raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert!(msg.contains("invalid `timeout`"));
}

#[test]
fn overflowing_timeout_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_procedure(
            "forever",
            ProcedureConfigBuilder::new("true").timeout("18446744073709551h").build(),
        )
        .build_raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert!(msg.contains("invalid `timeout`"));
    assert!(msg.contains("too large"));
}

#[test]
fn unknown_dependency_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_procedure("a", ProcedureConfigBuilder::new("true").after("ghost").build())
        .build_raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert!(msg.contains("unknown dependency 'ghost'"));
}

#[test]
fn self_dependency_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_procedure("a", ProcedureConfigBuilder::new("true").after("a").build())
        .build_raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert!(msg.contains("cannot depend on itself"));
}

#[test]
fn cycle_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_procedure("a", ProcedureConfigBuilder::new("true").after("c").build())
        .with_procedure("b", ProcedureConfigBuilder::new("true").after("a").build())
        .with_procedure("c", ProcedureConfigBuilder::new("true").after("b").build())
        .build_raw();

    let result = ConfigFile::try_from(raw);
    assert!(matches!(result, Err(ProcqueueError::DagCycle(_))));
}

#[test]
fn topological_order_puts_dependencies_first() -> TestResult {
    let raw = ConfigFileBuilder::new()
        .with_procedure("deploy", ProcedureConfigBuilder::new("true").after("test").build())
        .with_procedure("test", ProcedureConfigBuilder::new("true").after("build").build())
        .with_procedure("build", ProcedureConfigBuilder::new("true").build())
        .with_procedure("docs", ProcedureConfigBuilder::new("true").after("build").build())
        .build_raw();

    let order = topological_order(&raw.procedure)?;
    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();

    assert_eq!(order.len(), 4);
    assert!(pos("build") < pos("test"));
    assert!(pos("test") < pos("deploy"));
    assert!(pos("build") < pos("docs"));
    Ok(())
}

#[test]
fn build_operations_wires_dependencies() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_procedure("fetch", ProcedureConfigBuilder::new("true").build())
        .with_procedure(
            "build",
            ProcedureConfigBuilder::new("true").after("fetch").timeout("5s").build(),
        )
        .build();

    let operations = build_operations(&cfg)?;
    let names: Vec<&str> = operations.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["fetch", "build"]);

    let (_, fetch) = &operations[0];
    let (_, build) = &operations[1];
    assert_eq!(build.name(), "build");
    assert_eq!(build.dependency_ids(), vec![fetch.id()]);
    assert!(fetch.dependency_ids().is_empty());
    Ok(())
}

#[test]
fn log_level_resolution_prefers_cli_then_env() {
    assert_eq!(
        resolve_level(Some(LogLevel::Trace), Some("error")),
        tracing::Level::TRACE
    );
    assert_eq!(resolve_level(None, Some("warning")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some(" DEBUG ")), tracing::Level::DEBUG);
    assert_eq!(resolve_level(None, Some("loud")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}
