// tests/config_profiles.rs

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};

use procwarden::args::{LauncherFlags, RuntimeProperties};
use procwarden::config::{load_and_validate, load_from_path};
use procwarden::errors::ProcwardenError;
use procwarden::exec::ExternalProcess;
use procwarden::platform::{OsFamily, Platform};
use procwarden::types::TimeUnit;

fn profile_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn write_profile(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("Procwarden.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_full_profile_configures_process() {
    let dir = TempDir::new().unwrap();
    let path = write_profile(
        dir.path(),
        r#"
[process]
command = "matcher $[--source ${source}] $[--extra ${extra}] ${!target}"
working_dir = "work"
timeout = 30
timeout_unit = "minutes"
signal_delay_ms = 250
join_timeout_ms = 1000
default_lookups = false

[env]
TOKENIZERS_PARALLELISM = "false"

[vars]
source = "a.rdf"

[paths]
target = "out/alignment.rdf"
"#,
    );

    let profile = load_and_validate(&path).unwrap();
    let process = profile
        .into_process(Platform::new(OsFamily::Linux), dir.path())
        .unwrap();

    assert_eq!(process.timeout(), (30, TimeUnit::Minutes));
    assert_eq!(process.timeout_as_text(), "30 minutes");
    assert_eq!(process.signal_delay(), Duration::from_millis(250));
    assert_eq!(process.join_timeout(), Duration::from_millis(1000));
    assert_eq!(process.working_directory(), Some(dir.path().join("work").as_path()));
    assert_eq!(
        process.environment().get("TOKENIZERS_PARALLELISM").map(String::as_str),
        Some("false")
    );

    let target = dir.path().join("out").join("alignment.rdf");
    assert_eq!(
        process.arguments().unwrap(),
        vec![
            "matcher".to_string(),
            "--source".to_string(),
            "a.rdf".to_string(),
            target.to_string_lossy().into_owned(),
        ]
    );
}

#[test]
fn test_profile_defaults() {
    let file = profile_file(
        r#"
[process]
command = "echo hi"
"#,
    );
    let profile = load_and_validate(file.path()).unwrap();
    assert_eq!(profile.process.timeout, 0);
    assert_eq!(profile.process.timeout_unit, TimeUnit::Seconds);
    assert_eq!(profile.process.signal_delay_ms, 3000);
    assert_eq!(profile.process.join_timeout_ms, 0);
    assert!(profile.process.default_lookups);
    assert!(profile.env.is_empty());
}

#[test]
fn test_caller_lookups_take_precedence_over_profile_vars() {
    let file = profile_file(
        r#"
[process]
command = "tool ${mode} ${prop}"
default_lookups = true

[vars]
mode = "from-profile"
"#,
    );
    let profile = load_and_validate(file.path()).unwrap();

    let mut process = ExternalProcess::with_platform(Platform::new(OsFamily::Linux));
    process.add_lookup(|name: &str| (name == "mode").then(|| "from-caller".to_string()));
    profile
        .apply_to(
            &mut process,
            Path::new("."),
            RuntimeProperties::system().with("prop", "defined"),
            LauncherFlags::new(["-mode=from-flags"]),
        )
        .unwrap();

    assert_eq!(
        process.arguments().unwrap(),
        vec!["tool", "from-caller", "defined"]
    );
}

#[test]
fn test_empty_command_returns_config_error() {
    let file = profile_file(
        r#"
[process]
command = "   "
"#,
    );
    match load_and_validate(file.path()) {
        Err(ProcwardenError::ConfigError(msg)) => assert!(msg.contains("must not be empty")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_command_with_only_an_empty_scope_has_no_arguments() {
    let file = profile_file(
        r#"
[process]
command = "$[ ]"
"#,
    );
    match load_and_validate(file.path()) {
        Err(ProcwardenError::ConfigError(msg)) => assert!(msg.contains("no arguments")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unbalanced_quote_in_command_is_reported() {
    let file = profile_file(
        r#"
[process]
command = "run 'oops"
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ProcwardenError::UnbalancedQuote { .. })
    ));
}

#[test]
fn test_unclosed_scope_in_command_is_reported() {
    let file = profile_file(
        r#"
[process]
command = "run $[ --flag"
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ProcwardenError::UnclosedScope { .. })
    ));
}

#[test]
fn test_name_in_vars_and_paths_returns_config_error() {
    let file = profile_file(
        r#"
[process]
command = "run ${out}"

[vars]
out = "x"

[paths]
out = "y"
"#,
    );
    match load_and_validate(file.path()) {
        Err(ProcwardenError::ConfigError(msg)) => assert!(msg.contains("'out'")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_invalid_env_name_returns_config_error() {
    let file = profile_file(
        r#"
[process]
command = "run"

[env]
"A=B" = "x"
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ProcwardenError::ConfigError(_))
    ));
}

#[test]
fn test_unknown_time_unit_is_a_toml_error() {
    let file = profile_file(
        r#"
[process]
command = "run"
timeout_unit = "fortnights"
"#,
    );
    assert!(matches!(
        load_from_path(file.path()),
        Err(ProcwardenError::TomlError(_))
    ));
}

#[test]
fn test_missing_profile_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        load_and_validate(dir.path().join("absent.toml")),
        Err(ProcwardenError::IoError(_))
    ));
}
