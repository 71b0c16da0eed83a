// tests/launch_environment.rs

use std::collections::HashMap;
use std::path::Path;

use tempfile::TempDir;

use procwarden::exec::conda::{activation_dirs, augment_path};
use procwarden::exec::launch_command;
use procwarden::platform::{OsFamily, Platform};

const LINUX: Platform = Platform::new(OsFamily::Linux);
const WINDOWS: Platform = Platform::new(OsFamily::Windows);
const MACOS: Platform = Platform::new(OsFamily::OtherUnix);

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn launch_command_prefixes_setsid_only_where_sessions_exist() {
    let resolved = args(&["python", "run.py"]);
    assert_eq!(launch_command(&LINUX, &resolved), args(&["setsid", "python", "run.py"]));
    assert_eq!(launch_command(&MACOS, &resolved), resolved);
    assert_eq!(launch_command(&WINDOWS, &resolved), resolved);
}

#[test]
fn platform_capabilities() {
    assert!(LINUX.supports_sessions());
    assert!(!MACOS.supports_sessions());
    assert!(!WINDOWS.supports_sessions());
    assert_eq!(LINUX.path_list_separator(), ':');
    assert_eq!(WINDOWS.path_list_separator(), ';');
    assert_eq!(Platform::current(), Platform::default());
}

#[test]
fn conda_activation_dirs_per_platform() {
    let prefix = Path::new("env");
    assert_eq!(activation_dirs(&LINUX, prefix), vec![prefix.join("bin")]);
    assert_eq!(
        activation_dirs(&WINDOWS, prefix),
        vec![
            prefix.join("Library").join("mingw-w64").join("bin"),
            prefix.join("Library").join("usr").join("bin"),
            prefix.join("Library").join("bin"),
            prefix.join("Scripts"),
            prefix.join("bin"),
        ]
    );
}

#[test]
fn augment_path_prepends_env_dirs_to_override() {
    let dir = TempDir::new().unwrap();
    let python = dir.path().join("python");
    std::fs::write(&python, "").unwrap();

    let mut env = HashMap::from([("PATH".to_string(), "/custom/bin".to_string())]);
    augment_path(&LINUX, &python.to_string_lossy(), &mut env);

    let expected = format!("{}:/custom/bin", dir.path().join("bin").display());
    assert_eq!(env.get("PATH"), Some(&expected));
}

#[test]
fn augment_path_falls_back_to_inherited_path() {
    let dir = TempDir::new().unwrap();
    let python = dir.path().join("python");
    std::fs::write(&python, "").unwrap();

    let mut env = HashMap::new();
    augment_path(&LINUX, &python.to_string_lossy(), &mut env);

    let path = env.get("PATH").expect("PATH set");
    let first = dir.path().join("bin").display().to_string();
    assert!(path.starts_with(&first), "unexpected PATH {path}");
    if let Ok(inherited) = std::env::var("PATH") {
        assert_eq!(*path, format!("{first}:{inherited}"));
    }
}

#[test]
fn augment_path_ignores_missing_executable() {
    let mut env = HashMap::new();
    augment_path(&LINUX, "/no/such/python3", &mut env);
    assert!(env.is_empty());
}
