// src/exec/conda.rs

//! `PATH` augmentation for interpreters living inside a conda environment.
//!
//! Running `<env>/bin/python` directly skips `conda activate`, so native
//! libraries of the environment are not found. We mimic the relevant part of
//! activation by prepending the environment's binary directories to `PATH`
//! for the spawned process only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::platform::Platform;

/// Directories activation would prepend for an environment rooted at `prefix`.
pub fn activation_dirs(platform: &Platform, prefix: &Path) -> Vec<PathBuf> {
    if platform.is_windows() {
        vec![
            prefix.join("Library").join("mingw-w64").join("bin"),
            prefix.join("Library").join("usr").join("bin"),
            prefix.join("Library").join("bin"),
            prefix.join("Scripts"),
            prefix.join("bin"),
        ]
    } else {
        vec![prefix.join("bin")]
    }
}

/// Prepend the activation directories of `executable`'s parent to `PATH`.
///
/// The base `PATH` is the override in `env` if present, otherwise the
/// inherited one. Best-effort: nothing happens if the executable does not
/// exist or has no parent directory.
pub fn augment_path(platform: &Platform, executable: &str, env: &mut HashMap<String, String>) {
    let executable = Path::new(executable);
    if !executable.exists() {
        debug!(executable = %executable.display(), "python executable not found; PATH left unchanged");
        return;
    }
    let Some(prefix) = executable.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };

    let mut entries: Vec<String> = activation_dirs(platform, prefix)
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    let base = env
        .get("PATH")
        .cloned()
        .or_else(|| std::env::var("PATH").ok());
    if let Some(base) = base {
        entries.push(base);
    }

    let separator = platform.path_list_separator().to_string();
    let path = entries.join(&separator);
    debug!(%path, "PATH augmented for python executable");
    env.insert("PATH".to_string(), path);
}
