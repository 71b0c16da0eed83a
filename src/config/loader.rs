// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::args::{LauncherFlags, RuntimeProperties, SubstitutionMap};
use crate::config::model::{ProfileFile, RawProfileFile};
use crate::errors::Result;
use crate::exec::ExternalProcess;
use crate::platform::Platform;

/// Read and deserialize a profile without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawProfileFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let profile: RawProfileFile = toml::from_str(&contents)?;
    Ok(profile)
}

/// Read, deserialize and validate a profile.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ProfileFile> {
    let raw = load_from_path(&path)?;
    ProfileFile::try_from(raw)
}

/// Default profile location.
pub fn default_profile_path() -> PathBuf {
    PathBuf::from("Procwarden.toml")
}

impl ProfileFile {
    /// Build a configured controller using the built-in runtime properties.
    pub fn into_process(self, platform: Platform, base_dir: &Path) -> Result<ExternalProcess> {
        let mut process = ExternalProcess::with_platform(platform);
        self.apply_to(
            &mut process,
            base_dir,
            RuntimeProperties::system(),
            LauncherFlags::from_current_process(),
        )?;
        Ok(process)
    }

    /// Apply this profile to an existing controller.
    ///
    /// Relative `working_dir` and `[paths]` entries are taken relative to
    /// `base_dir` (normally the profile's directory). Lookups already
    /// registered on `process` keep precedence; profile variables come next,
    /// then the default lookups (if enabled) with `properties` and `flags`.
    pub fn apply_to(
        self,
        process: &mut ExternalProcess,
        base_dir: &Path,
        properties: RuntimeProperties,
        flags: LauncherFlags,
    ) -> Result<()> {
        let section = self.process;

        process.set_working_directory(section.working_dir.map(|d| base_dir.join(d)));
        process.add_environment_map(self.env);
        process.set_timeout(section.timeout, section.timeout_unit);
        process.set_signal_delay(Duration::from_millis(section.signal_delay_ms));
        process.set_join_timeout(Duration::from_millis(section.join_timeout_ms));

        let mut map = SubstitutionMap::new();
        for (name, value) in self.vars {
            map.insert(name, value);
        }
        for (name, path) in self.paths {
            map.insert(name, base_dir.join(path));
        }
        if !map.is_empty() {
            process.add_substitution_map(map);
        }
        if section.default_lookups {
            process.add_default_lookups_with(properties, flags);
        }

        process.add_argument_line(&section.command)
    }
}
