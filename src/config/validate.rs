// src/config/validate.rs

use crate::args::parse_line;
use crate::config::model::{ProfileFile, RawProfileFile};
use crate::errors::{ProcwardenError, Result};

impl TryFrom<RawProfileFile> for ProfileFile {
    type Error = ProcwardenError;

    fn try_from(raw: RawProfileFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_profile(&raw)?;
        Ok(ProfileFile::new_unchecked(raw))
    }
}

fn validate_raw_profile(raw: &RawProfileFile) -> Result<()> {
    ensure_has_command(raw)?;
    validate_command_syntax(raw)?;
    validate_names(raw)?;
    Ok(())
}

fn ensure_has_command(raw: &RawProfileFile) -> Result<()> {
    if raw.process.command.trim().is_empty() {
        return Err(ProcwardenError::ConfigError(
            "[process].command must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Quoting and scope errors are reported as-is so callers can match on them.
fn validate_command_syntax(raw: &RawProfileFile) -> Result<()> {
    let scopes = parse_line(&raw.process.command)?;
    if scopes.iter().all(|s| s.tokens().is_empty()) {
        return Err(ProcwardenError::ConfigError(
            "[process].command contains no arguments".to_string(),
        ));
    }
    Ok(())
}

fn validate_names(raw: &RawProfileFile) -> Result<()> {
    for name in raw.env.keys() {
        if name.is_empty() || name.contains('=') || name.contains('\0') {
            return Err(ProcwardenError::ConfigError(format!(
                "invalid environment variable name in [env]: '{name}'"
            )));
        }
    }
    for name in raw.vars.keys() {
        if raw.paths.contains_key(name) {
            return Err(ProcwardenError::ConfigError(format!(
                "variable '{name}' is defined in both [vars] and [paths]"
            )));
        }
    }
    Ok(())
}
