// src/args/lookup.rs

//! Variable lookups used to resolve `${name}` placeholders.
//!
//! A [`SubstitutionChain`] is an ordered list of [`Lookup`]s. Resolution asks
//! each lookup in registration order and the first one that knows the name
//! wins. The stock lookups are:
//!
//! - [`RuntimeProperties`]: host facts such as `user.dir` or `os.name`, plus
//!   caller-defined properties.
//! - [`EnvironmentLookup`]: variables of the current process environment.
//! - [`LauncherFlags`]: flags this program was launched with, matched by
//!   prefix (`${Xmx}` finds `-Xmx4G`).
//! - [`SubstitutionMap`]: a plain map supplied by the caller.
//!
//! Any `Fn(&str) -> Option<String>` closure is a lookup as well.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// A named-value source for placeholder resolution.
pub trait Lookup: Send + Sync {
    /// Return the value for `name`, or `None` if this source does not know it.
    fn lookup(&self, name: &str) -> Option<String>;
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn lookup(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Ordered list of lookups. Never cleared implicitly.
#[derive(Default)]
pub struct SubstitutionChain {
    lookups: Vec<Box<dyn Lookup>>,
}

impl SubstitutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, lookup: impl Lookup + 'static) {
        self.lookups.push(Box::new(lookup));
    }

    /// Register the default bundle: runtime properties, then environment
    /// variables, then launcher flags.
    pub fn push_defaults(&mut self, properties: RuntimeProperties, flags: LauncherFlags) {
        self.push(properties);
        self.push(EnvironmentLookup);
        self.push(flags);
    }

    /// First non-absent value for `name`, in registration order.
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.lookups.iter().find_map(|l| l.lookup(name))
    }

    pub fn clear(&mut self) {
        self.lookups.clear();
    }

    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }
}

impl fmt::Debug for SubstitutionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubstitutionChain")
            .field("lookups", &self.lookups.len())
            .finish()
    }
}

/// Host properties, in the spirit of `user.home` / `file.separator`.
///
/// Caller-defined properties shadow the built-ins.
#[derive(Debug, Clone, Default)]
pub struct RuntimeProperties {
    custom: BTreeMap<String, String>,
}

impl RuntimeProperties {
    /// Built-in properties only.
    pub fn system() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom.insert(key.into(), value.into());
    }

    fn builtin(name: &str) -> Option<String> {
        match name {
            "user.dir" => std::env::current_dir()
                .ok()
                .map(|p| p.to_string_lossy().into_owned()),
            "user.home" => std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok(),
            "tmp.dir" => Some(std::env::temp_dir().to_string_lossy().into_owned()),
            "os.name" => Some(std::env::consts::OS.to_string()),
            "os.arch" => Some(std::env::consts::ARCH.to_string()),
            "file.separator" => Some(MAIN_SEPARATOR.to_string()),
            "path.separator" => Some(if cfg!(windows) { ";" } else { ":" }.to_string()),
            "line.separator" => Some(if cfg!(windows) { "\r\n" } else { "\n" }.to_string()),
            _ => None,
        }
    }
}

impl Lookup for RuntimeProperties {
    fn lookup(&self, name: &str) -> Option<String> {
        self.custom
            .get(name)
            .cloned()
            .or_else(|| Self::builtin(name))
    }
}

/// Variables of the current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentLookup;

impl Lookup for EnvironmentLookup {
    fn lookup(&self, name: &str) -> Option<String> {
        if name.is_empty() || name.contains('=') || name.contains('\0') {
            return None;
        }
        std::env::var(name).ok()
    }
}

/// Flags the current program was launched with.
///
/// `${name}` resolves to the first flag starting with `-name`, returned in
/// full: `${Xmx}` with a flag `-Xmx4G` yields `-Xmx4G`.
#[derive(Debug, Clone, Default)]
pub struct LauncherFlags {
    flags: Vec<String>,
}

impl LauncherFlags {
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flags: flags.into_iter().map(Into::into).collect(),
        }
    }

    /// Every `-`-prefixed argument of the running program.
    ///
    /// Only right for an embedding program whose argv holds its own flags. A
    /// launcher that also receives the child's command line must pass just
    /// its own flags to [`LauncherFlags::new`].
    pub fn from_current_process() -> Self {
        Self::new(std::env::args().skip(1).filter(|a| a.starts_with('-')))
    }
}

impl Lookup for LauncherFlags {
    fn lookup(&self, name: &str) -> Option<String> {
        if name.is_empty() {
            return None;
        }
        let prefix = format!("-{name}");
        self.flags.iter().find(|f| f.starts_with(&prefix)).cloned()
    }
}

/// A value stored in a [`SubstitutionMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionValue {
    Text(String),
    /// Rendered as an absolute path using the platform separator.
    Path(PathBuf),
}

impl SubstitutionValue {
    pub fn render(&self) -> String {
        match self {
            SubstitutionValue::Text(s) => s.clone(),
            SubstitutionValue::Path(p) => {
                let absolute = std::path::absolute(p).unwrap_or_else(|_| p.clone());
                normalize_separators(&absolute.to_string_lossy())
            }
        }
    }
}

impl From<&str> for SubstitutionValue {
    fn from(s: &str) -> Self {
        SubstitutionValue::Text(s.to_string())
    }
}

impl From<String> for SubstitutionValue {
    fn from(s: String) -> Self {
        SubstitutionValue::Text(s)
    }
}

impl From<PathBuf> for SubstitutionValue {
    fn from(p: PathBuf) -> Self {
        SubstitutionValue::Path(p)
    }
}

impl From<&Path> for SubstitutionValue {
    fn from(p: &Path) -> Self {
        SubstitutionValue::Path(p.to_path_buf())
    }
}

/// Map both `/` and `\` to the platform separator.
pub fn normalize_separators(text: &str) -> String {
    text.chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect()
}

/// Caller-supplied name -> value map.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionMap {
    values: HashMap<String, SubstitutionValue>,
}

impl SubstitutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SubstitutionValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<SubstitutionValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for SubstitutionMap
where
    K: Into<String>,
    V: Into<SubstitutionValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = SubstitutionMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Lookup for SubstitutionMap {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).map(SubstitutionValue::render)
    }
}
