// src/args/scope.rs

//! Argument scopes and placeholder substitution.
//!
//! Arguments are stored as a list of [`ArgumentScope`]s. A *scoped* group
//! (written `$[ ... ]` in an argument line) is all-or-nothing: if any of its
//! `${name}` placeholders cannot be resolved, none of its tokens are emitted.
//! Outside a scope an unresolved placeholder just becomes the empty string,
//! unless it is written `${!name}`, which makes the variable required.

use tracing::debug;

use crate::args::lookup::SubstitutionChain;
use crate::args::tokenize::tokenize;
use crate::errors::{ProcwardenError, Result};

const SCOPE_OPEN: &str = "$[";
const SCOPE_CLOSE: char = ']';
const VAR_OPEN: &str = "${";
const VAR_CLOSE: char = '}';
const REQUIRED_MARKER: char = '!';

/// An ordered group of raw (unsubstituted) tokens.
///
/// Tokens are trimmed on construction and empty ones are never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentScope {
    tokens: Vec<String>,
    scoped: bool,
}

impl ArgumentScope {
    pub fn new<I, S>(tokens: I, scoped: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens, scoped }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_scoped(&self) -> bool {
        self.scoped
    }

    /// Substitute every token.
    ///
    /// Returns an empty vector when this is a scoped group with an unresolved
    /// variable. Substituted tokens are trimmed and dropped if empty.
    pub fn resolve(&self, chain: &SubstitutionChain) -> Result<Vec<String>> {
        let mut resolved = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            match substitute_token(token, chain, self.scoped)? {
                Some(value) => {
                    let value = value.trim();
                    if !value.is_empty() {
                        resolved.push(value.to_string());
                    }
                }
                None => return Ok(Vec::new()),
            }
        }
        Ok(resolved)
    }
}

/// Replace every `${name}` in `token`.
///
/// `Ok(None)` means "scoped and unresolved": the caller drops the whole scope.
fn substitute_token(
    token: &str,
    chain: &SubstitutionChain,
    scoped: bool,
) -> Result<Option<String>> {
    let mut out = String::with_capacity(token.len());
    let mut rest = token;

    while let Some(open) = rest.find(VAR_OPEN) {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + VAR_OPEN.len()..];
        let close = after_open
            .find(VAR_CLOSE)
            .ok_or_else(|| ProcwardenError::UnclosedPlaceholder {
                argument: rest.to_string(),
            })?;
        let raw_name = &after_open[..close];
        let (name, required) = match raw_name.strip_prefix(REQUIRED_MARKER) {
            Some(stripped) => (stripped, true),
            None => (raw_name, false),
        };

        match chain.resolve(name) {
            Some(value) => out.push_str(&value),
            None if scoped => {
                debug!(variable = %name, "variable unresolved inside scope; dropping scope");
                return Ok(None);
            }
            None if required => {
                return Err(ProcwardenError::MissingRequiredVariable {
                    name: name.to_string(),
                });
            }
            None => {
                debug!(variable = %name, "variable in command line not found; replaced with empty string");
            }
        }

        rest = &after_open[close + VAR_CLOSE.len_utf8()..];
    }

    out.push_str(rest);
    Ok(Some(out))
}

/// Everything the caller added, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentList {
    scopes: Vec<ArgumentScope>,
}

impl ArgumentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scopes(&self) -> &[ArgumentScope] {
        &self.scopes
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.iter().all(|s| s.tokens().is_empty())
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }

    /// One literal argument such as `-v`.
    pub fn add_argument(&mut self, argument: impl AsRef<str>) {
        self.add_arguments([argument]);
    }

    /// Several literal arguments, not scoped.
    pub fn add_arguments<I, S>(&mut self, arguments: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scopes.push(ArgumentScope::new(arguments, false));
    }

    /// Tokens that form one all-or-nothing scope.
    pub fn add_scope<I, S>(&mut self, arguments: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scopes.push(ArgumentScope::new(arguments, true));
    }

    /// Tokenize `line` and add it as one all-or-nothing scope.
    pub fn add_scope_line(&mut self, line: &str) -> Result<()> {
        let tokens = tokenize(line)?;
        self.add_scope(tokens);
        Ok(())
    }

    /// Add a whole argument line. `$[ ... ]` sections become scopes, the
    /// text around them is tokenized as plain arguments.
    pub fn add_line(&mut self, line: &str) -> Result<()> {
        let parsed = parse_line(line)?;
        self.scopes.extend(parsed);
        Ok(())
    }

    /// Substitute all scopes and concatenate the survivors.
    pub fn resolve(&self, chain: &SubstitutionChain) -> Result<Vec<String>> {
        let mut resolved = Vec::new();
        for scope in &self.scopes {
            resolved.extend(scope.resolve(chain)?);
        }
        Ok(resolved)
    }
}

/// Split an argument line into plain and scoped groups.
///
/// All-or-nothing: on error nothing is returned, so a malformed line never
/// leaves a half-added argument list behind.
pub fn parse_line(line: &str) -> Result<Vec<ArgumentScope>> {
    let mut scopes = Vec::new();
    let mut rest = line;

    while let Some(open) = rest.find(SCOPE_OPEN) {
        scopes.push(ArgumentScope::new(tokenize(&rest[..open])?, false));

        let inner_start = open + SCOPE_OPEN.len();
        let close = rest[inner_start..]
            .find(SCOPE_CLOSE)
            .ok_or_else(|| ProcwardenError::UnclosedScope {
                line: line.to_string(),
            })?;
        let inner = &rest[inner_start..inner_start + close];
        scopes.push(ArgumentScope::new(tokenize(inner)?, true));

        rest = &rest[inner_start + close + SCOPE_CLOSE.len_utf8()..];
    }

    scopes.push(ArgumentScope::new(tokenize(rest)?, false));
    Ok(scopes)
}
