// src/args/mod.rs

//! Command-line construction.
//!
//! - [`tokenize`] splits raw argument lines, honouring quotes.
//! - [`lookup`] holds the substitution sources and the ordered chain.
//! - [`scope`] groups tokens into scopes and performs `${name}` substitution.
//!
//! Everything here is pure and synchronous; the controller in
//! [`crate::exec`] calls [`ArgumentList::resolve`] once per run.

pub mod lookup;
pub mod scope;
pub mod tokenize;

pub use lookup::{
    EnvironmentLookup, LauncherFlags, Lookup, RuntimeProperties, SubstitutionChain,
    SubstitutionMap, SubstitutionValue,
};
pub use scope::{ArgumentList, ArgumentScope, parse_line};
pub use tokenize::tokenize;
