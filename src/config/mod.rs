// src/config/mod.rs

//! Launch profiles loaded from TOML.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_profile_path, load_and_validate, load_from_path};
pub use model::{ProcessSection, ProfileFile, RawProfileFile};
