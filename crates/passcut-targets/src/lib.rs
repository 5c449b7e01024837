//! GPU target profiles for passcut.
//!
//! A target is a named set of per-pass resource ceilings: how many
//! instructions, temporaries, texture lookups, parameters and so on a
//! single pass may use. Profiles come from the built-in table or from
//! `.target.toml` files, and are looked up through a [`TargetRegistry`]
//! the caller owns.

pub mod error;
pub mod limits;
pub mod parse;
pub mod profile;
pub mod registry;

pub use error::TargetError;
pub use limits::{Resource, ResourceLimits};
pub use parse::{
    discover_targets, generate_template, has_errors, load_profile_toml, parse_profile_toml,
    profile_to_toml, validate_profile, ValidationIssue,
};
pub use profile::{ShaderStage, TargetProfile};
pub use registry::TargetRegistry;
