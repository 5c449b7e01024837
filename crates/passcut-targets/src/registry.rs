//! Explicit registry of target profiles.
//!
//! The pipeline resolves target names through a registry value passed in by
//! the caller; there is no process-wide table.

use std::path::Path;

use indexmap::IndexMap;

use crate::error::{Result, TargetError};
use crate::limits::ResourceLimits;
use crate::parse::{discover_targets, has_errors, load_profile_toml, validate_profile};
use crate::profile::TargetProfile;

/// Target profiles by name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    profiles: IndexMap<String, TargetProfile>,
}

impl TargetRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in profile.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for profile in TargetProfile::builtins() {
            registry.profiles.insert(profile.name.clone(), profile);
        }
        registry
    }

    /// Add a profile; fails if the name is taken.
    pub fn register(&mut self, profile: TargetProfile) -> Result<()> {
        if self.profiles.contains_key(&profile.name) {
            return Err(TargetError::Duplicate { name: profile.name });
        }
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Add a profile, replacing any profile of the same name.
    pub fn replace(&mut self, profile: TargetProfile) -> Option<TargetProfile> {
        self.profiles.insert(profile.name.clone(), profile)
    }

    /// Look up a profile by name.
    pub fn resolve(&self, name: &str) -> Option<&TargetProfile> {
        self.profiles.get(name)
    }

    /// Ceilings of a named target.
    pub fn limits(&self, name: &str) -> Option<ResourceLimits> {
        self.resolve(name).map(|p| p.limits)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Registered profiles, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TargetProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Load every `.target.toml` file in `dir`, replacing profiles of the
    /// same name. Returns the number of profiles loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut loaded = 0;
        for (file_stem, path) in discover_targets(dir)? {
            let profile = load_profile_toml(&path)?;
            if let Err(issues) = validate_profile(&profile) {
                for issue in &issues {
                    tracing::warn!(
                        target_file = %path.display(),
                        severity = issue.severity,
                        "{}",
                        issue.message
                    );
                }
                if has_errors(&issues) {
                    return Err(TargetError::Validation {
                        detail: format!("{}: {} issue(s)", path.display(), issues.len()),
                    });
                }
            }
            if profile.name != file_stem {
                tracing::warn!(
                    file = %file_stem,
                    name = %profile.name,
                    "profile name differs from its file name"
                );
            }
            if self.replace(profile).is_some() {
                tracing::info!(target_file = %path.display(), "overriding registered profile");
            }
            loaded += 1;
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{generate_template, profile_to_toml};

    #[test]
    fn builtins_resolve() {
        let registry = TargetRegistry::with_builtins();
        assert_eq!(registry.limits("arb-fragment").map(|l| l.instructions), Some(48));
        assert!(registry.resolve("no-such-gpu").is_none());
        assert_eq!(registry.names().next(), Some("arb-vertex"));
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = TargetRegistry::with_builtins();
        let err = registry.register(TargetProfile::tiny()).unwrap_err();
        assert!(matches!(err, TargetError::Duplicate { .. }));
        let before = registry.len();
        let mut custom = TargetProfile::tiny();
        custom.name = "tiny-2".into();
        registry.register(custom).unwrap();
        assert_eq!(registry.len(), before + 1);
    }

    #[test]
    fn load_dir_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let mut profile = TargetProfile::arb_fragment();
        profile.limits.instructions = 12;
        std::fs::write(
            dir.path().join("arb-fragment.target.toml"),
            profile_to_toml(&profile).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("custom.target.toml"),
            generate_template("custom").unwrap(),
        )
        .unwrap();

        let mut registry = TargetRegistry::with_builtins();
        let before = registry.len();
        assert_eq!(registry.load_dir(dir.path()).unwrap(), 2);
        assert_eq!(registry.len(), before + 1);
        assert_eq!(registry.limits("arb-fragment").unwrap().instructions, 12);
        assert!(registry.resolve("custom").is_some());
    }

    #[test]
    fn load_dir_rejects_invalid_profile() {
        let dir = tempfile::tempdir().unwrap();
        let mut profile = TargetProfile::tiny();
        profile.limits.instructions = 0;
        std::fs::write(
            dir.path().join("tiny.target.toml"),
            profile_to_toml(&profile).unwrap(),
        )
        .unwrap();
        let mut registry = TargetRegistry::new();
        assert!(matches!(
            registry.load_dir(dir.path()),
            Err(TargetError::Validation { .. })
        ));
        assert!(registry.is_empty());
    }
}
