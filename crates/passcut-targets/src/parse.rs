//! TOML parsing, serialization, validation, and discovery for target profiles.
//!
//! Profiles are stored as `.target.toml` files in a targets directory. This
//! module provides functions to load, validate, serialize, and discover
//! these files.

use std::path::{Path, PathBuf};

use crate::error::{Result, TargetError};
use crate::limits::Resource;
use crate::profile::{ShaderStage, TargetProfile};

/// A validation issue found in a profile definition.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// Load a profile from a `.target.toml` file.
pub fn load_profile_toml(path: &Path) -> Result<TargetProfile> {
    if !path.exists() {
        return Err(TargetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_profile_toml(&content)
}

/// Parse a profile from a TOML string.
pub fn parse_profile_toml(toml_str: &str) -> Result<TargetProfile> {
    let profile: TargetProfile = toml::from_str(toml_str)?;
    Ok(profile)
}

/// Serialize a profile to pretty TOML.
pub fn profile_to_toml(profile: &TargetProfile) -> Result<String> {
    let toml_str = toml::to_string_pretty(profile)?;
    Ok(toml_str)
}

/// Validate a profile definition.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with a list of problems.
/// Warnings alone do not make a profile invalid for loading, but are
/// reported alongside errors.
pub fn validate_profile(profile: &TargetProfile) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let limits = &profile.limits;

    // 1. Name is a usable identifier
    if profile.name.is_empty()
        || !profile
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        issues.push(ValidationIssue {
            severity: "error",
            message: format!(
                "profile name '{}' must be non-empty ASCII letters, digits, '-' or '_'",
                profile.name
            ),
        });
    }

    // 2. A pass must hold at least one instruction and its result register
    for r in [Resource::Instructions, Resource::Temporaries, Resource::Outputs] {
        if limits.get(r) == 0 {
            issues.push(ValidationIssue {
                severity: "error",
                message: format!("{r} limit is 0; no pass can fit"),
            });
        }
    }

    // 3. Vertex stages sample no textures on these targets
    if profile.stage == ShaderStage::Vertex && limits.textures != 0 && limits.textures != u32::MAX {
        issues.push(ValidationIssue {
            severity: "warning",
            message: format!(
                "vertex profile allows {} texture instructions",
                limits.textures
            ),
        });
    }

    // 4. Texture instructions are instructions
    if limits.textures != u32::MAX && limits.textures > limits.instructions {
        issues.push(ValidationIssue {
            severity: "warning",
            message: format!(
                "textures limit ({}) exceeds instructions limit ({})",
                limits.textures, limits.instructions
            ),
        });
    }

    // 5. Instructions unbounded means the profile never forces a split
    if limits.instructions == u32::MAX {
        issues.push(ValidationIssue {
            severity: "warning",
            message: "instructions limit is unbounded".into(),
        });
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Whether a list of issues contains any error (not just warnings).
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == "error")
}

/// Generate a template `.target.toml` for a new profile.
///
/// Seeds from arb-fragment with the given custom name.
pub fn generate_template(name: &str) -> Result<String> {
    let mut profile = TargetProfile::arb_fragment();
    profile.name = name.into();
    profile.version = "0.1.0".into();
    profile.description = None;
    profile_to_toml(&profile)
}

/// Discover all `.target.toml` files in a targets directory.
///
/// Returns a list of (target_name, file_path) pairs sorted by name.
pub fn discover_targets(targets_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !targets_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut targets = Vec::new();
    for entry in std::fs::read_dir(targets_dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".target.toml"))
            .map(str::to_string);
        if let Some(name) = name {
            targets.push((name, path));
        }
    }
    targets.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_builtins() {
        for original in TargetProfile::builtins() {
            let toml_str = profile_to_toml(&original).unwrap();
            let parsed = parse_profile_toml(&toml_str).unwrap();
            assert_eq!(original, parsed);
        }
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
name = "gf-fx-lite"
version = "1.0"
stage = "fragment"

[limits]
instructions = 96
temporaries = 8
half-temporaries = 16
textures = 8
"#;
        let profile = parse_profile_toml(toml_str).unwrap();
        assert_eq!(profile.name, "gf-fx-lite");
        assert_eq!(profile.limits.half_temporaries, 16);
        assert_eq!(profile.limits.parameters, u32::MAX);
        assert!(validate_profile(&profile).is_ok());
    }

    #[test]
    fn parse_invalid_returns_error() {
        assert!(parse_profile_toml("this is not valid toml [[[").is_err());
    }

    #[test]
    fn parse_missing_field_returns_error() {
        assert!(parse_profile_toml("name = \"incomplete\"\n").is_err());
    }

    #[test]
    fn validate_builtins() {
        for profile in TargetProfile::builtins() {
            assert!(validate_profile(&profile).is_ok(), "{}", profile.name);
        }
    }

    #[test]
    fn validate_zero_instructions() {
        let mut profile = TargetProfile::arb_fragment();
        profile.limits.instructions = 0;
        let issues = validate_profile(&profile).unwrap_err();
        assert!(has_errors(&issues));
        assert!(issues.iter().any(|i| i.message.contains("instructions limit is 0")));
    }

    #[test]
    fn validate_bad_name() {
        let mut profile = TargetProfile::arb_fragment();
        profile.name = "has space".into();
        let issues = validate_profile(&profile).unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("profile name")));
    }

    #[test]
    fn validate_vertex_textures_is_warning() {
        let mut profile = TargetProfile::arb_vertex();
        profile.limits.textures = 4;
        let issues = validate_profile(&profile).unwrap_err();
        assert!(!has_errors(&issues));
        assert!(issues.iter().any(|i| i.message.contains("vertex profile")));
    }

    #[test]
    fn generate_template_is_valid() {
        let toml_str = generate_template("my-board").unwrap();
        let profile = parse_profile_toml(&toml_str).unwrap();
        assert_eq!(profile.name, "my-board");
        assert_eq!(profile.version, "0.1.0");
        assert!(validate_profile(&profile).is_ok());
    }

    #[test]
    fn discover_targets_finds_files() {
        let dir = tempfile::tempdir().unwrap();
        let template = generate_template("board-a").unwrap();
        std::fs::write(dir.path().join("board-a.target.toml"), &template).unwrap();
        std::fs::write(dir.path().join("board-b.target.toml"), &template).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let targets = discover_targets(dir.path()).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].0, "board-a");
        assert_eq!(targets[1].0, "board-b");
    }

    #[test]
    fn discover_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let targets = discover_targets(&dir.path().join("absent")).unwrap();
        assert!(targets.is_empty());
    }

    #[test]
    fn load_not_found() {
        let result = load_profile_toml(Path::new("/nonexistent/path.target.toml"));
        assert!(matches!(result, Err(TargetError::NotFound { .. })));
    }
}
