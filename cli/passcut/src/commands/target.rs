//! `passcut target`: profile listing, description, validation and templates.

use std::path::Path;

use anyhow::{bail, Context, Result};
use passcut_targets::{
    generate_template, has_errors, load_profile_toml, profile_to_toml, validate_profile, Resource,
    TargetProfile,
};

use super::load_registry;

/// List every registered profile.
pub fn list(cwd: &Path, targets_dir: Option<&Path>) -> Result<()> {
    let registry = load_registry(cwd, targets_dir)?;
    println!("Target profiles:");
    println!();
    for profile in registry.iter() {
        println!(
            "  {:<20} {:<9} {}",
            profile.name,
            profile.stage,
            profile.description.as_deref().unwrap_or("")
        );
    }
    println!();
    println!("Use 'passcut target describe <name>' for details.");
    Ok(())
}

/// Describe one profile, human-readable or as TOML.
pub fn describe(
    name: &str,
    cwd: &Path,
    targets_dir: Option<&Path>,
    format: Option<&str>,
) -> Result<()> {
    let registry = load_registry(cwd, targets_dir)?;
    let profile = match registry.resolve(name) {
        Some(p) => p,
        None => bail!(
            "unknown target: '{name}'. Use 'passcut target list' to see available targets."
        ),
    };

    match format {
        Some("toml") => print!("{}", profile_to_toml(profile)?),
        None | Some("text") => print!("{}", describe_text(profile)),
        Some(other) => bail!("unknown format: '{other}'. Expected 'text' or 'toml'."),
    }
    Ok(())
}

fn describe_text(profile: &TargetProfile) -> String {
    let mut s = format!("=== Target: {} ===\n", profile.name);
    s.push_str(&format!("Version: {}\n", profile.version));
    s.push_str(&format!("Stage:   {}\n", profile.stage));
    if let Some(desc) = &profile.description {
        s.push_str(&format!("About:   {desc}\n"));
    }
    s.push('\n');
    s.push_str("--- Per-pass limits ---\n");
    for r in Resource::ALL {
        let v = profile.limits.get(r);
        let shown = if v == u32::MAX {
            "unbounded".to_string()
        } else {
            v.to_string()
        };
        s.push_str(&format!("  {:<17} {shown}\n", format!("{r}:")));
    }
    s
}

/// Validate a `.target.toml` file; errors fail the command, warnings don't.
pub fn validate(path: &Path) -> Result<()> {
    let profile = load_profile_toml(path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    match validate_profile(&profile) {
        Ok(()) => {
            println!("{}: profile '{}' is valid", path.display(), profile.name);
            Ok(())
        }
        Err(issues) => {
            for issue in &issues {
                println!("  {}: {}", issue.severity, issue.message);
            }
            if has_errors(&issues) {
                bail!("{}: profile '{}' is invalid", path.display(), profile.name);
            }
            println!(
                "{}: profile '{}' is valid ({} warning(s))",
                path.display(),
                profile.name,
                issues.len()
            );
            Ok(())
        }
    }
}

/// Write `<dir>/<name>.target.toml` seeded from the arb-fragment limits.
pub fn template(name: &str, dir: &Path) -> Result<()> {
    let path = dir.join(format!("{name}.target.toml"));
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    std::fs::write(&path, generate_template(name)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}
