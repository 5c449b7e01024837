//! Named GPU target profiles.
//!
//! A profile pairs a shader stage with the per-pass [`ResourceLimits`] of a
//! family of programmable GPUs. The built-in profiles mirror the default
//! program limits of the ARB assembly targets and a few vendor profiles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::limits::ResourceLimits;

/// Programmable pipeline stage a profile targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// A named target: stage plus per-pass ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetProfile {
    /// Profile name (e.g., "arb-fragment").
    pub name: String,
    /// Profile version.
    pub version: String,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Pipeline stage.
    pub stage: ShaderStage,
    /// Per-pass resource ceilings.
    pub limits: ResourceLimits,
}

impl TargetProfile {
    /// Create a profile with the given ceilings.
    pub fn new(name: impl Into<String>, stage: ShaderStage, limits: ResourceLimits) -> Self {
        Self {
            name: name.into(),
            version: "1.0".into(),
            description: None,
            stage,
            limits,
        }
    }

    fn described(mut self, description: &str) -> Self {
        self.description = Some(description.into());
        self
    }

    /// ARB_vertex_program defaults.
    pub fn arb_vertex() -> Self {
        Self::new(
            "arb-vertex",
            ShaderStage::Vertex,
            ResourceLimits {
                instructions: 128,
                temporaries: 12,
                attributes: 16,
                parameters: 96,
                textures: 0,
                ..ResourceLimits::unbounded()
            },
        )
        .described("ARB_vertex_program minimum program limits")
    }

    /// ARB_fragment_program defaults.
    pub fn arb_fragment() -> Self {
        Self::new(
            "arb-fragment",
            ShaderStage::Fragment,
            ResourceLimits {
                instructions: 48,
                temporaries: 16,
                attributes: 10,
                parameters: 24,
                textures: 24,
                ..ResourceLimits::unbounded()
            },
        )
        .described("ARB_fragment_program minimum program limits")
    }

    /// ATI R300-class fragment hardware.
    pub fn ati_r300_fragment() -> Self {
        Self::new(
            "ati-r300-fragment",
            ShaderStage::Fragment,
            ResourceLimits {
                instructions: 64,
                temporaries: 12,
                attributes: 10,
                parameters: 32,
                textures: 32,
                constants: 32,
                ..ResourceLimits::unbounded()
            },
        )
        .described("ATI R300 fragment pipeline")
    }

    /// NV30-class fragment hardware with half-precision registers.
    pub fn nv30_fragment() -> Self {
        Self::new(
            "nv30-fragment",
            ShaderStage::Fragment,
            ResourceLimits {
                instructions: 1024,
                temporaries: 32,
                half_temporaries: 64,
                attributes: 10,
                parameters: 512,
                textures: 1024,
                ..ResourceLimits::unbounded()
            },
        )
        .described("NV30 fragment pipeline")
    }

    /// A deliberately small profile for exercising multi-pass splits.
    pub fn tiny() -> Self {
        Self::new(
            "tiny",
            ShaderStage::Fragment,
            ResourceLimits {
                instructions: 4,
                temporaries: 4,
                half_temporaries: 4,
                attributes: 4,
                outputs: 4,
                parameters: 4,
                textures: 1,
                constants: 4,
                channels: 4,
            },
        )
        .described("tiny fragment profile for testing multi-pass splits")
    }

    /// Every built-in profile.
    pub fn builtins() -> Vec<Self> {
        vec![
            Self::arb_vertex(),
            Self::arb_fragment(),
            Self::ati_r300_fragment(),
            Self::nv30_fragment(),
            Self::tiny(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Resource;

    #[test]
    fn arb_fragment_values() {
        let p = TargetProfile::arb_fragment();
        assert_eq!(p.stage, ShaderStage::Fragment);
        assert_eq!(p.limits.get(Resource::Instructions), 48);
        assert_eq!(p.limits.get(Resource::Temporaries), 16);
        assert_eq!(p.limits.get(Resource::Textures), 24);
        assert_eq!(p.limits.get(Resource::Outputs), u32::MAX);
    }

    #[test]
    fn vertex_has_no_texture_capacity() {
        let p = TargetProfile::arb_vertex();
        assert_eq!(p.limits.textures, 0);
        assert_eq!(p.limits.parameters, 96);
    }

    #[test]
    fn builtin_names_are_unique() {
        let names: std::collections::HashSet<_> =
            TargetProfile::builtins().into_iter().map(|p| p.name).collect();
        assert_eq!(names.len(), TargetProfile::builtins().len());
    }
}
