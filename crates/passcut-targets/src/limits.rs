//! Per-pass resource ceilings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One resource dimension a pass consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    Instructions,
    Temporaries,
    HalfTemporaries,
    Attributes,
    Outputs,
    Parameters,
    Textures,
    Constants,
    Channels,
}

impl Resource {
    /// Every dimension, in reporting order.
    pub const ALL: [Resource; 9] = [
        Resource::Instructions,
        Resource::Temporaries,
        Resource::HalfTemporaries,
        Resource::Attributes,
        Resource::Outputs,
        Resource::Parameters,
        Resource::Textures,
        Resource::Constants,
        Resource::Channels,
    ];

    /// Kebab-case name, as used in `.target.toml` files.
    pub fn name(self) -> &'static str {
        match self {
            Resource::Instructions => "instructions",
            Resource::Temporaries => "temporaries",
            Resource::HalfTemporaries => "half-temporaries",
            Resource::Attributes => "attributes",
            Resource::Outputs => "outputs",
            Resource::Parameters => "parameters",
            Resource::Textures => "textures",
            Resource::Constants => "constants",
            Resource::Channels => "channels",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable per-target ceilings, one per [`Resource`].
///
/// Missing fields in a profile file default to unbounded, so a profile only
/// lists the dimensions its hardware actually constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceLimits {
    /// Native instructions per pass.
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub instructions: u32,
    /// Full-precision temporary registers.
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub temporaries: u32,
    /// Half-precision temporary registers.
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub half_temporaries: u32,
    /// Per-invocation input attributes.
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub attributes: u32,
    /// Result registers written by a pass.
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub outputs: u32,
    /// Uniform parameter slots.
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub parameters: u32,
    /// Texture instructions.
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub textures: u32,
    /// Literal constant slots.
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub constants: u32,
    /// Inter-pass channels read by a pass.
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub channels: u32,
}

fn unbounded() -> u32 {
    u32::MAX
}

fn is_unbounded(v: &u32) -> bool {
    *v == u32::MAX
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl ResourceLimits {
    /// No ceilings at all.
    pub fn unbounded() -> Self {
        Self::splat(u32::MAX)
    }

    /// Zero capacity in every dimension; nothing fits.
    pub fn zero() -> Self {
        Self::splat(0)
    }

    fn splat(n: u32) -> Self {
        Self {
            instructions: n,
            temporaries: n,
            half_temporaries: n,
            attributes: n,
            outputs: n,
            parameters: n,
            textures: n,
            constants: n,
            channels: n,
        }
    }

    /// Ceiling for one dimension.
    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Instructions => self.instructions,
            Resource::Temporaries => self.temporaries,
            Resource::HalfTemporaries => self.half_temporaries,
            Resource::Attributes => self.attributes,
            Resource::Outputs => self.outputs,
            Resource::Parameters => self.parameters,
            Resource::Textures => self.textures,
            Resource::Constants => self.constants,
            Resource::Channels => self.channels,
        }
    }

    /// Replace the ceiling for one dimension.
    pub fn set(&mut self, resource: Resource, value: u32) {
        let slot = match resource {
            Resource::Instructions => &mut self.instructions,
            Resource::Temporaries => &mut self.temporaries,
            Resource::HalfTemporaries => &mut self.half_temporaries,
            Resource::Attributes => &mut self.attributes,
            Resource::Outputs => &mut self.outputs,
            Resource::Parameters => &mut self.parameters,
            Resource::Textures => &mut self.textures,
            Resource::Constants => &mut self.constants,
            Resource::Channels => &mut self.channels,
        };
        *slot = value;
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, resource: Resource, value: u32) -> Self {
        self.set(resource, value);
        self
    }

    /// Whether any dimension has zero capacity.
    pub fn is_degenerate(&self) -> bool {
        Resource::ALL.iter().any(|&r| self.get(r) == 0)
    }
}

impl fmt::Display for ResourceLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for r in Resource::ALL {
            let v = self.get(r);
            if v == u32::MAX {
                continue;
            }
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{r}={v}")?;
            first = false;
        }
        if first {
            write!(f, "unbounded")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_every_dimension() {
        let mut limits = ResourceLimits::unbounded();
        for (i, r) in Resource::ALL.into_iter().enumerate() {
            limits.set(r, i as u32 + 1);
        }
        for (i, r) in Resource::ALL.into_iter().enumerate() {
            assert_eq!(limits.get(r), i as u32 + 1);
        }
    }

    #[test]
    fn missing_fields_are_unbounded() {
        let limits: ResourceLimits = toml::from_str("instructions = 48\ntextures = 4\n").unwrap();
        assert_eq!(limits.instructions, 48);
        assert_eq!(limits.textures, 4);
        assert_eq!(limits.temporaries, u32::MAX);
        assert_eq!(limits.to_string(), "instructions=48, textures=4");
    }

    #[test]
    fn zero_is_degenerate() {
        assert!(ResourceLimits::zero().is_degenerate());
        assert!(!ResourceLimits::unbounded().is_degenerate());
        assert_eq!(ResourceLimits::unbounded().to_string(), "unbounded");
    }
}
