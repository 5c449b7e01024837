//! Resource usage of a pass region.

use std::fmt;
use std::ops::Add;

use passcut_targets::Resource;
use serde::{Deserialize, Serialize};

/// What a region consumes, one count per [`Resource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceUsage {
    pub instructions: u32,
    pub temporaries: u32,
    pub half_temporaries: u32,
    pub attributes: u32,
    pub outputs: u32,
    pub parameters: u32,
    pub textures: u32,
    pub constants: u32,
    pub channels: u32,
}

impl ResourceUsage {
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

    fn zip(self, other: Self, f: impl Fn(u32, u32) -> u32) -> Self {
        Self {
            instructions: f(self.instructions, other.instructions),
            temporaries: f(self.temporaries, other.temporaries),
            half_temporaries: f(self.half_temporaries, other.half_temporaries),
            attributes: f(self.attributes, other.attributes),
            outputs: f(self.outputs, other.outputs),
            parameters: f(self.parameters, other.parameters),
            textures: f(self.textures, other.textures),
            constants: f(self.constants, other.constants),
            channels: f(self.channels, other.channels),
        }
    }
}

impl Add for ResourceUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.zip(rhs, u32::saturating_add)
    }
}

impl fmt::Display for ResourceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} instr, {} temp, {} tex, {} attr, {} param, {} const, {} chan, {} out",
            self.instructions,
            self.temporaries + self.half_temporaries,
            self.textures,
            self.attributes,
            self.parameters,
            self.constants,
            self.channels,
            self.outputs,
        )
    }
}
