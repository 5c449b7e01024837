//! Storage declarations and operand keys.
//!
//! Every value read or written by a statement is named by an [`OperandKey`]:
//! the storage it lives in, the component selection applied on read, and an
//! optional negation. Storage itself is declared once per block as a
//! [`Variable`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::graph::DagError;

/// Index of a variable in its block's declaration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(pub u32);

impl VarId {
    /// Position in the declaration table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Storage class of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VarKind {
    /// Per-invocation vertex/fragment attribute.
    Input,
    /// Shader result.
    Output,
    /// Scratch register.
    Temp,
    /// Uniform parameter.
    Param,
    /// Compile-time constant.
    Const,
    /// Texture sampler.
    Texture,
    /// Inter-pass channel read or written by a materialized pass.
    Stream,
}

impl VarKind {
    /// Whether statements may write storage of this kind.
    pub fn is_writable(self) -> bool {
        matches!(self, VarKind::Output | VarKind::Temp | VarKind::Stream)
    }

    /// Whether reads of this kind refer to a value produced inside the block.
    pub fn is_block_defined(self) -> bool {
        matches!(self, VarKind::Output | VarKind::Temp)
    }
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VarKind::Input => "input",
            VarKind::Output => "output",
            VarKind::Temp => "temp",
            VarKind::Param => "param",
            VarKind::Const => "const",
            VarKind::Texture => "texture",
            VarKind::Stream => "stream",
        };
        f.write_str(s)
    }
}

/// Precision of a variable's components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    #[default]
    Float,
    Half,
}

/// A declared storage location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Unique name within the block.
    pub name: String,
    /// Storage class.
    pub kind: VarKind,
    /// Number of components (1..=4).
    pub size: u8,
    /// Component precision.
    #[serde(default)]
    pub value_type: ValueType,
    /// Value of a constant, one entry per component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<f32>>,
}

impl Variable {
    /// Declare a float variable.
    pub fn new(name: impl Into<String>, kind: VarKind, size: u8) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
            value_type: ValueType::Float,
            value: None,
        }
    }

    /// Use half precision for this variable.
    pub fn half(mut self) -> Self {
        self.value_type = ValueType::Half;
        self
    }

    /// Attach a constant value.
    pub fn with_value(mut self, value: Vec<f32>) -> Self {
        self.value = Some(value);
        self
    }
}

/// A component selection of up to four components.
///
/// The empty selection is the identity: it reads or writes every component
/// the variable declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Swizzle {
    comps: [u8; 4],
    len: u8,
}

impl Swizzle {
    /// The identity selection.
    pub const IDENTITY: Swizzle = Swizzle {
        comps: [0; 4],
        len: 0,
    };

    /// Build a selection from explicit component indices.
    pub fn new(components: &[u8]) -> Result<Self, DagError> {
        if components.is_empty() {
            return Ok(Self::IDENTITY);
        }
        if components.len() > 4 || components.iter().any(|&c| c > 3) {
            return Err(DagError::InvalidSwizzle {
                text: format!("{components:?}"),
            });
        }
        let mut comps = [0u8; 4];
        comps[..components.len()].copy_from_slice(components);
        Ok(Self {
            comps,
            len: components.len() as u8,
        })
    }

    /// Whether this is the identity selection.
    pub fn is_identity(&self) -> bool {
        self.len == 0
    }

    /// Selected components; empty for the identity.
    pub fn components(&self) -> &[u8] {
        &self.comps[..self.len as usize]
    }

    /// Resolve against a variable of `size` components.
    ///
    /// Returns the four source components (the last selected component is
    /// replicated) and the number of meaningful components.
    pub fn resolve(&self, size: u8) -> ([u8; 4], u8) {
        if self.is_identity() {
            let last = size.clamp(1, 4) - 1;
            let mut comps = [0u8; 4];
            for (i, c) in comps.iter_mut().enumerate() {
                *c = (i as u8).min(last);
            }
            return (comps, size.clamp(1, 4));
        }
        let mut comps = [0u8; 4];
        let last = self.comps[self.len as usize - 1];
        for (i, c) in comps.iter_mut().enumerate() {
            *c = if i < self.len as usize { self.comps[i] } else { last };
        }
        (comps, self.len)
    }

    /// Whether every selected component exists in a variable of `size`.
    pub fn fits(&self, size: u8) -> bool {
        self.components().iter().all(|&c| c < size)
    }

    /// Whether this selection is usable as a write mask (strictly increasing).
    pub fn is_write_mask(&self) -> bool {
        self.components().windows(2).all(|w| w[0] < w[1])
    }

    /// Whether a write through this mask leaves some component of a
    /// `size`-component variable untouched.
    pub fn is_partial_write(&self, size: u8) -> bool {
        !self.is_identity() && (self.len < size)
    }

    /// Whether component `c` is written through this mask.
    pub fn writes(&self, c: u8) -> bool {
        self.is_identity() || self.components().contains(&c)
    }
}

const COMPONENT_NAMES: [char; 4] = ['x', 'y', 'z', 'w'];

impl fmt::Display for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &c in self.components() {
            write!(f, "{}", COMPONENT_NAMES[c as usize])?;
        }
        Ok(())
    }
}

impl FromStr for Swizzle {
    type Err = DagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut comps = Vec::with_capacity(4);
        for ch in s.chars() {
            let c = match ch {
                'x' | 'r' => 0,
                'y' | 'g' => 1,
                'z' | 'b' => 2,
                'w' | 'a' => 3,
                _ => {
                    return Err(DagError::InvalidSwizzle { text: s.to_string() });
                }
            };
            comps.push(c);
        }
        Swizzle::new(&comps).map_err(|_| DagError::InvalidSwizzle { text: s.to_string() })
    }
}

impl TryFrom<String> for Swizzle {
    type Error = DagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Swizzle> for String {
    fn from(value: Swizzle) -> Self {
        value.to_string()
    }
}

/// Identifies a value read by a statement: storage, component selection and sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperandKey {
    /// Storage being read.
    pub var: VarId,
    /// Component selection applied on read.
    #[serde(default, skip_serializing_if = "Swizzle::is_identity")]
    pub swizzle: Swizzle,
    /// Whether the read value is negated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negate: bool,
}

impl OperandKey {
    /// Read every component of `var`.
    pub fn new(var: VarId) -> Self {
        Self {
            var,
            swizzle: Swizzle::IDENTITY,
            negate: false,
        }
    }

    /// Apply a component selection.
    pub fn swizzled(mut self, swizzle: Swizzle) -> Self {
        self.swizzle = swizzle;
        self
    }

    /// Negate the read value.
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }
}

/// Where a statement writes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// Storage being written.
    pub var: VarId,
    /// Write mask; identity writes every component.
    #[serde(default, skip_serializing_if = "Swizzle::is_identity")]
    pub mask: Swizzle,
}

impl Destination {
    /// Write every component of `var`.
    pub fn new(var: VarId) -> Self {
        Self {
            var,
            mask: Swizzle::IDENTITY,
        }
    }

    /// Restrict the write to the components in `mask`.
    pub fn masked(mut self, mask: Swizzle) -> Self {
        self.mask = mask;
        self
    }
}
