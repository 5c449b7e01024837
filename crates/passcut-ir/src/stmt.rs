//! Straight-line statements and the blocks that hold them.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::{Destination, OperandKey, VarId, VarKind, Variable};

/// Operations a statement can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    Asn,
    Neg,
    Add,
    Mul,
    Div,
    Slt,
    Sge,
    Seq,
    Sne,
    Abs,
    Ceil,
    Flr,
    Frac,
    Cos,
    Sin,
    Dot,
    Exp2,
    Log2,
    Lrp,
    Mad,
    Max,
    Min,
    Pow,
    Rcp,
    Rsq,
    Sqrt,
    Norm,
    Xpd,
    Cond,
    Tex,
}

impl Opcode {
    /// Number of source operands.
    pub fn arity(self) -> usize {
        use Opcode::*;
        match self {
            Asn | Neg | Abs | Ceil | Flr | Frac | Cos | Sin | Exp2 | Log2 | Rcp | Rsq | Sqrt
            | Norm => 1,
            Add | Mul | Div | Slt | Sge | Seq | Sne | Dot | Max | Min | Pow | Xpd | Tex => 2,
            Lrp | Mad | Cond => 3,
        }
    }

    /// Native instructions this operation expands to on assembly targets.
    pub fn instruction_cost(self) -> u32 {
        use Opcode::*;
        match self {
            Div | Sqrt | Xpd | Ceil | Seq | Sne => 2,
            Norm | Pow => 3,
            _ => 1,
        }
    }

    /// Whether the operation samples a texture (first operand is the sampler).
    pub fn is_texture(self) -> bool {
        matches!(self, Opcode::Tex)
    }

    /// Lowercase mnemonic.
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Asn => "asn",
            Neg => "neg",
            Add => "add",
            Mul => "mul",
            Div => "div",
            Slt => "slt",
            Sge => "sge",
            Seq => "seq",
            Sne => "sne",
            Abs => "abs",
            Ceil => "ceil",
            Flr => "flr",
            Frac => "frac",
            Cos => "cos",
            Sin => "sin",
            Dot => "dot",
            Exp2 => "exp2",
            Log2 => "log2",
            Lrp => "lrp",
            Mad => "mad",
            Max => "max",
            Min => "min",
            Pow => "pow",
            Rcp => "rcp",
            Rsq => "rsq",
            Sqrt => "sqrt",
            Norm => "norm",
            Xpd => "xpd",
            Cond => "cond",
            Tex => "tex",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// One statement: `dest = op(src...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Written storage and mask.
    pub dest: Destination,
    /// Operation.
    pub op: Opcode,
    /// Ordered source operands (at most three).
    pub src: SmallVec<[OperandKey; 3]>,
}

impl Statement {
    /// Build a statement.
    pub fn new(dest: Destination, op: Opcode, src: &[OperandKey]) -> Self {
        Self {
            dest,
            op,
            src: SmallVec::from_slice(src),
        }
    }
}

/// A straight-line block: variable declarations plus ordered statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Declared storage, indexed by [`VarId`].
    pub variables: Vec<Variable>,
    /// Statements in execution order.
    pub statements: Vec<Statement>,
}

impl Block {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable and return its id.
    pub fn declare(&mut self, var: Variable) -> VarId {
        let id = VarId(self.variables.len() as u32);
        self.variables.push(var);
        id
    }

    /// Declare a float variable by name, kind and size.
    pub fn var(&mut self, name: &str, kind: VarKind, size: u8) -> VarId {
        self.declare(Variable::new(name, kind, size))
    }

    /// Look up a declaration.
    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    /// Find a variable by name.
    pub fn find(&self, name: &str) -> Option<VarId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(|i| VarId(i as u32))
    }

    /// Append a statement.
    pub fn push(&mut self, stmt: Statement) {
        self.statements.push(stmt);
    }

    /// Append `dest = op(src...)` with whole-variable reads and writes.
    pub fn emit(&mut self, dest: VarId, op: Opcode, src: &[VarId]) {
        let keys: SmallVec<[OperandKey; 3]> = src.iter().map(|&v| OperandKey::new(v)).collect();
        self.statements.push(Statement {
            dest: Destination::new(dest),
            op,
            src: keys,
        });
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the block has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Parse a block from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn operand_name(&self, key: &OperandKey) -> String {
        let name = self
            .variable(key.var)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| key.var.to_string());
        let sign = if key.negate { "-" } else { "" };
        if key.swizzle.is_identity() {
            format!("{sign}{name}")
        } else {
            format!("{sign}{name}.{}", key.swizzle)
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            let dest = self
                .variable(stmt.dest.var)
                .map(|v| v.name.clone())
                .unwrap_or_else(|| stmt.dest.var.to_string());
            if stmt.dest.mask.is_identity() {
                write!(f, "{dest} = {}", stmt.op)?;
            } else {
                write!(f, "{dest}.{} = {}", stmt.dest.mask, stmt.op)?;
            }
            for (i, src) in stmt.src.iter().enumerate() {
                let sep = if i == 0 { " " } else { ", " };
                write!(f, "{sep}{}", self.operand_name(src))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_table() {
        assert_eq!(Opcode::Mad.arity(), 3);
        assert_eq!(Opcode::Tex.arity(), 2);
        assert_eq!(Opcode::Norm.arity(), 1);
        assert!(Opcode::Tex.is_texture());
        assert!(!Opcode::Mad.is_texture());
    }

    #[test]
    fn display_block() {
        let mut b = Block::new();
        let a = b.var("a", VarKind::Input, 4);
        let c = b.var("c", VarKind::Param, 4);
        let out = b.var("out", VarKind::Output, 4);
        b.push(Statement::new(
            Destination::new(out).masked("xy".parse().unwrap()),
            Opcode::Add,
            &[
                OperandKey::new(a).swizzled("zw".parse().unwrap()),
                OperandKey::new(c).negated(),
            ],
        ));
        assert_eq!(b.to_string(), "out.xy = add a.zw, -c\n");
    }

    #[test]
    fn json_round_trip() {
        let mut b = Block::new();
        let a = b.var("a", VarKind::Input, 4);
        let out = b.var("out", VarKind::Output, 4);
        b.emit(out, Opcode::Norm, &[a]);
        let json = b.to_json().unwrap();
        let back = Block::from_json(&json).unwrap();
        assert_eq!(back, b);
        assert!(json.contains("\"norm\""));
    }

    #[test]
    fn find_by_name() {
        let mut b = Block::new();
        b.var("a", VarKind::Input, 4);
        let t = b.var("t", VarKind::Temp, 2);
        assert_eq!(b.find("t"), Some(t));
        assert_eq!(b.find("missing"), None);
    }
}
