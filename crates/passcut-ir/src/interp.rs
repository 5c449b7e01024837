//! Reference interpreter for blocks.
//!
//! Every variable is held as four `f32` lanes. Operands are read through
//! their swizzle (the last selected component is replicated), operations
//! compute all four lanes, and the destination mask picks which lanes land.
//! Texture lookups use a fixed procedural function of the texture's name
//! and coordinates, so a partitioned program samples exactly what the
//! original does.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::stmt::{Block, Opcode};
use crate::types::{OperandKey, VarId, VarKind};

/// Four lanes of one variable.
pub type Vec4 = [f32; 4];

/// Variable values by name.
pub type Env = BTreeMap<String, Vec4>;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("no value bound for {kind} '{name}'")]
    MissingBinding { name: String, kind: VarKind },

    #[error("statement {stmt} references undeclared variable {var}")]
    UnknownVariable { stmt: usize, var: VarId },
}

/// Run `block` with inputs, parameters and incoming streams taken from
/// `env`. Returns the final value of every output and stream it writes.
pub fn evaluate(block: &Block, env: &Env) -> Result<Env, EvalError> {
    let mut values: Vec<Option<Vec4>> = block
        .variables
        .iter()
        .map(|var| match var.kind {
            VarKind::Const => {
                let mut lanes = [0.0; 4];
                if let Some(value) = &var.value {
                    for (lane, v) in lanes.iter_mut().zip(value) {
                        *lane = *v;
                    }
                }
                Some(lanes)
            }
            VarKind::Temp | VarKind::Output => Some([0.0; 4]),
            VarKind::Input | VarKind::Param | VarKind::Stream => env.get(&var.name).copied(),
            VarKind::Texture => None,
        })
        .collect();
    let mut written = vec![false; block.variables.len()];

    for (index, stmt) in block.statements.iter().enumerate() {
        let dest = block
            .variable(stmt.dest.var)
            .ok_or(EvalError::UnknownVariable {
                stmt: index,
                var: stmt.dest.var,
            })?;

        let result = if stmt.op.is_texture() {
            let sampler = stmt.src.first().and_then(|k| block.variable(k.var));
            let coords = stmt.src.get(1).ok_or(EvalError::UnknownVariable {
                stmt: index,
                var: stmt.dest.var,
            })?;
            let (coords, _) = read(block, &values, index, coords)?;
            let name = sampler.map(|v| v.name.as_str()).unwrap_or_default();
            sample(name, coords)
        } else {
            let mut operands = [([0.0f32; 4], 0u8); 3];
            for (slot, key) in operands.iter_mut().zip(&stmt.src) {
                *slot = read(block, &values, index, key)?;
            }
            apply(stmt.op, &operands)
        };

        let slot = &mut values[stmt.dest.var.index()];
        let mut lanes = slot.unwrap_or([0.0; 4]);
        for c in 0..dest.size.min(4) {
            if stmt.dest.mask.writes(c) {
                lanes[c as usize] = result[c as usize];
            }
        }
        *slot = Some(lanes);
        written[stmt.dest.var.index()] = true;
    }

    let mut out = Env::new();
    for (i, var) in block.variables.iter().enumerate() {
        if written[i] && matches!(var.kind, VarKind::Output | VarKind::Stream) {
            if let Some(lanes) = values[i] {
                out.insert(var.name.clone(), lanes);
            }
        }
    }
    Ok(out)
}

fn read(
    block: &Block,
    values: &[Option<Vec4>],
    stmt: usize,
    key: &OperandKey,
) -> Result<(Vec4, u8), EvalError> {
    let var = block
        .variable(key.var)
        .ok_or(EvalError::UnknownVariable { stmt, var: key.var })?;
    let lanes = values[key.var.index()].ok_or_else(|| EvalError::MissingBinding {
        name: var.name.clone(),
        kind: var.kind,
    })?;
    let (comps, width) = key.swizzle.resolve(var.size);
    let mut out = [0.0; 4];
    for (o, c) in out.iter_mut().zip(comps) {
        *o = if key.negate {
            -lanes[c as usize]
        } else {
            lanes[c as usize]
        };
    }
    Ok((out, width))
}

fn lanewise(f: impl Fn(usize) -> f32) -> Vec4 {
    [f(0), f(1), f(2), f(3)]
}

fn apply(op: Opcode, operands: &[(Vec4, u8); 3]) -> Vec4 {
    let (a, wa) = operands[0];
    let (b, wb) = operands[1];
    let (c, _) = operands[2];
    let flag = |t: bool| if t { 1.0 } else { 0.0 };
    match op {
        Opcode::Asn => a,
        Opcode::Neg => lanewise(|i| -a[i]),
        Opcode::Add => lanewise(|i| a[i] + b[i]),
        Opcode::Mul => lanewise(|i| a[i] * b[i]),
        Opcode::Div => lanewise(|i| a[i] / b[i]),
        Opcode::Slt => lanewise(|i| flag(a[i] < b[i])),
        Opcode::Sge => lanewise(|i| flag(a[i] >= b[i])),
        Opcode::Seq => lanewise(|i| flag(a[i] == b[i])),
        Opcode::Sne => lanewise(|i| flag(a[i] != b[i])),
        Opcode::Abs => lanewise(|i| a[i].abs()),
        Opcode::Ceil => lanewise(|i| a[i].ceil()),
        Opcode::Flr => lanewise(|i| a[i].floor()),
        Opcode::Frac => lanewise(|i| a[i] - a[i].floor()),
        Opcode::Cos => lanewise(|i| a[i].cos()),
        Opcode::Sin => lanewise(|i| a[i].sin()),
        Opcode::Exp2 => lanewise(|i| a[i].exp2()),
        Opcode::Log2 => lanewise(|i| a[i].log2()),
        Opcode::Rcp => lanewise(|i| 1.0 / a[i]),
        Opcode::Rsq => lanewise(|i| 1.0 / a[i].sqrt()),
        Opcode::Sqrt => lanewise(|i| a[i].sqrt()),
        Opcode::Max => lanewise(|i| a[i].max(b[i])),
        Opcode::Min => lanewise(|i| a[i].min(b[i])),
        Opcode::Pow => lanewise(|i| a[i].powf(b[i])),
        Opcode::Lrp => lanewise(|i| a[i] * b[i] + (1.0 - a[i]) * c[i]),
        Opcode::Mad => lanewise(|i| a[i] * b[i] + c[i]),
        Opcode::Cond => lanewise(|i| if a[i] > 0.0 { b[i] } else { c[i] }),
        Opcode::Dot => {
            let width = wa.max(wb) as usize;
            let sum: f32 = (0..width).map(|i| a[i] * b[i]).sum();
            [sum; 4]
        }
        Opcode::Norm => {
            let width = wa as usize;
            let len = (0..width).map(|i| a[i] * a[i]).sum::<f32>().sqrt();
            lanewise(|i| if i < width { a[i] / len } else { a[i] })
        }
        Opcode::Xpd => [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
            0.0,
        ],
        // Texture lookups are handled by the caller.
        Opcode::Tex => a,
    }
}

/// Procedural texture: smooth, bounded and a pure function of its inputs.
pub fn sample(texture: &str, coords: Vec4) -> Vec4 {
    let seed = texture
        .bytes()
        .fold(0x811c_9dc5u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193));
    let phase = (seed % 1024) as f32 / 1024.0;
    lanewise(|i| {
        let t = coords[0] * (1.0 + i as f32) + coords[1] * 0.5 + phase;
        t.sin() * 0.5 + 0.5
    })
}
