//! Blocks shared by the unit tests.

use passcut_ir::{Block, Opcode, VarId, VarKind};
use passcut_targets::{ResourceLimits, ShaderStage, TargetProfile, TargetRegistry};

/// `n` chained multiply-adds: `t0 = mad a,a,a; t1 = mad t0,a,a; ... out = ...`.
pub fn mad_chain(n: usize) -> Block {
    let mut b = Block::new();
    let a = b.var("a", VarKind::Input, 4);
    let mut prev = a;
    for i in 0..n {
        let dest = if i + 1 == n {
            b.var("out", VarKind::Output, 4)
        } else {
            b.var(&format!("t{i}"), VarKind::Temp, 4)
        };
        b.emit(dest, Opcode::Mad, &[prev, a, a]);
        prev = dest;
    }
    b
}

/// `out = tex(tex0, uv) * k`.
pub fn textured_block() -> Block {
    let mut b = Block::new();
    let uv = b.var("uv", VarKind::Input, 2);
    let tex = b.var("tex0", VarKind::Texture, 4);
    let k = b.var("k", VarKind::Param, 4);
    let s = b.var("s", VarKind::Temp, 4);
    let out = b.var("out", VarKind::Output, 4);
    b.emit(s, Opcode::Tex, &[tex, uv]);
    b.emit(out, Opcode::Mul, &[s, k]);
    b
}

fn add_chain(b: &mut Block, prefix: &str, from: VarId, step: VarId, len: usize) -> VarId {
    let mut prev = from;
    for i in 0..len {
        let t = b.var(&format!("{prefix}{i}"), VarKind::Temp, 4);
        b.emit(t, Opcode::Add, &[prev, step]);
        prev = t;
    }
    prev
}

/// A value `x` built by `shared_len` additions, read by two consumers that
/// each add `consumer_len` more and finish with a texture lookup.
pub fn shared_block(shared_len: usize, consumer_len: usize) -> Block {
    let mut b = Block::new();
    let a = b.var("a", VarKind::Input, 4);
    let x = add_chain(&mut b, "x", a, a, shared_len);
    for i in 0..2 {
        let tex = b.var(&format!("tex{i}"), VarKind::Texture, 4);
        let c = add_chain(&mut b, &format!("c{i}_"), x, a, consumer_len);
        let out = b.var(&format!("out{i}"), VarKind::Output, 4);
        b.emit(out, Opcode::Tex, &[tex, c]);
    }
    b
}

/// A registry holding one custom fragment profile.
pub fn registry_with(name: &str, limits: ResourceLimits) -> TargetRegistry {
    let mut registry = TargetRegistry::new();
    let profile = TargetProfile::new(name, ShaderStage::Fragment, limits);
    registry.replace(profile);
    registry
}

/// Ceilings on instructions and textures only.
pub fn instr_tex_limits(instructions: u32, textures: u32) -> ResourceLimits {
    ResourceLimits {
        instructions,
        textures,
        ..ResourceLimits::unbounded()
    }
}
