//! Per-pixel lighting: a fragment shader too long for small targets.
//!
//! Builds a Blinn-Phong block with a normal map and `lights` point lights.
//! The perturbed normal and the albedo sample are read by every light term,
//! so they are the shared values the partitioner must decide to save or
//! recompute.
//!
//! ```text
//!   uv ──► tex normal_map ──► mad ──► norm ─┬──────────────┐
//!                                          │   per light:  │
//!   light_i ──► norm ──┬──► dot ──► max ───┼──► mad ──┐    │
//!   view ──► norm ─► add ─► norm ─► dot ─► max ─► pow ┘    │
//!   uv ──► tex albedo ─────────────────────────────┘  ├─► add ... ─► color
//! ```

use passcut_ir::{Block, Opcode, VarId, VarKind, Variable};
use passcut_targets::{ResourceLimits, ShaderStage, TargetProfile};

fn constant(b: &mut Block, name: &str, v: f32) -> VarId {
    b.declare(Variable::new(name, VarKind::Const, 4).with_value(vec![v; 4]))
}

/// Build the lighting block for `lights` point lights (at least one).
pub fn lighting_block(lights: usize) -> Block {
    let lights = lights.max(1);
    let mut b = Block::new();

    let uv = b.var("uv", VarKind::Input, 2);
    let view = b.var("view", VarKind::Input, 3);
    let normal_map = b.var("normal_map", VarKind::Texture, 4);
    let albedo_map = b.var("albedo_map", VarKind::Texture, 4);
    let ambient = b.var("ambient", VarKind::Param, 4);
    let shininess = b.var("shininess", VarKind::Param, 1);
    let two = constant(&mut b, "two", 2.0);
    let minus_one = constant(&mut b, "minus_one", -1.0);
    let zero = constant(&mut b, "zero", 0.0);

    // Normal from the map, expanded from [0, 1] to [-1, 1].
    let n_tex = b.var("n_tex", VarKind::Temp, 4);
    b.emit(n_tex, Opcode::Tex, &[normal_map, uv]);
    let n_raw = b.var("n_raw", VarKind::Temp, 3);
    b.emit(n_raw, Opcode::Mad, &[n_tex, two, minus_one]);
    let n = b.var("n", VarKind::Temp, 3);
    b.emit(n, Opcode::Norm, &[n_raw]);

    let v = b.var("v", VarKind::Temp, 3);
    b.emit(v, Opcode::Norm, &[view]);
    let albedo = b.var("albedo", VarKind::Temp, 4);
    b.emit(albedo, Opcode::Tex, &[albedo_map, uv]);

    let mut acc = ambient;
    for i in 0..lights {
        let light = b.var(&format!("light{i}"), VarKind::Input, 3);
        let t = |name: &str| format!("{name}{i}");

        let l = b.var(&t("l"), VarKind::Temp, 3);
        b.emit(l, Opcode::Norm, &[light]);
        let h = b.var(&t("h"), VarKind::Temp, 3);
        b.emit(h, Opcode::Add, &[l, v]);
        let hn = b.var(&t("hn"), VarKind::Temp, 3);
        b.emit(hn, Opcode::Norm, &[h]);

        let ndl = b.var(&t("ndl"), VarKind::Temp, 1);
        b.emit(ndl, Opcode::Dot, &[n, l]);
        let diffuse = b.var(&t("diffuse"), VarKind::Temp, 1);
        b.emit(diffuse, Opcode::Max, &[ndl, zero]);

        let ndh = b.var(&t("ndh"), VarKind::Temp, 1);
        b.emit(ndh, Opcode::Dot, &[n, hn]);
        let facing = b.var(&t("facing"), VarKind::Temp, 1);
        b.emit(facing, Opcode::Max, &[ndh, zero]);
        let specular = b.var(&t("specular"), VarKind::Temp, 1);
        b.emit(specular, Opcode::Pow, &[facing, shininess]);

        let term = b.var(&t("term"), VarKind::Temp, 4);
        b.emit(term, Opcode::Mad, &[diffuse, albedo, specular]);

        let sum = if i + 1 == lights {
            b.var("color", VarKind::Output, 4)
        } else {
            b.var(&t("acc"), VarKind::Temp, 4)
        };
        b.emit(sum, Opcode::Add, &[acc, term]);
        acc = sum;
    }
    b
}

/// Native instructions of the whole block, one pass.
pub fn instruction_total(block: &Block) -> u32 {
    block
        .statements
        .iter()
        .map(|s| s.op.instruction_cost())
        .sum()
}

/// A fragment profile limited only in instructions and texture lookups.
pub fn budget_target(name: &str, instructions: u32, textures: u32) -> TargetProfile {
    let mut profile = TargetProfile::new(
        name,
        ShaderStage::Fragment,
        ResourceLimits {
            instructions,
            textures,
            ..ResourceLimits::unbounded()
        },
    );
    profile.description = Some(format!("{instructions} instructions, {textures} textures"));
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_count_grows_per_light() {
        // 5 shared statements, 10 per light.
        assert_eq!(lighting_block(1).len(), 15);
        assert_eq!(lighting_block(2).len(), 25);
        assert_eq!(lighting_block(0).len(), 15);
    }

    #[test]
    fn instruction_total_counts_macro_ops() {
        // tex, mad, norm(3), norm(3), tex + per light: norm(3) add norm(3) dot max dot max pow(3) mad add
        assert_eq!(instruction_total(&lighting_block(1)), 9 + 16);
        assert_eq!(instruction_total(&lighting_block(2)), 9 + 32);
    }
}
