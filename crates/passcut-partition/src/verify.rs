//! Check a partition against the block it came from.
//!
//! The original block and the passes run through the reference interpreter
//! on the same pseudo-random inputs. Channel values written by a pass are
//! carried forward to the passes after it, exactly as the runtime would
//! bind them, and every block output must match within a relative tolerance.

use passcut_ir::{evaluate, Block, Env, VarKind};

use crate::config::PartitionConfig;
use crate::error::PartitionError;
use crate::materialize::Partition;

/// splitmix64: small, seedable, and stable across platforms.
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[lo, hi)`.
    pub fn next_f32(&mut self, lo: f32, hi: f32) -> f32 {
        let unit = (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32;
        lo + (hi - lo) * unit
    }
}

/// External values of `block` (inputs, parameters, streams), each lane drawn
/// from `[0.1, 1.0)`.
pub fn random_env(block: &Block, rng: &mut SplitMix64) -> Env {
    block
        .variables
        .iter()
        .filter(|v| matches!(v.kind, VarKind::Input | VarKind::Param | VarKind::Stream))
        .map(|v| {
            let lanes = [
                rng.next_f32(0.1, 1.0),
                rng.next_f32(0.1, 1.0),
                rng.next_f32(0.1, 1.0),
                rng.next_f32(0.1, 1.0),
            ];
            (v.name.clone(), lanes)
        })
        .collect()
}

/// Run the passes in order, carrying their channel writes forward.
pub fn run_partition(partition: &Partition, env: &Env) -> Result<Env, PartitionError> {
    let mut carried = env.clone();
    let mut outputs = Env::new();
    for pass in &partition.passes {
        let written = evaluate(&pass.body, &carried).map_err(|e| PartitionError::VerifyFailed {
            detail: format!("pass {}: {e}", pass.id),
        })?;
        for (name, value) in written {
            if pass.outputs.contains(&name) {
                outputs.insert(name, value);
            } else {
                carried.insert(name, value);
            }
        }
    }
    Ok(outputs)
}

fn close(a: f32, b: f32, tolerance: f32) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    (a - b).abs() <= tolerance * 1.0f32.max(a.abs()).max(b.abs())
}

/// Compare the partition against `block` on `config.verify_samples` inputs.
pub fn verify_partition(
    block: &Block,
    partition: &Partition,
    config: &PartitionConfig,
) -> Result<(), PartitionError> {
    let mut rng = SplitMix64::new(config.seed);
    for sample in 0..config.verify_samples {
        let env = random_env(block, &mut rng);
        let expected = evaluate(block, &env).map_err(|e| PartitionError::VerifyFailed {
            detail: format!("original block: {e}"),
        })?;
        let actual = run_partition(partition, &env)?;

        for var in block.variables.iter().filter(|v| v.kind == VarKind::Output) {
            let Some(want) = expected.get(&var.name) else {
                continue;
            };
            let Some(got) = actual.get(&var.name) else {
                return Err(PartitionError::VerifyFailed {
                    detail: format!("output '{}' is never written", var.name),
                });
            };
            let lanes = usize::from(var.size.min(4));
            for lane in 0..lanes {
                if !close(want[lane], got[lane], config.verify_tolerance) {
                    return Err(PartitionError::VerifyFailed {
                        detail: format!(
                            "sample {sample}: {}[{lane}] = {} but expected {}",
                            var.name, got[lane], want[lane]
                        ),
                    });
                }
            }
        }
    }
    tracing::debug!(samples = config.verify_samples, "partition verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::materialize;
    use crate::testutil::*;
    use passcut_ir::{build_dag, Destination, NodeIndex, Opcode, OperandKey, Statement};

    #[test]
    fn splitmix_is_deterministic() {
        let mut a = SplitMix64::new(7);
        let mut b = SplitMix64::new(7);
        for _ in 0..8 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        let x = SplitMix64::new(1).next_f32(0.1, 1.0);
        assert!((0.1..1.0).contains(&x));
    }

    #[test]
    fn split_chain_matches_original() {
        let block = mad_chain(5);
        let dag = build_dag(&block).unwrap();
        let partition = materialize(&dag, &[NodeIndex(3), NodeIndex(5)]).unwrap();
        verify_partition(&block, &partition, &PartitionConfig::default()).unwrap();
    }

    #[test]
    fn textures_and_partial_writes_survive_splitting() {
        let mut b = Block::new();
        let uv = b.var("uv", VarKind::Input, 2);
        let tex = b.var("tex0", VarKind::Texture, 4);
        let s = b.var("s", VarKind::Temp, 4);
        let out = b.var("out", VarKind::Output, 4);
        b.emit(s, Opcode::Tex, &[tex, uv]);
        b.push(Statement::new(
            Destination::new(s).masked("w".parse().unwrap()),
            Opcode::Mul,
            &[OperandKey::new(s).swizzled("x".parse().unwrap()), OperandKey::new(uv)],
        ));
        b.emit(out, Opcode::Add, &[s, s]);
        let dag = build_dag(&b).unwrap();
        for marks in [vec![], vec![NodeIndex(3)], vec![NodeIndex(3), NodeIndex(4)]] {
            let partition = materialize(&dag, &marks).unwrap();
            verify_partition(&b, &partition, &PartitionConfig::default()).unwrap();
        }
    }

    #[test]
    fn detects_a_wrong_pass() {
        let block = mad_chain(3);
        let dag = build_dag(&block).unwrap();
        let mut partition = materialize(&dag, &[]).unwrap();
        partition.passes[0].body.statements[0].op = Opcode::Add;
        let err = verify_partition(&block, &partition, &PartitionConfig::default()).unwrap_err();
        assert!(matches!(err, PartitionError::VerifyFailed { .. }));
    }

    #[test]
    fn tolerance_and_nan() {
        assert!(close(1.0, 1.00001, 1e-4));
        assert!(!close(1.0, 1.1, 1e-4));
        assert!(close(f32::NAN, f32::NAN, 0.0));
        assert!(!close(f32::NAN, 0.0, 1.0));
    }
}
