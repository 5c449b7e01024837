//! Resource oracle: the target-specific policy behind every search decision.
//!
//! The oracle answers four questions about a region summary: does it fit
//! (`valid`), is it cheap enough to duplicate (`recompute`), what does a
//! whole partition cost (`cost`), and which of several equally sized merges
//! to keep (`merge`). It holds no search state.

use std::fmt;

use passcut_targets::{Resource, ResourceLimits, TargetRegistry};
use serde::Serialize;

use crate::config::{CostWeights, PartitionConfig};
use crate::usage::ResourceUsage;

/// Capacity of the resolved target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Limited(ResourceLimits),
    /// Unknown target: nothing fits.
    Zero,
}

/// One dimension over its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub resource: Resource,
    pub used: u32,
    pub limit: u32,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} > {}", self.resource, self.used, self.limit)
    }
}

/// Join violations for an error message.
pub fn describe_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Aggregate figures a partition is ranked by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionCost {
    pub passes: u32,
    pub textures: u32,
    pub instructions: u32,
}

/// A feasible merge found while enumerating subsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCandidate {
    /// Positions in the child list that are folded in.
    pub subset: Vec<usize>,
    /// Instructions of the merged region.
    pub instructions: u32,
}

#[derive(Debug, Clone)]
pub struct ResourceOracle {
    target: String,
    capacity: Capacity,
    recompute_ratio: f64,
    weights: CostWeights,
}

impl ResourceOracle {
    pub fn new(target: &str, limits: ResourceLimits, config: &PartitionConfig) -> Self {
        Self {
            target: target.to_string(),
            capacity: Capacity::Limited(limits),
            recompute_ratio: config.recompute_ratio,
            weights: config.weights,
        }
    }

    /// Resolve `target` through `registry`. Unknown names give a
    /// zero-capacity oracle.
    pub fn for_target(registry: &TargetRegistry, target: &str, config: &PartitionConfig) -> Self {
        let capacity = match registry.limits(target) {
            Some(limits) => Capacity::Limited(limits),
            None => {
                tracing::warn!(target_name = target, "unknown target, nothing will fit");
                Capacity::Zero
            }
        };
        Self {
            target: target.to_string(),
            capacity,
            recompute_ratio: config.recompute_ratio,
            weights: config.weights,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_supported(&self) -> bool {
        matches!(self.capacity, Capacity::Limited(_))
    }

    pub fn limits(&self) -> ResourceLimits {
        match self.capacity {
            Capacity::Limited(limits) => limits,
            Capacity::Zero => ResourceLimits::zero(),
        }
    }

    /// Whether `region` plus the `committed` resources fits in one pass.
    pub fn valid(&self, region: &ResourceUsage, committed: &ResourceUsage) -> bool {
        match self.capacity {
            Capacity::Zero => false,
            Capacity::Limited(limits) => {
                let total = *region + *committed;
                Resource::ALL
                    .iter()
                    .all(|&r| total.get(r) <= limits.get(r))
            }
        }
    }

    /// Every dimension in which `region` plus `committed` exceeds the limits.
    pub fn violations(&self, region: &ResourceUsage, committed: &ResourceUsage) -> Vec<Violation> {
        let limits = self.limits();
        let total = *region + *committed;
        Resource::ALL
            .iter()
            .filter(|&&r| total.get(r) > limits.get(r))
            .map(|&r| Violation {
                resource: r,
                used: total.get(r),
                limit: limits.get(r),
            })
            .collect()
    }

    /// Whether a shared value is cheap enough to recompute in each consumer.
    pub fn recompute(&self, region: &ResourceUsage) -> bool {
        match self.capacity {
            Capacity::Zero => false,
            Capacity::Limited(limits) => Resource::ALL.iter().all(|&r| {
                f64::from(region.get(r)) <= self.recompute_ratio * f64::from(limits.get(r))
            }),
        }
    }

    /// Weighted cost of a partition.
    pub fn cost(&self, cost: &PartitionCost) -> u64 {
        self.weights.pass * u64::from(cost.passes)
            + self.weights.texture * u64::from(cost.textures)
            + self.weights.instruction * u64::from(cost.instructions)
    }

    /// Pick among feasible merges of the same size: fewest instructions,
    /// then discovery order.
    pub fn merge(&self, candidates: &[MergeCandidate]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(i, c)| (c.instructions, *i))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    fn usage(instructions: u32, textures: u32) -> ResourceUsage {
        ResourceUsage {
            instructions,
            textures,
            ..Default::default()
        }
    }

    #[test]
    fn valid_checks_each_dimension() {
        let oracle = ResourceOracle::new("t", instr_tex_limits(10, 1), &PartitionConfig::default());
        assert!(oracle.valid(&usage(10, 1), &ResourceUsage::default()));
        assert!(!oracle.valid(&usage(11, 0), &ResourceUsage::default()));
        assert!(!oracle.valid(&usage(1, 2), &ResourceUsage::default()));
        assert!(!oracle.valid(&usage(6, 0), &usage(5, 0)));

        let v = oracle.violations(&usage(12, 3), &ResourceUsage::default());
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].resource, Resource::Instructions);
        assert_eq!(describe_violations(&v), "instructions 12 > 10, textures 3 > 1");
    }

    #[test]
    fn unknown_target_has_zero_capacity() {
        let registry = TargetRegistry::new();
        let oracle = ResourceOracle::for_target(&registry, "nope", &PartitionConfig::default());
        assert!(!oracle.is_supported());
        assert!(!oracle.valid(&ResourceUsage::default(), &ResourceUsage::default()));
        assert!(!oracle.recompute(&ResourceUsage::default()));
    }

    #[test]
    fn recompute_uses_ratio() {
        let oracle = ResourceOracle::new("t", instr_tex_limits(100, 1), &PartitionConfig::default());
        assert!(oracle.recompute(&usage(50, 0)));
        assert!(!oracle.recompute(&usage(51, 0)));
        // half of one texture unit rounds nothing up
        assert!(!oracle.recompute(&usage(10, 1)));
    }

    #[test]
    fn cost_and_merge() {
        let oracle = ResourceOracle::new("t", ResourceLimits::unbounded(), &PartitionConfig::default());
        let cost = PartitionCost {
            passes: 2,
            textures: 3,
            instructions: 40,
        };
        assert_eq!(oracle.cost(&cost), 2000 + 30 + 40);

        let candidates = vec![
            MergeCandidate { subset: vec![0], instructions: 9 },
            MergeCandidate { subset: vec![1], instructions: 7 },
            MergeCandidate { subset: vec![2], instructions: 7 },
        ];
        assert_eq!(oracle.merge(&candidates), Some(1));
        assert_eq!(oracle.merge(&[]), None);
    }
}
