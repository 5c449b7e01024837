//! Partitioner configuration.
//!
//! Every tunable of the search lives here: the recompute heuristic, the
//! cost weights, and the guards that bound the search. Configurations are
//! plain TOML files with kebab-case keys; any key left out keeps its default.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PartitionError;

/// Which search produces the marking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Recursive dominator subdivision with greedy merging.
    #[default]
    Greedy,
    /// One greedy subdivision; shared nodes follow the recompute rule alone.
    Heuristic,
    /// Enumerate every marking of the operation nodes (small DAGs only).
    Exhaustive,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Greedy => f.write_str("greedy"),
            Strategy::Heuristic => f.write_str("heuristic"),
            Strategy::Exhaustive => f.write_str("exhaustive"),
        }
    }
}

/// Weights of the partition cost `pass·passes + texture·textures + instruction·instructions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CostWeights {
    pub pass: u64,
    pub texture: u64,
    pub instruction: u64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            pass: 1000,
            texture: 10,
            instruction: 1,
        }
    }
}

/// Configuration for one partitioning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PartitionConfig {
    /// Search strategy.
    pub strategy: Strategy,
    /// A shared node is recomputed when every dimension of its region uses
    /// at most this fraction of the limit.
    pub recompute_ratio: f64,
    /// Cost weights for ranking valid partitions.
    pub weights: CostWeights,
    /// Above this many candidate children, merging adds children greedily
    /// instead of enumerating subsets.
    pub max_merge_fanout: usize,
    /// Upper bound on region evaluations for one run.
    pub max_evaluations: u64,
    /// Largest number of operation nodes the exhaustive search accepts.
    pub exhaustive_node_cap: usize,
    /// Check the partition against the original block with the interpreter.
    pub verify: bool,
    /// Number of random input sets used by verification.
    pub verify_samples: usize,
    /// Relative tolerance when comparing interpreted outputs.
    pub verify_tolerance: f32,
    /// Seed for verification inputs.
    pub seed: u64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Greedy,
            recompute_ratio: 0.5,
            weights: CostWeights::default(),
            max_merge_fanout: 8,
            max_evaluations: 1_000_000,
            exhaustive_node_cap: 20,
            verify: false,
            verify_samples: 4,
            verify_tolerance: 1e-4,
            seed: 0x5eed,
        }
    }
}

impl PartitionConfig {
    /// Parse a configuration from TOML and validate it.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, PartitionError> {
        let config: PartitionConfig =
            toml::from_str(toml_str).map_err(|e| PartitionError::Config {
                detail: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, PartitionError> {
        let content = std::fs::read_to_string(path).map_err(|e| PartitionError::Config {
            detail: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject settings the search cannot run with.
    pub fn validate(&self) -> Result<(), PartitionError> {
        let fail = |detail: String| Err(PartitionError::Config { detail });
        if !(self.recompute_ratio > 0.0 && self.recompute_ratio <= 1.0) {
            return fail(format!(
                "recompute-ratio must be in (0, 1], got {}",
                self.recompute_ratio
            ));
        }
        if self.max_merge_fanout == 0 {
            return fail("max-merge-fanout must be at least 1".into());
        }
        if self.max_merge_fanout > 16 {
            return fail(format!(
                "max-merge-fanout {} would enumerate more than 2^16 subsets per merge",
                self.max_merge_fanout
            ));
        }
        if self.max_evaluations == 0 {
            return fail("max-evaluations must be at least 1".into());
        }
        if self.verify_tolerance.is_nan() || self.verify_tolerance < 0.0 {
            return fail("verify-tolerance must be non-negative".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PartitionConfig::default();
        assert_eq!(c.recompute_ratio, 0.5);
        assert_eq!(c.weights.pass, 1000);
        assert_eq!(c.exhaustive_node_cap, 20);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = PartitionConfig::from_toml_str(
            r#"
strategy = "exhaustive"
recompute-ratio = 0.25

[weights]
texture = 50
"#,
        )
        .unwrap();
        assert_eq!(c.strategy, Strategy::Exhaustive);
        assert_eq!(c.recompute_ratio, 0.25);
        assert_eq!(c.weights.texture, 50);
        assert_eq!(c.weights.pass, 1000);
        assert_eq!(c.max_merge_fanout, 8);
    }

    #[test]
    fn rejects_bad_ratio() {
        let err = PartitionConfig::from_toml_str("recompute-ratio = 1.5").unwrap_err();
        assert!(matches!(err, PartitionError::Config { .. }));
    }

    #[test]
    fn heuristic_strategy_parses() {
        let c = PartitionConfig::from_toml_str("strategy = \"heuristic\"").unwrap();
        assert_eq!(c.strategy, Strategy::Heuristic);
        assert_eq!(c.strategy.to_string(), "heuristic");
    }

    #[test]
    fn rejects_unknown_strategy() {
        assert!(PartitionConfig::from_toml_str("strategy = \"annealing\"").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passcut.toml");
        std::fs::write(&path, "max-evaluations = 500\nverify = true\n").unwrap();
        let c = PartitionConfig::load(&path).unwrap();
        assert_eq!(c.max_evaluations, 500);
        assert!(c.verify);
    }
}
