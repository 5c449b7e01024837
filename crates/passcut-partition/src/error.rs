//! Partitioning errors.

use std::fmt;

use passcut_ir::DagError;
use serde::Serialize;
use thiserror::Error;

/// Why no partition within the target's limits was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum InfeasibleReason {
    /// The target name is not registered.
    UnsupportedTarget,
    /// A single statement exceeds the limits even alone in a pass.
    NodeExceedsLimits { node: String, detail: String },
    /// A pass region could not be brought within the limits.
    PassExceedsLimits { pass: String, detail: String },
    /// The evaluation budget ran out before the search finished.
    BudgetExhausted { evaluations: u64 },
}

impl fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfeasibleReason::UnsupportedTarget => write!(f, "unsupported target"),
            InfeasibleReason::NodeExceedsLimits { node, detail } => {
                write!(f, "statement '{node}' exceeds limits on its own ({detail})")
            }
            InfeasibleReason::PassExceedsLimits { pass, detail } => {
                write!(f, "pass rooted at '{pass}' exceeds limits ({detail})")
            }
            InfeasibleReason::BudgetExhausted { evaluations } => {
                write!(f, "evaluation budget exhausted after {evaluations} evaluations")
            }
        }
    }
}

/// Errors that can occur while partitioning a block.
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("malformed input: {0}")]
    Malformed(#[from] DagError),

    #[error("no feasible partition for target '{target}': {reason}")]
    Infeasible {
        target: String,
        reason: InfeasibleReason,
    },

    #[error("exhaustive search over {nodes} nodes exceeds the cap of {cap}")]
    SearchTooLarge { nodes: usize, cap: usize },

    #[error("partition does not reproduce the original program: {detail}")]
    VerifyFailed { detail: String },

    #[error("invalid configuration: {detail}")]
    Config { detail: String },

    #[error("cannot materialize pass: {detail}")]
    Materialize { detail: String },
}

impl PartitionError {
    pub(crate) fn infeasible(target: &str, reason: InfeasibleReason) -> Self {
        PartitionError::Infeasible {
            target: target.to_string(),
            reason,
        }
    }
}
