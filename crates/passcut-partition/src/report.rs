//! Partition report summarizing one pipeline run.

use std::fmt;

use passcut_ir::NodeIndex;
use serde::Serialize;

use crate::config::Strategy;
use crate::oracle::PartitionCost;
use crate::search::DecisionRecord;
use crate::state::Decision;
use crate::usage::ResourceUsage;

/// Resource figures of one emitted pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PassSummary {
    pub id: usize,
    pub label: String,
    pub statements: usize,
    pub channels_in: usize,
    pub usage: ResourceUsage,
}

/// Summary report of a partitioning run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PartitionReport {
    /// Target profile name.
    pub target: String,
    pub strategy: Strategy,
    /// Total pipeline duration in milliseconds.
    pub duration_ms: u64,
    /// DAG nodes, root and leaves included.
    pub node_count: usize,
    /// Statement nodes reachable from the root.
    pub op_count: usize,
    /// Multiply-referenced statement nodes.
    pub shared_node_count: usize,
    /// Save-vs-recompute decisions, in the order they were fixed.
    pub decisions: Vec<DecisionRecord>,
    /// Region evaluations spent by the search.
    pub evaluations: u64,
    pub passes: Vec<PassSummary>,
    /// Values carried between passes.
    pub shared_variables: usize,
    pub cost: PartitionCost,
    pub weighted_cost: u64,
    /// Content hash of the serialized partition.
    pub fingerprint: String,
    /// Whether interpreter verification ran and passed.
    pub verified: Option<bool>,
}

impl PartitionReport {
    /// Nodes fixed as pass boundaries.
    pub fn saved(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.decisions
            .iter()
            .filter(|d| d.decision == Decision::ForceSave)
            .map(|d| d.node)
    }
}

impl fmt::Display for PartitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Partition Report ===")?;
        writeln!(f, "Target: {}", self.target)?;
        writeln!(f, "Strategy: {}", self.strategy)?;
        writeln!(f, "Duration: {} ms", self.duration_ms)?;
        writeln!(f)?;

        writeln!(f, "--- DAG ---")?;
        writeln!(
            f,
            "  Nodes: {} ({} statements, {} shared)",
            self.node_count, self.op_count, self.shared_node_count
        )?;
        writeln!(f, "  Evaluations: {}", self.evaluations)?;

        if !self.decisions.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Decisions ({}) ---", self.decisions.len())?;
            for d in &self.decisions {
                let choice = match d.decision {
                    Decision::ForceSave => "save",
                    Decision::ForceRecompute => "recompute",
                    Decision::Unset => "unset",
                };
                writeln!(
                    f,
                    "  {} [{}]: {} (save: {} passes, recompute: {} passes{})",
                    d.node,
                    d.label,
                    choice,
                    d.save.cost.passes,
                    d.recompute.cost.passes,
                    if d.recompute.valid { "" } else { ", invalid" },
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "--- Passes ({}) ---", self.passes.len())?;
        for pass in &self.passes {
            writeln!(
                f,
                "  Pass {} [{}]: {} statements, {} channels in; {}",
                pass.id, pass.label, pass.statements, pass.channels_in, pass.usage
            )?;
        }
        writeln!(f, "  Shared variables: {}", self.shared_variables)?;
        writeln!(
            f,
            "  Cost: {} (passes {}, textures {}, instructions {})",
            self.weighted_cost, self.cost.passes, self.cost.textures, self.cost.instructions
        )?;

        if let Some(passed) = self.verified {
            writeln!(f)?;
            writeln!(
                f,
                "--- Verification: {} ---",
                if passed { "PASSED" } else { "FAILED" }
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Fingerprint: {}", self.fingerprint)?;
        Ok(())
    }
}
