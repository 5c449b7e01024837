//! Multi-pass partitioning for passcut.
//!
//! A shader block that exceeds a target's per-pass ceilings is split into a
//! sequence of passes, each within budget, with intermediate values carried
//! between passes over channels. [`partition_block`] runs the whole pipeline;
//! the individual stages (partial dominator tree, resource oracle, greedy
//! and exhaustive searches, materializer, verification) are public for
//! callers that drive them directly.

pub mod config;
pub mod error;
pub mod full_search;
pub mod ksubset;
pub mod materialize;
pub mod oracle;
pub mod pdt;
pub mod pipeline;
pub mod rds;
pub mod region;
pub mod report;
pub mod search;
pub mod state;
pub mod usage;
pub mod verify;

#[cfg(test)]
mod testutil;

pub use config::{CostWeights, PartitionConfig, Strategy};
pub use error::{InfeasibleReason, PartitionError};
pub use full_search::full_search;
pub use ksubset::NextKSubset;
pub use materialize::{materialize, Partition, Pass, PassRoot, SharedVariable};
pub use oracle::{MergeCandidate, PartitionCost, ResourceOracle, Violation};
pub use pdt::Pdt;
pub use pipeline::{partition_block, PartitionOutput};
pub use rds::{rds_heuristic, rds_search};
pub use region::{collect_passes, collect_region, region_usage, stmt_usage, Region};
pub use report::{PartitionReport, PassSummary};
pub use search::{DecisionRecord, PartitionEval, SearchContext, SearchOutcome};
pub use state::{Decision, NodeFlags, NodeState};
pub use usage::ResourceUsage;
pub use verify::{run_partition, verify_partition, SplitMix64};
