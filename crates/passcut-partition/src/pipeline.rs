//! Partitioning pipeline orchestrator.

use std::time::Instant;

use passcut_ir::{build_dag, content_hash, hash_hex, Block, Dag};
use passcut_targets::TargetRegistry;

use crate::config::{PartitionConfig, Strategy};
use crate::error::{InfeasibleReason, PartitionError};
use crate::full_search::full_search;
use crate::materialize::{materialize, Partition};
use crate::oracle::{describe_violations, ResourceOracle};
use crate::pdt::Pdt;
use crate::rds::{rds_heuristic, rds_search};
use crate::region::stmt_usage;
use crate::report::{PartitionReport, PassSummary};
use crate::usage::ResourceUsage;
use crate::verify::verify_partition;

/// Output of a successful partitioning run.
#[derive(Debug, Clone)]
pub struct PartitionOutput {
    /// Ordered passes and shared variables.
    pub partition: Partition,
    /// Run statistics.
    pub report: PartitionReport,
}

/// Run the full pipeline:
/// DAG -> PDT -> oracle -> search -> feasibility -> materialize -> verify -> report.
pub fn partition_block(
    block: &Block,
    target: &str,
    registry: &TargetRegistry,
    config: &PartitionConfig,
) -> Result<PartitionOutput, PartitionError> {
    let start = Instant::now();
    config.validate()?;

    // Stage 1: dependency DAG
    let dag = build_dag(block)?;

    // Stage 2: target policy
    let oracle = ResourceOracle::for_target(registry, target, config);
    if !oracle.is_supported() {
        return Err(PartitionError::infeasible(
            target,
            InfeasibleReason::UnsupportedTarget,
        ));
    }

    // Stage 3: dominators and shared nodes
    let pdt = Pdt::build(&dag)?;

    // Stage 4: no search can split a single statement
    let reachable: Vec<_> = dag
        .postorder_from(dag.root())
        .into_iter()
        .filter(|&v| dag.node(v).is_op())
        .collect();
    check_statements(&dag, &oracle, &reachable)?;

    // Stage 5: search
    let outcome = match config.strategy {
        Strategy::Greedy => rds_search(&dag, &pdt, &oracle, config)?,
        Strategy::Heuristic => rds_heuristic(&dag, &pdt, &oracle, config)?,
        Strategy::Exhaustive => full_search(&dag, &oracle, config)?,
    };

    // Stage 6: materialize and re-check every pass
    let partition = materialize(&dag, &outcome.marked)?;
    let zero = ResourceUsage::default();
    for pass in &partition.passes {
        if !oracle.valid(&pass.usage, &zero) {
            return Err(PartitionError::infeasible(
                target,
                InfeasibleReason::PassExceedsLimits {
                    pass: pass.label.clone(),
                    detail: describe_violations(&oracle.violations(&pass.usage, &zero)),
                },
            ));
        }
    }

    // Stage 7: optional interpreter check
    let verified = if config.verify {
        verify_partition(block, &partition, config)?;
        Some(true)
    } else {
        None
    };

    let hash = content_hash(&partition).map_err(|e| PartitionError::Materialize {
        detail: format!("cannot serialize partition: {e}"),
    })?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let report = PartitionReport {
        target: target.to_string(),
        strategy: config.strategy,
        duration_ms,
        node_count: dag.node_count(),
        op_count: reachable.len(),
        shared_node_count: pdt.shared_count(&dag),
        decisions: outcome.decisions,
        evaluations: outcome.evaluations,
        passes: partition
            .passes
            .iter()
            .map(|p| PassSummary {
                id: p.id,
                label: p.label.clone(),
                statements: p.nodes.len(),
                channels_in: p.channels_in.len(),
                usage: p.usage,
            })
            .collect(),
        shared_variables: partition.shared_count(),
        cost: outcome.eval.cost,
        weighted_cost: outcome.eval.weighted,
        fingerprint: hash_hex(&hash),
        verified,
    };
    tracing::info!(
        target_name = target,
        passes = partition.pass_count(),
        shared = partition.shared_count(),
        duration_ms,
        "partitioned block"
    );

    Ok(PartitionOutput { partition, report })
}

fn check_statements(
    dag: &Dag,
    oracle: &ResourceOracle,
    ops: &[passcut_ir::NodeIndex],
) -> Result<(), PartitionError> {
    let zero = ResourceUsage::default();
    for &v in ops {
        let usage = stmt_usage(dag, v);
        if !oracle.valid(&usage, &zero) {
            return Err(PartitionError::infeasible(
                oracle.target(),
                InfeasibleReason::NodeExceedsLimits {
                    node: dag.node(v).label.clone(),
                    detail: describe_violations(&oracle.violations(&usage, &zero)),
                },
            ));
        }
    }
    Ok(())
}
