//! Exhaustive reference search.
//!
//! Tries every subset of the reachable operation nodes as the marking,
//! smallest subsets first, and keeps the cheapest valid one. Exponential;
//! only usable on small DAGs, which is exactly where it serves as a yardstick
//! for the greedy search.

use passcut_ir::{Dag, NodeIndex};

use crate::config::PartitionConfig;
use crate::error::{InfeasibleReason, PartitionError};
use crate::ksubset::NextKSubset;
use crate::oracle::ResourceOracle;
use crate::search::{PartitionEval, SearchContext, SearchOutcome};

/// Cheapest valid marking over every subset of the reachable operation nodes.
pub fn full_search(
    dag: &Dag,
    oracle: &ResourceOracle,
    config: &PartitionConfig,
) -> Result<SearchOutcome, PartitionError> {
    let candidates: Vec<NodeIndex> = dag
        .postorder_from(dag.root())
        .into_iter()
        .filter(|&v| dag.node(v).is_op())
        .collect();
    let n = candidates.len();
    if n > config.exhaustive_node_cap {
        return Err(PartitionError::SearchTooLarge {
            nodes: n,
            cap: config.exhaustive_node_cap,
        });
    }

    let mut ctx = SearchContext::new(dag, oracle, config.max_evaluations);
    let mut best: Option<(PartitionEval, Vec<NodeIndex>)> = None;
    let mut subsets = NextKSubset::new(n, 0);
    for k in 0..=n {
        // k marks give at least k passes.
        if best
            .as_ref()
            .is_some_and(|(eval, _)| k as u32 > eval.cost.passes)
        {
            break;
        }
        subsets.init(n, k);
        while let Some(subset) = subsets.next() {
            ctx.flags.unmark_all();
            for &i in subset {
                ctx.flags.mark(candidates[i]);
            }
            let eval = ctx.evaluate_partition()?;
            if !eval.valid {
                continue;
            }
            if best.as_ref().map_or(true, |(b, _)| eval.key() < b.key()) {
                best = Some((eval, ctx.flags.marked()));
            }
        }
    }

    let Some((eval, marked)) = best else {
        return Err(PartitionError::infeasible(
            oracle.target(),
            InfeasibleReason::PassExceedsLimits {
                pass: dag.node(dag.root()).label.clone(),
                detail: format!("no marking of {n} nodes fits"),
            },
        ));
    };
    tracing::debug!(
        nodes = n,
        passes = eval.cost.passes,
        evaluations = ctx.evaluations(),
        "exhaustive search done"
    );
    Ok(SearchOutcome {
        marked,
        evaluations: ctx.evaluations(),
        decisions: Vec::new(),
        eval,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use passcut_ir::build_dag;

    #[test]
    fn finds_the_three_pass_chain() {
        let dag = build_dag(&mad_chain(5)).unwrap();
        let oracle = ResourceOracle::new("t", instr_tex_limits(2, 0), &PartitionConfig::default());
        let out = full_search(&dag, &oracle, &PartitionConfig::default()).unwrap();
        assert_eq!(out.eval.cost.passes, 3);
        assert_eq!(out.marked.len(), 2);
        assert!(out.decisions.is_empty());
    }

    #[test]
    fn fitting_dag_needs_no_marks() {
        let dag = build_dag(&mad_chain(4)).unwrap();
        let oracle = ResourceOracle::new("t", instr_tex_limits(4, 0), &PartitionConfig::default());
        let out = full_search(&dag, &oracle, &PartitionConfig::default()).unwrap();
        assert!(out.marked.is_empty());
        assert_eq!(out.eval.cost.passes, 1);
    }

    #[test]
    fn refuses_large_dags() {
        let dag = build_dag(&mad_chain(6)).unwrap();
        let oracle = ResourceOracle::new("t", instr_tex_limits(2, 0), &PartitionConfig::default());
        let config = PartitionConfig {
            exhaustive_node_cap: 5,
            ..Default::default()
        };
        let err = full_search(&dag, &oracle, &config).unwrap_err();
        assert!(matches!(err, PartitionError::SearchTooLarge { nodes: 6, cap: 5 }));
    }

    #[test]
    fn infeasible_when_nothing_fits() {
        let dag = build_dag(&textured_block()).unwrap();
        let oracle = ResourceOracle::new("t", instr_tex_limits(4, 0), &PartitionConfig::default());
        let err = full_search(&dag, &oracle, &PartitionConfig::default()).unwrap_err();
        assert!(matches!(err, PartitionError::Infeasible { .. }));
    }
}
