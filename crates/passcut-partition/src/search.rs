//! State shared by the partition searches.
//!
//! A [`SearchContext`] owns the transient flags and the committed-resource
//! accumulator of one run, and counts every region evaluation against the
//! configured budget so no search can run unbounded.

use passcut_ir::{Dag, NodeIndex};
use serde::Serialize;

use crate::error::{InfeasibleReason, PartitionError};
use crate::oracle::{PartitionCost, ResourceOracle};
use crate::region::{collect_passes, collect_region, region_usage, Region};
use crate::state::{Decision, NodeFlags};
use crate::usage::ResourceUsage;

/// Result of evaluating a complete marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionEval {
    /// Every pass fits the target.
    pub valid: bool,
    pub cost: PartitionCost,
    /// Weighted cost from the oracle.
    pub weighted: u64,
}

impl PartitionEval {
    /// Ranking key: pass count first, weighted cost second.
    pub fn key(&self) -> (u32, u64) {
        (self.cost.passes, self.weighted)
    }
}

/// One save-vs-recompute decision taken by the greedy search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionRecord {
    pub node: NodeIndex,
    pub label: String,
    pub decision: Decision,
    pub save: PartitionEval,
    pub recompute: PartitionEval,
}

/// What a search hands back to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    /// Pass boundaries, in index order.
    pub marked: Vec<NodeIndex>,
    /// Region evaluations spent.
    pub evaluations: u64,
    /// Decisions in the order they were fixed (greedy search only).
    pub decisions: Vec<DecisionRecord>,
    pub eval: PartitionEval,
}

pub struct SearchContext<'a> {
    pub(crate) dag: &'a Dag,
    pub(crate) oracle: &'a ResourceOracle,
    pub(crate) flags: NodeFlags,
    pub(crate) committed: ResourceUsage,
    evaluations: u64,
    max_evaluations: u64,
}

impl<'a> SearchContext<'a> {
    pub fn new(dag: &'a Dag, oracle: &'a ResourceOracle, max_evaluations: u64) -> Self {
        Self {
            dag,
            oracle,
            flags: NodeFlags::new(dag.node_count()),
            committed: ResourceUsage::default(),
            evaluations: 0,
            max_evaluations,
        }
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    fn tick(&mut self) -> Result<(), PartitionError> {
        self.evaluations += 1;
        if self.evaluations > self.max_evaluations {
            return Err(PartitionError::infeasible(
                self.oracle.target(),
                InfeasibleReason::BudgetExhausted {
                    evaluations: self.max_evaluations,
                },
            ));
        }
        Ok(())
    }

    /// Clear every mark and the committed accumulator.
    pub fn reset(&mut self) {
        self.flags.unmark_all();
        self.committed = ResourceUsage::default();
    }

    pub fn region(&mut self, v: NodeIndex) -> Region {
        collect_region(self.dag, v, &mut self.flags)
    }

    /// Summary of the region rooted at `v` under the current marks.
    pub fn usage(&mut self, v: NodeIndex) -> Result<ResourceUsage, PartitionError> {
        self.tick()?;
        let region = self.region(v);
        Ok(region_usage(self.dag, &region))
    }

    /// Whether the region of `v` plus the committed resources fits.
    pub fn valid(&mut self, v: NodeIndex) -> Result<bool, PartitionError> {
        let usage = self.usage(v)?;
        Ok(self.oracle.valid(&usage, &self.committed))
    }

    /// Whether the region of `v` is cheap enough to duplicate.
    pub fn recompute(&mut self, v: NodeIndex) -> Result<bool, PartitionError> {
        let usage = self.usage(v)?;
        Ok(self.oracle.recompute(&usage))
    }

    /// Every pass under the current marks with its summary.
    pub fn passes(&mut self) -> Result<Vec<(Region, ResourceUsage)>, PartitionError> {
        let regions = collect_passes(self.dag, &mut self.flags);
        let mut out = Vec::with_capacity(regions.len());
        for region in regions {
            self.tick()?;
            let usage = region_usage(self.dag, &region);
            out.push((region, usage));
        }
        Ok(out)
    }

    /// Validity and cost of the current marking.
    pub fn evaluate_partition(&mut self) -> Result<PartitionEval, PartitionError> {
        let zero = ResourceUsage::default();
        let mut valid = true;
        let mut cost = PartitionCost::default();
        for (region, usage) in self.passes()? {
            valid &= self.oracle.valid(&usage, &zero);
            if !region.is_empty() {
                cost.passes += 1;
            }
            cost.textures += usage.textures;
            cost.instructions += usage.instructions;
        }
        Ok(PartitionEval {
            valid,
            cost,
            weighted: self.oracle.cost(&cost),
        })
    }

    /// Package the current marking.
    pub fn outcome(
        &mut self,
        decisions: Vec<DecisionRecord>,
    ) -> Result<SearchOutcome, PartitionError> {
        let eval = self.evaluate_partition()?;
        Ok(SearchOutcome {
            marked: self.flags.marked(),
            evaluations: self.evaluations,
            decisions,
            eval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartitionConfig;
    use crate::testutil::*;
    use passcut_ir::build_dag;

    #[test]
    fn evaluate_counts_nonempty_passes() {
        let dag = build_dag(&mad_chain(3)).unwrap();
        let oracle = ResourceOracle::new("t", instr_tex_limits(2, 0), &PartitionConfig::default());
        let mut ctx = SearchContext::new(&dag, &oracle, 100);

        let eval = ctx.evaluate_partition().unwrap();
        assert!(!eval.valid);
        assert_eq!(eval.cost.passes, 1);
        assert_eq!(eval.cost.instructions, 3);

        ctx.flags.mark(NodeIndex(2));
        let eval = ctx.evaluate_partition().unwrap();
        assert!(eval.valid);
        assert_eq!(eval.cost.passes, 2);
        assert_eq!(eval.weighted, 2 * 1000 + 3);

        // marking the output empties the root pass
        ctx.flags.mark(NodeIndex(4));
        let eval = ctx.evaluate_partition().unwrap();
        assert_eq!(eval.cost.passes, 2);
    }

    #[test]
    fn budget_fails_closed() {
        let dag = build_dag(&mad_chain(3)).unwrap();
        let oracle = ResourceOracle::new("t", instr_tex_limits(2, 0), &PartitionConfig::default());
        let mut ctx = SearchContext::new(&dag, &oracle, 2);
        assert!(ctx.valid(dag.root()).is_ok());
        assert!(ctx.valid(dag.root()).is_ok());
        let err = ctx.valid(dag.root()).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::Infeasible {
                reason: InfeasibleReason::BudgetExhausted { evaluations: 2 },
                ..
            }
        ));
    }
}
