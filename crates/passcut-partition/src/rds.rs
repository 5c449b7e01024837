//! Recursive dominator subdivision (RDS).
//!
//! The greedy partitioner. Shared operation nodes are visited in post-order;
//! for each one the whole DAG is subdivided twice, once with the node forced
//! to be a pass boundary (save) and once with it forced to be recomputed in
//! every consumer, and the cheaper choice is fixed. A final subdivision with
//! every decision fixed yields the marking. The heuristic variant skips the
//! trials and leaves each shared node to the oracle's recompute rule.
//!
//! Subdivision walks the partial dominator tree: a region that fits is left
//! alone, otherwise its shared descendants are subdivided first and the
//! region is then re-merged greedily, folding in as many operand subtrees as
//! the target allows.

use passcut_ir::{Dag, NodeIndex};
use smallvec::SmallVec;

use crate::config::PartitionConfig;
use crate::error::{InfeasibleReason, PartitionError};
use crate::ksubset::NextKSubset;
use crate::oracle::{describe_violations, MergeCandidate, ResourceOracle};
use crate::pdt::Pdt;
use crate::region::{region_usage, stmt_usage};
use crate::search::{DecisionRecord, PartitionEval, SearchContext, SearchOutcome};
use crate::state::Decision;
use crate::usage::ResourceUsage;

struct Rds<'a> {
    ctx: SearchContext<'a>,
    pdt: &'a Pdt,
    max_fanout: usize,
}

/// Run the greedy search and return the final marking.
pub fn rds_search(
    dag: &Dag,
    pdt: &Pdt,
    oracle: &ResourceOracle,
    config: &PartitionConfig,
) -> Result<SearchOutcome, PartitionError> {
    let mut rds = Rds {
        ctx: SearchContext::new(dag, oracle, config.max_evaluations),
        pdt,
        max_fanout: config.max_merge_fanout,
    };
    let root = dag.root();

    let shared: Vec<NodeIndex> = dag
        .postorder_from(root)
        .into_iter()
        .filter(|&v| pdt.is_shared(dag, v))
        .collect();

    let mut decisions = Vec::with_capacity(shared.len());
    for v in shared {
        let save = rds.trial(v, Decision::ForceSave)?;
        let recompute = rds.trial(v, Decision::ForceRecompute)?;
        let decision = if !recompute.valid || (save.valid && save.key() < recompute.key()) {
            Decision::ForceSave
        } else {
            Decision::ForceRecompute
        };
        rds.ctx.flags.fix(v, decision);
        tracing::debug!(
            node = %v,
            label = %dag.node(v).label,
            ?decision,
            save_passes = save.cost.passes,
            recompute_passes = recompute.cost.passes,
            "fixed shared node"
        );
        decisions.push(DecisionRecord {
            node: v,
            label: dag.node(v).label.clone(),
            decision,
            save,
            recompute,
        });
    }

    rds.ctx.reset();
    rds.subdivide(root)?;
    rds.settle()?;
    rds.ctx.outcome(decisions)
}

/// Subdivide once with no save/recompute trials: every shared node is
/// decided by [`ResourceOracle::recompute`] and stays a merge candidate.
pub fn rds_heuristic(
    dag: &Dag,
    pdt: &Pdt,
    oracle: &ResourceOracle,
    config: &PartitionConfig,
) -> Result<SearchOutcome, PartitionError> {
    let mut rds = Rds {
        ctx: SearchContext::new(dag, oracle, config.max_evaluations),
        pdt,
        max_fanout: config.max_merge_fanout,
    };
    rds.ctx.reset();
    rds.subdivide(dag.root())?;
    rds.settle()?;
    tracing::debug!(
        marked = rds.ctx.flags.marked().len(),
        evaluations = rds.ctx.evaluations(),
        "heuristic subdivision done"
    );
    rds.ctx.outcome(Vec::new())
}

impl Rds<'_> {
    /// Subdivide from scratch with `v` overridden to `decision`.
    fn trial(&mut self, v: NodeIndex, decision: Decision) -> Result<PartitionEval, PartitionError> {
        self.ctx.reset();
        self.ctx.flags.begin_trial(v, decision);
        let result = self
            .subdivide(self.ctx.dag.root())
            .and_then(|()| self.ctx.evaluate_partition());
        self.ctx.flags.end_trial();
        result
    }

    fn subdivide(&mut self, v: NodeIndex) -> Result<(), PartitionError> {
        if self.ctx.valid(v)? {
            return Ok(());
        }
        tracing::trace!(node = %v, "subdivide");
        let dag = self.ctx.dag;
        let pdt = self.pdt;
        for &k in pdt.children(v) {
            self.subdivide(k)?;
            if !pdt.is_shared(dag, k) {
                continue;
            }
            let save = match self.ctx.flags.decision(k) {
                Decision::ForceSave => true,
                Decision::ForceRecompute => false,
                Decision::Unset => !self.ctx.recompute(k)?,
            };
            if save {
                self.ctx.flags.mark(k);
            } else {
                self.ctx.flags.unmark(k);
            }
        }
        self.merge(v)
    }

    /// Make `v`'s region valid by folding in as many operand subtrees as fit
    /// and cutting the rest.
    fn merge(&mut self, v: NodeIndex) -> Result<(), PartitionError> {
        let dag = self.ctx.dag;
        tracing::trace!(node = %v, "merge");
        let own = if v == dag.root() {
            ResourceUsage::default()
        } else {
            ResourceUsage {
                channels: 0,
                outputs: 0,
                ..stmt_usage(dag, v)
            }
        };

        let mut kids: SmallVec<[NodeIndex; 8]> = SmallVec::new();
        for c in dag.successors(v) {
            if !dag.node(c).is_op() {
                continue;
            }
            match self.ctx.flags.decision(c) {
                Decision::ForceRecompute => {
                    self.ctx.flags.unmark(c);
                    let saved = self.ctx.committed;
                    self.ctx.committed = saved + own;
                    let result = self.ensure_valid(c);
                    self.ctx.committed = saved;
                    result?;
                }
                Decision::ForceSave => {
                    self.ensure_valid(c)?;
                    self.ctx.flags.mark(c);
                }
                Decision::Unset => {
                    self.ensure_valid(c)?;
                    kids.push(c);
                }
            }
        }

        if kids.is_empty() {
            return Ok(());
        }
        if kids.len() > self.max_fanout {
            return self.merge_greedy(v, &kids);
        }

        let n = kids.len();
        let mut subsets = NextKSubset::new(n, n);
        for d in (1..=n).rev() {
            subsets.init(n, d);
            let mut candidates = Vec::new();
            while let Some(subset) = subsets.next() {
                let subset = subset.to_vec();
                self.fold(&kids, &subset);
                let usage = self.ctx.usage(v)?;
                if self.ctx.oracle.valid(&usage, &self.ctx.committed) {
                    candidates.push(MergeCandidate {
                        subset,
                        instructions: usage.instructions,
                    });
                }
            }
            if let Some(best) = self.ctx.oracle.merge(&candidates) {
                self.fold(&kids, &candidates[best].subset);
                tracing::trace!(node = %v, folded = d, of = n, "merged");
                return Ok(());
            }
        }
        for &k in &kids {
            self.ctx.flags.mark(k);
        }
        Ok(())
    }

    fn ensure_valid(&mut self, c: NodeIndex) -> Result<(), PartitionError> {
        if !self.ctx.valid(c)? {
            self.merge(c)?;
        }
        Ok(())
    }

    /// Unmark the kids at `subset`, mark the others.
    fn fold(&mut self, kids: &[NodeIndex], subset: &[usize]) {
        for (i, &k) in kids.iter().enumerate() {
            if subset.contains(&i) {
                self.ctx.flags.unmark(k);
            } else {
                self.ctx.flags.mark(k);
            }
        }
    }

    /// Fallback for wide nodes: fold kids one at a time while the region fits.
    fn merge_greedy(&mut self, v: NodeIndex, kids: &[NodeIndex]) -> Result<(), PartitionError> {
        tracing::debug!(node = %v, fanout = kids.len(), "fan-out above cap, merging greedily");
        for &k in kids {
            self.ctx.flags.mark(k);
        }
        for &k in kids {
            self.ctx.flags.unmark(k);
            if !self.ctx.valid(v)? {
                self.ctx.flags.mark(k);
            }
        }
        Ok(())
    }

    /// Split passes a later merge left over the limits. Each round cuts one
    /// more node out of the first invalid pass, so marks only grow.
    fn settle(&mut self) -> Result<(), PartitionError> {
        let dag = self.ctx.dag;
        let zero = ResourceUsage::default();
        for _ in 0..=dag.node_count() {
            let passes = self.ctx.passes()?;
            let Some((region, usage)) = passes
                .into_iter()
                .find(|(_, usage)| !self.ctx.oracle.valid(usage, &zero))
            else {
                return Ok(());
            };

            // Prefer a node the decisions allow to be cut, then one whose
            // own region fits, then the largest.
            let mut best: Option<((bool, bool, u32), NodeIndex)> = None;
            for &w in region.ops.iter().filter(|&&w| w != region.root) {
                let sub = self.ctx.region(w);
                let sub_usage = region_usage(dag, &sub);
                let key = (
                    self.ctx.flags.decision(w) != Decision::ForceRecompute,
                    self.ctx.oracle.valid(&sub_usage, &zero),
                    sub_usage.instructions,
                );
                if best.map_or(true, |(b, _)| key > b) {
                    best = Some((key, w));
                }
            }
            let Some((_, w)) = best else {
                return Err(PartitionError::infeasible(
                    self.ctx.oracle.target(),
                    InfeasibleReason::PassExceedsLimits {
                        pass: dag.node(region.root).label.clone(),
                        detail: describe_violations(&self.ctx.oracle.violations(&usage, &zero)),
                    },
                ));
            };
            tracing::debug!(pass = %region.root, cut = %w, "splitting pass over limits");
            self.ctx.flags.mark(w);
        }
        Err(PartitionError::infeasible(
            self.ctx.oracle.target(),
            InfeasibleReason::PassExceedsLimits {
                pass: dag.node(dag.root()).label.clone(),
                detail: "passes did not settle".into(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use passcut_ir::build_dag;
    use passcut_targets::ResourceLimits;

    fn run(block: &passcut_ir::Block, limits: ResourceLimits) -> SearchOutcome {
        let dag = build_dag(block).unwrap();
        let pdt = Pdt::build(&dag).unwrap();
        let oracle = ResourceOracle::new("t", limits, &PartitionConfig::default());
        rds_search(&dag, &pdt, &oracle, &PartitionConfig::default()).unwrap()
    }

    fn run_heuristic(block: &passcut_ir::Block, limits: ResourceLimits) -> SearchOutcome {
        let dag = build_dag(block).unwrap();
        let pdt = Pdt::build(&dag).unwrap();
        let oracle = ResourceOracle::new("t", limits, &PartitionConfig::default());
        rds_heuristic(&dag, &pdt, &oracle, &PartitionConfig::default()).unwrap()
    }

    #[test]
    fn fitting_dag_is_one_pass() {
        let out = run(&mad_chain(5), instr_tex_limits(8, 0));
        assert!(out.marked.is_empty());
        assert_eq!(out.eval.cost.passes, 1);
        assert!(out.eval.valid);
    }

    #[test]
    fn mad_chain_splits_into_three() {
        let out = run(&mad_chain(5), instr_tex_limits(2, 0));
        // n1 leaf a, n2..n6 the five mads
        assert_eq!(out.marked, vec![NodeIndex(3), NodeIndex(5)]);
        assert_eq!(out.eval.cost.passes, 3);
        assert!(out.eval.valid);
    }

    #[test]
    fn cheap_shared_value_is_recomputed() {
        let out = run(&shared_block(10, 45), instr_tex_limits(100, 1));
        assert_eq!(out.decisions.len(), 1);
        assert_eq!(out.decisions[0].decision, Decision::ForceRecompute);
        assert_eq!(out.eval.cost.passes, 2);
    }

    #[test]
    fn expensive_shared_value_is_saved() {
        let out = run(&shared_block(60, 45), instr_tex_limits(100, 1));
        assert_eq!(out.decisions.len(), 1);
        let record = &out.decisions[0];
        assert_eq!(record.decision, Decision::ForceSave);
        assert!(record.save.cost.passes < record.recompute.cost.passes);
        assert_eq!(out.eval.cost.passes, 3);
        assert!(out.marked.contains(&record.node));
    }

    #[test]
    fn wide_node_falls_back_to_greedy_merge() {
        // out = mad(mul a,a ; mul b,b ; mul c,c): three kids, fan-out cap of one
        let mut b = passcut_ir::Block::new();
        let ins: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|n| b.var(n, passcut_ir::VarKind::Input, 4))
            .collect();
        let ts: Vec<_> = (0..3)
            .map(|i| b.var(&format!("t{i}"), passcut_ir::VarKind::Temp, 4))
            .collect();
        let out = b.var("out", passcut_ir::VarKind::Output, 4);
        for i in 0..3 {
            b.emit(ts[i], passcut_ir::Opcode::Mul, &[ins[i], ins[i]]);
        }
        b.emit(out, passcut_ir::Opcode::Mad, &ts);

        let dag = build_dag(&b).unwrap();
        let pdt = Pdt::build(&dag).unwrap();
        let oracle = ResourceOracle::new("t", instr_tex_limits(3, 0), &PartitionConfig::default());
        let config = PartitionConfig {
            max_merge_fanout: 1,
            ..Default::default()
        };
        let out = rds_search(&dag, &pdt, &oracle, &config).unwrap();
        assert!(out.eval.valid);
        // the output plus the first two products fit; the third is cut
        assert_eq!(out.marked.len(), 1);
        assert_eq!(out.eval.cost.passes, 2);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let dag = build_dag(&mad_chain(5)).unwrap();
        let pdt = Pdt::build(&dag).unwrap();
        let oracle = ResourceOracle::new("t", instr_tex_limits(2, 0), &PartitionConfig::default());
        let config = PartitionConfig {
            max_evaluations: 3,
            ..Default::default()
        };
        let err = rds_search(&dag, &pdt, &oracle, &config).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::Infeasible {
                reason: InfeasibleReason::BudgetExhausted { .. },
                ..
            }
        ));
    }

    #[test]
    fn heuristic_never_beats_trials() {
        for (shared_len, heuristic_passes) in [(10, 2), (60, 3)] {
            let block = shared_block(shared_len, 45);
            let greedy = run(&block, instr_tex_limits(100, 1));
            let heuristic = run_heuristic(&block, instr_tex_limits(100, 1));
            assert!(heuristic.eval.valid);
            assert!(heuristic.decisions.is_empty());
            assert!(heuristic.eval.cost.passes >= greedy.eval.cost.passes);
            assert_eq!(heuristic.eval.cost.passes, heuristic_passes);
            // no trials, so far fewer evaluations
            assert!(heuristic.evaluations < greedy.evaluations);
        }
    }

    #[test]
    fn heuristic_splits_chain_like_greedy() {
        let greedy = run(&mad_chain(5), instr_tex_limits(2, 0));
        let heuristic = run_heuristic(&mad_chain(5), instr_tex_limits(2, 0));
        assert_eq!(heuristic.marked, greedy.marked);
        assert_eq!(heuristic.eval.cost.passes, 3);
    }
}
