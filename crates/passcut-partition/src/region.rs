//! Pass regions and their resource summaries.
//!
//! The region of a node `r` is everything reachable from `r` without
//! crossing a marked child: those children are pass boundaries whose values
//! arrive over channels. Regions are recomputed from the current marks on
//! every query, so a summary is only meaningful right after it is taken.

use std::collections::{HashMap, HashSet, VecDeque};

use passcut_ir::{Dag, NodeIndex, Opcode, ValueType, VarKind};

use crate::state::{NodeFlags, NodeState};
use crate::usage::ResourceUsage;

/// The nodes one pass evaluates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// The pass root (the DAG root for the final pass).
    pub root: NodeIndex,
    /// Operation nodes evaluated by the pass, producers before consumers.
    pub ops: Vec<NodeIndex>,
    /// Marked children reached from the region, in discovery order.
    pub cuts: Vec<NodeIndex>,
    /// Leaves read by the region.
    pub leaves: Vec<NodeIndex>,
}

impl Region {
    /// A region holding only `v`, every operand child cut.
    pub fn single(dag: &Dag, v: NodeIndex) -> Self {
        let mut cuts = Vec::new();
        let mut leaves = Vec::new();
        for c in dag.successors(v) {
            if dag.node(c).is_leaf() {
                leaves.push(c);
            } else {
                cuts.push(c);
            }
        }
        Self {
            root: v,
            ops: if dag.node(v).is_op() { vec![v] } else { Vec::new() },
            cuts,
            leaves,
        }
    }

    /// Whether the pass has any statement to run.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Cut nodes whose value an operation in this region reads.
    pub fn channel_inputs<'a>(&'a self, dag: &'a Dag) -> impl Iterator<Item = NodeIndex> + 'a {
        let ops: HashSet<NodeIndex> = self.ops.iter().copied().collect();
        self.cuts
            .iter()
            .copied()
            .filter(move |&c| dag.node(c).predecessors.iter().any(|p| ops.contains(p)))
    }
}

/// Collect the region rooted at `r` under the current marks.
pub fn collect_region(dag: &Dag, r: NodeIndex, flags: &mut NodeFlags) -> Region {
    flags.unvisit_all();
    flags.visit(r);
    let mut ops = Vec::new();
    let mut cuts = Vec::new();
    let mut leaves = Vec::new();
    let mut stack: Vec<(NodeIndex, usize)> = vec![(r, 0)];
    while let Some(&mut (v, ref mut next)) = stack.last_mut() {
        let succ = dag.successors(v);
        let Some(&c) = succ.get(*next) else {
            if dag.node(v).is_op() {
                ops.push(v);
            }
            stack.pop();
            continue;
        };
        *next += 1;
        if dag.node(c).is_leaf() {
            if flags.state(c) == NodeState::Unvisited {
                flags.visit(c);
                leaves.push(c);
            }
        } else if flags.is_marked(c) {
            if !cuts.contains(&c) {
                cuts.push(c);
            }
        } else if flags.state(c) == NodeState::Unvisited {
            flags.visit(c);
            stack.push((c, 0));
        }
    }
    Region {
        root: r,
        ops,
        cuts,
        leaves,
    }
}

/// Summarize what a region consumes.
pub fn region_usage(dag: &Dag, region: &Region) -> ResourceUsage {
    let mut usage = ResourceUsage::default();
    let position: HashMap<NodeIndex, usize> = region
        .ops
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, i))
        .collect();

    for &v in &region.ops {
        usage.instructions += dag.instruction_cost(v);
        if dag.node(v).opcode() == Some(Opcode::Tex) {
            usage.textures += 1;
        }
    }

    for &leaf in &region.leaves {
        let Some(var) = dag.node(leaf).leaf_var() else {
            continue;
        };
        match dag.variable(var).kind {
            VarKind::Input => usage.attributes += 1,
            VarKind::Param => usage.parameters += 1,
            VarKind::Const => usage.constants += 1,
            VarKind::Stream => usage.channels += 1,
            VarKind::Texture | VarKind::Temp | VarKind::Output => {}
        }
    }
    usage.channels += region.channel_inputs(dag).count() as u32;

    let root = dag.root();
    usage.outputs = if region.root == root {
        dag.node(root)
            .children
            .iter()
            .filter(|c| position.contains_key(c))
            .count() as u32
    } else {
        let consumed = dag
            .node(region.root)
            .predecessors
            .iter()
            .any(|&p| dag.node(p).is_op());
        u32::from(dag.is_live_output(region.root)) + u32::from(consumed)
    };

    // A value holds a register from its definition until its last in-region
    // reader, which may reuse that register for its own result.
    let n = region.ops.len();
    let mut full = vec![0i64; n + 1];
    let mut half = vec![0i64; n + 1];
    for (i, &v) in region.ops.iter().enumerate() {
        let end = dag
            .node(v)
            .predecessors
            .iter()
            .filter_map(|p| position.get(p).copied())
            .max()
            .map_or(i + 1, |last| last.max(i + 1));
        let is_half = dag
            .node(v)
            .dest()
            .map(|d| dag.variable(d.var).value_type == ValueType::Half)
            .unwrap_or(false);
        let sweep = if is_half { &mut half } else { &mut full };
        sweep[i] += 1;
        sweep[end] -= 1;
    }
    usage.temporaries = peak(&full);
    usage.half_temporaries = peak(&half);
    usage
}

fn peak(deltas: &[i64]) -> u32 {
    let mut live = 0i64;
    let mut max = 0i64;
    for d in deltas {
        live += d;
        max = max.max(live);
    }
    max as u32
}

/// Resources of one statement alone in a pass.
pub fn stmt_usage(dag: &Dag, v: NodeIndex) -> ResourceUsage {
    region_usage(dag, &Region::single(dag, v))
}

/// Every pass under the current marks, starting with the DAG root's.
pub fn collect_passes(dag: &Dag, flags: &mut NodeFlags) -> Vec<Region> {
    let root = dag.root();
    let mut queued = vec![false; dag.node_count()];
    let mut queue = VecDeque::from([root]);
    queued[root.index()] = true;
    let mut passes = Vec::new();
    while let Some(r) = queue.pop_front() {
        let region = collect_region(dag, r, flags);
        for &c in &region.cuts {
            if !queued[c.index()] {
                queued[c.index()] = true;
                queue.push_back(c);
            }
        }
        passes.push(region);
    }
    passes
}
