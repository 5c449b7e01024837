//! Transient per-node search state.
//!
//! The DAG is read-only during a search; everything a search flips per node
//! lives here in side arrays indexed by [`NodeIndex`]. Visited and marked
//! flags are epoch-stamped so clearing all of them is a counter bump.

use passcut_ir::NodeIndex;
use serde::{Deserialize, Serialize};

/// Traversal state of a node within the current walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unvisited,
    Visited,
}

/// Save-vs-recompute decision for a shared node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    /// Left to the recompute heuristic.
    #[default]
    Unset,
    /// Always a pass boundary: the value is computed once and saved.
    ForceSave,
    /// Never a pass boundary: every consuming pass recomputes the value.
    ForceRecompute,
}

/// Side arrays of per-node flags for one search.
#[derive(Debug, Clone)]
pub struct NodeFlags {
    visit_stamp: Vec<u32>,
    visit_epoch: u32,
    mark_stamp: Vec<u32>,
    mark_epoch: u32,
    fixed: Vec<Decision>,
    trial: Option<(NodeIndex, Decision)>,
}

impl NodeFlags {
    pub fn new(node_count: usize) -> Self {
        Self {
            visit_stamp: vec![0; node_count],
            visit_epoch: 1,
            mark_stamp: vec![0; node_count],
            mark_epoch: 1,
            fixed: vec![Decision::Unset; node_count],
            trial: None,
        }
    }

    /// Flags with exactly `marked` marked.
    pub fn with_marks(node_count: usize, marked: &[NodeIndex]) -> Self {
        let mut flags = Self::new(node_count);
        for &v in marked {
            flags.mark(v);
        }
        flags
    }

    pub fn state(&self, v: NodeIndex) -> NodeState {
        if self.visit_stamp[v.index()] == self.visit_epoch {
            NodeState::Visited
        } else {
            NodeState::Unvisited
        }
    }

    pub fn visit(&mut self, v: NodeIndex) {
        self.visit_stamp[v.index()] = self.visit_epoch;
    }

    pub fn unvisit_all(&mut self) {
        bump(&mut self.visit_epoch, &mut self.visit_stamp);
    }

    /// Whether `v` is a pass boundary.
    pub fn is_marked(&self, v: NodeIndex) -> bool {
        self.mark_stamp[v.index()] == self.mark_epoch
    }

    pub fn mark(&mut self, v: NodeIndex) {
        self.mark_stamp[v.index()] = self.mark_epoch;
    }

    pub fn unmark(&mut self, v: NodeIndex) {
        self.mark_stamp[v.index()] = 0;
    }

    pub fn unmark_all(&mut self) {
        bump(&mut self.mark_epoch, &mut self.mark_stamp);
    }

    /// Marked nodes in index order.
    pub fn marked(&self) -> Vec<NodeIndex> {
        (0..self.mark_stamp.len())
            .map(|i| NodeIndex(i as u32))
            .filter(|&v| self.is_marked(v))
            .collect()
    }

    /// Effective decision: a trial override wins over the fixed value.
    pub fn decision(&self, v: NodeIndex) -> Decision {
        match self.trial {
            Some((t, d)) if t == v => d,
            _ => self.fixed[v.index()],
        }
    }

    /// The committed decision, ignoring any trial.
    pub fn fixed(&self, v: NodeIndex) -> Decision {
        self.fixed[v.index()]
    }

    /// Commit a decision. A node is fixed at most once per run.
    pub fn fix(&mut self, v: NodeIndex, decision: Decision) {
        debug_assert_eq!(self.fixed[v.index()], Decision::Unset, "{v} fixed twice");
        if self.fixed[v.index()] == Decision::Unset {
            self.fixed[v.index()] = decision;
        }
    }

    /// Override the decision of one node until [`end_trial`](Self::end_trial).
    pub fn begin_trial(&mut self, v: NodeIndex, decision: Decision) {
        self.trial = Some((v, decision));
    }

    pub fn end_trial(&mut self) {
        self.trial = None;
    }
}

fn bump(epoch: &mut u32, stamps: &mut [u32]) {
    *epoch = epoch.wrapping_add(1);
    if *epoch == 0 {
        stamps.iter_mut().for_each(|s| *s = 0);
        *epoch = 1;
    }
}
