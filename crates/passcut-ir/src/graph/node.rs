//! DAG node types.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::stmt::Opcode;
use crate::types::{Destination, OperandKey, VarId};

/// Stable arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Position in the node arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// What a node computes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodeKind {
    /// Synthetic node whose children are the live outputs.
    Root,
    /// Storage read before any in-block write.
    Leaf { var: VarId },
    /// One statement.
    Op {
        op: Opcode,
        dest: Destination,
        /// Operand keys, parallel to the first `sources.len()` children.
        sources: SmallVec<[OperandKey; 3]>,
        /// Whether the last child is the prior definition of a partially
        /// written destination.
        merges_prior: bool,
        /// Position of the statement in its block.
        stmt: usize,
    },
}

/// A node in the dependency DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagNode {
    /// What the node computes.
    pub kind: NodeKind,
    /// Ordered operand children (producers), at most four.
    pub children: SmallVec<[NodeIndex; 4]>,
    /// Distinct consumers of this node's value.
    pub predecessors: Vec<NodeIndex>,
    /// Human-readable label.
    pub label: String,
    /// Destination keys currently bound to this node.
    pub bound_to: SmallVec<[VarId; 1]>,
}

impl DagNode {
    pub(crate) fn new(kind: NodeKind, label: String) -> Self {
        Self {
            kind,
            children: SmallVec::new(),
            predecessors: Vec::new(),
            label,
            bound_to: SmallVec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    pub fn is_op(&self) -> bool {
        matches!(self.kind, NodeKind::Op { .. })
    }

    /// Opcode of an operation node.
    pub fn opcode(&self) -> Option<Opcode> {
        match self.kind {
            NodeKind::Op { op, .. } => Some(op),
            _ => None,
        }
    }

    /// Destination of an operation node.
    pub fn dest(&self) -> Option<Destination> {
        match self.kind {
            NodeKind::Op { dest, .. } => Some(dest),
            _ => None,
        }
    }

    /// Storage read by a leaf node.
    pub fn leaf_var(&self) -> Option<VarId> {
        match self.kind {
            NodeKind::Leaf { var } => Some(var),
            _ => None,
        }
    }

    /// The prior definition merged through a partial write.
    pub fn prior(&self) -> Option<NodeIndex> {
        match self.kind {
            NodeKind::Op {
                merges_prior: true,
                ..
            } => self.children.last().copied(),
            _ => None,
        }
    }
}
