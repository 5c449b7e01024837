//! The value-numbered dependency DAG of a straight-line block.
//!
//! Nodes live in an arena and are addressed by [`NodeIndex`]. Edges point
//! from a consumer to its producers (`children`), with back-edges recorded
//! in `predecessors`. A synthetic root node lists the live outputs.

pub mod node;

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use self::node::{DagNode, NodeIndex, NodeKind};
use crate::stmt::Opcode;
use crate::types::{Destination, OperandKey, VarId, Variable};

/// Malformed statement lists and graphs.
#[derive(Debug, Error)]
pub enum DagError {
    #[error("duplicate variable declaration: '{name}'")]
    DuplicateVariable { name: String },

    #[error("invalid declaration of '{name}': {detail}")]
    InvalidVariable { name: String, detail: String },

    #[error("statement {stmt} references undeclared variable {var}")]
    UnknownVariable { stmt: usize, var: VarId },

    #[error("statement {stmt}: {op} takes {expected} operand(s), found {found}")]
    ArityMismatch {
        stmt: usize,
        op: Opcode,
        expected: usize,
        found: usize,
    },

    #[error("invalid swizzle: '{text}'")]
    InvalidSwizzle { text: String },

    #[error("statement {stmt}: swizzle '{swizzle}' selects a component '{name}' does not have")]
    SwizzleOutOfRange {
        stmt: usize,
        name: String,
        swizzle: String,
    },

    #[error("statement {stmt}: '{mask}' is not a valid write mask for '{name}'")]
    InvalidWriteMask {
        stmt: usize,
        name: String,
        mask: String,
    },

    #[error("statement {stmt} writes read-only {kind} '{name}'")]
    ReadOnlyDestination {
        stmt: usize,
        name: String,
        kind: String,
    },

    #[error("statement {stmt} reads '{name}' before any write to it")]
    UndefinedRead { stmt: usize, name: String },

    #[error("statement {stmt}: texture lookup must sample a texture, found '{name}'")]
    TextureOperand { stmt: usize, name: String },

    #[error("node {node} references missing child {child}")]
    DanglingChild { node: NodeIndex, child: NodeIndex },

    #[error("node {node} has {count} children (at most 4 allowed)")]
    TooManyChildren { node: NodeIndex, count: usize },

    #[error("node {node} has inconsistent operand or predecessor lists")]
    InconsistentNode { node: NodeIndex },

    #[error("cycle detected involving node {0}")]
    CycleDetected(NodeIndex),

    #[error("root node missing or misplaced")]
    InvalidRoot,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A dependency DAG plus the declarations its nodes refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dag {
    variables: Vec<Variable>,
    nodes: Vec<DagNode>,
    root: NodeIndex,
}

impl Dag {
    /// Create a DAG holding only the root node.
    pub fn new(variables: Vec<Variable>) -> Self {
        Self {
            variables,
            nodes: vec![DagNode::new(NodeKind::Root, "root".into())],
            root: NodeIndex(0),
        }
    }

    /// The synthetic root.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node(&self, v: NodeIndex) -> &DagNode {
        &self.nodes[v.index()]
    }

    pub fn get(&self, v: NodeIndex) -> Option<&DagNode> {
        self.nodes.get(v.index())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Declarations, indexed by [`VarId`].
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.index()]
    }

    /// All node indices in arena order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len()).map(|i| NodeIndex(i as u32))
    }

    /// Operation nodes in statement order.
    pub fn op_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.indices().filter(|&v| self.node(v).is_op())
    }

    /// Distinct children of `v`, first occurrence order.
    pub fn successors(&self, v: NodeIndex) -> SmallVec<[NodeIndex; 4]> {
        let mut out: SmallVec<[NodeIndex; 4]> = SmallVec::new();
        for &c in &self.node(v).children {
            if !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }

    /// Whether `v` feeds the root directly (is a live output).
    pub fn is_live_output(&self, v: NodeIndex) -> bool {
        self.node(self.root).children.contains(&v)
    }

    /// Instruction count of an operation node, including the copy a
    /// partial write needs to carry its prior value.
    pub fn instruction_cost(&self, v: NodeIndex) -> u32 {
        match &self.node(v).kind {
            NodeKind::Op {
                op, merges_prior, ..
            } => op.instruction_cost() + u32::from(*merges_prior),
            _ => 0,
        }
    }

    /// Add a leaf reading `var`.
    pub fn add_leaf(&mut self, var: VarId) -> NodeIndex {
        let label = self
            .variables
            .get(var.index())
            .map(|v| v.name.clone())
            .unwrap_or_else(|| var.to_string());
        self.push(DagNode::new(NodeKind::Leaf { var }, label))
    }

    /// Add an operation node whose children already exist.
    pub fn add_op(
        &mut self,
        op: Opcode,
        dest: Destination,
        sources: &[(OperandKey, NodeIndex)],
        prior: Option<NodeIndex>,
        stmt: usize,
    ) -> NodeIndex {
        let dest_name = self
            .variables
            .get(dest.var.index())
            .map(|v| v.name.clone())
            .unwrap_or_else(|| dest.var.to_string());
        let kind = NodeKind::Op {
            op,
            dest,
            sources: sources.iter().map(|(k, _)| *k).collect(),
            merges_prior: prior.is_some(),
            stmt,
        };
        let id = self.push(DagNode::new(kind, format!("{dest_name} = {op}")));
        let children: SmallVec<[NodeIndex; 4]> = sources
            .iter()
            .map(|(_, c)| *c)
            .chain(prior)
            .collect();
        for &c in &children {
            let preds = &mut self.nodes[c.index()].predecessors;
            if !preds.contains(&id) {
                preds.push(id);
            }
        }
        self.nodes[id.index()].children = children;
        id
    }

    /// Attach `v` to the root as a live output.
    pub fn attach_output(&mut self, v: NodeIndex) {
        let root = self.root;
        if !self.nodes[root.index()].children.contains(&v) {
            self.nodes[root.index()].children.push(v);
            self.nodes[v.index()].predecessors.push(root);
        }
    }

    pub(crate) fn bind(&mut self, v: NodeIndex, var: VarId) {
        let bound = &mut self.nodes[v.index()].bound_to;
        if !bound.contains(&var) {
            bound.push(var);
        }
    }

    pub(crate) fn unbind(&mut self, v: NodeIndex, var: VarId) {
        self.nodes[v.index()].bound_to.retain(|b| *b != var);
    }

    fn push(&mut self, node: DagNode) -> NodeIndex {
        let id = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Every node reachable from `start`, children before parents.
    pub fn postorder_from(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack: Vec<(NodeIndex, usize)> = vec![(start, 0)];
        seen[start.index()] = true;
        while let Some(&mut (v, ref mut next)) = stack.last_mut() {
            let succ = self.successors(v);
            if let Some(&c) = succ.get(*next) {
                *next += 1;
                if !seen[c.index()] {
                    seen[c.index()] = true;
                    stack.push((c, 0));
                }
            } else {
                order.push(v);
                stack.pop();
            }
        }
        order
    }

    /// Parse and validate a serialized DAG.
    pub fn from_json(json: &str) -> Result<Self, DagError> {
        let dag: Dag = serde_json::from_str(json)?;
        dag.validate()?;
        Ok(dag)
    }

    /// Check structural well-formedness: root placement, child references,
    /// operand bookkeeping, predecessor symmetry and acyclicity.
    pub fn validate(&self) -> Result<(), DagError> {
        if self.get(self.root).map(|n| n.is_root()) != Some(true) {
            return Err(DagError::InvalidRoot);
        }
        let n = self.nodes.len();
        for v in self.indices() {
            let node = self.node(v);
            if node.is_root() && v != self.root {
                return Err(DagError::InvalidRoot);
            }
            if node.children.len() > 4 {
                return Err(DagError::TooManyChildren {
                    node: v,
                    count: node.children.len(),
                });
            }
            for &c in &node.children {
                if c.index() >= n {
                    return Err(DagError::DanglingChild { node: v, child: c });
                }
            }
            let consistent = match &node.kind {
                NodeKind::Root => true,
                NodeKind::Leaf { var } => node.children.is_empty() && var.index() < self.variables.len(),
                NodeKind::Op {
                    sources,
                    merges_prior,
                    dest,
                    ..
                } => {
                    node.children.len() == sources.len() + usize::from(*merges_prior)
                        && dest.var.index() < self.variables.len()
                        && sources.iter().all(|k| k.var.index() < self.variables.len())
                }
            };
            if !consistent {
                return Err(DagError::InconsistentNode { node: v });
            }
        }

        // Predecessor lists must mirror the distinct child edges.
        for v in self.indices() {
            for c in self.successors(v) {
                if !self.node(c).predecessors.contains(&v) {
                    return Err(DagError::InconsistentNode { node: c });
                }
            }
            for &p in &self.node(v).predecessors {
                if p.index() >= n || !self.node(p).children.contains(&v) {
                    return Err(DagError::InconsistentNode { node: v });
                }
            }
        }

        self.check_acyclic()
    }

    fn check_acyclic(&self) -> Result<(), DagError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut color = vec![Color::White; self.nodes.len()];
        for start in self.indices() {
            if color[start.index()] != Color::White {
                continue;
            }
            color[start.index()] = Color::Gray;
            let mut stack: Vec<(NodeIndex, usize)> = vec![(start, 0)];
            while let Some(&mut (v, ref mut next)) = stack.last_mut() {
                let children = &self.node(v).children;
                if let Some(&c) = children.get(*next) {
                    *next += 1;
                    match color[c.index()] {
                        Color::Gray => return Err(DagError::CycleDetected(c)),
                        Color::White => {
                            color[c.index()] = Color::Gray;
                            stack.push((c, 0));
                        }
                        Color::Black => {}
                    }
                } else {
                    color[v.index()] = Color::Black;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Dag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for v in self.indices() {
            let node = self.node(v);
            write!(f, "{v} {}", node.label)?;
            if !node.children.is_empty() {
                write!(f, " <-")?;
                for c in &node.children {
                    write!(f, " {c}")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VarKind;

    fn vars() -> Vec<Variable> {
        vec![
            Variable::new("a", VarKind::Input, 4),
            Variable::new("t", VarKind::Temp, 4),
            Variable::new("out", VarKind::Output, 4),
        ]
    }

    fn chain() -> Dag {
        let mut dag = Dag::new(vars());
        let a = dag.add_leaf(VarId(0));
        let t = dag.add_op(
            Opcode::Add,
            Destination::new(VarId(1)),
            &[(OperandKey::new(VarId(0)), a), (OperandKey::new(VarId(0)), a)],
            None,
            0,
        );
        let out = dag.add_op(
            Opcode::Mul,
            Destination::new(VarId(2)),
            &[(OperandKey::new(VarId(1)), t), (OperandKey::new(VarId(0)), a)],
            None,
            1,
        );
        dag.attach_output(out);
        dag
    }

    #[test]
    fn predecessors_are_distinct() {
        let dag = chain();
        let a = NodeIndex(1);
        assert_eq!(dag.node(a).predecessors, vec![NodeIndex(2), NodeIndex(3)]);
        assert_eq!(dag.successors(NodeIndex(2)).as_slice(), &[a]);
        assert!(dag.validate().is_ok());
    }

    #[test]
    fn postorder_visits_children_first() {
        let dag = chain();
        let order = dag.postorder_from(dag.root());
        assert_eq!(
            order,
            vec![NodeIndex(1), NodeIndex(2), NodeIndex(3), NodeIndex(0)]
        );
    }

    #[test]
    fn json_cycle_is_rejected() {
        let dag = chain();
        let mut value = serde_json::to_value(&dag).unwrap();
        // Make the leaf-consuming add node read the final multiply instead.
        value["nodes"][2]["children"] = serde_json::json!([3, 3]);
        value["nodes"][3]["predecessors"] = serde_json::json!([0, 2]);
        value["nodes"][1]["predecessors"] = serde_json::json!([3]);
        let json = serde_json::to_string(&value).unwrap();
        match Dag::from_json(&json) {
            Err(DagError::CycleDetected(_)) => {}
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn json_dangling_child_is_rejected() {
        let dag = chain();
        let mut value = serde_json::to_value(&dag).unwrap();
        value["nodes"][3]["children"] = serde_json::json!([2, 42]);
        let json = serde_json::to_string(&value).unwrap();
        assert!(matches!(
            Dag::from_json(&json),
            Err(DagError::DanglingChild { .. })
        ));
    }

    #[test]
    fn partial_write_costs_a_copy() {
        let mut dag = Dag::new(vars());
        let a = dag.add_leaf(VarId(0));
        let first = dag.add_op(
            Opcode::Asn,
            Destination::new(VarId(2)),
            &[(OperandKey::new(VarId(0)), a)],
            None,
            0,
        );
        let second = dag.add_op(
            Opcode::Abs,
            Destination::new(VarId(2)).masked("x".parse().unwrap()),
            &[(OperandKey::new(VarId(0)), a)],
            Some(first),
            1,
        );
        assert_eq!(dag.instruction_cost(first), 1);
        assert_eq!(dag.instruction_cost(second), 2);
        assert_eq!(dag.node(second).prior(), Some(first));
    }
}
