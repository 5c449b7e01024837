//! Building the dependency DAG from a block of statements.
//!
//! The builder value-numbers by key: every read of a storage location
//! resolves to the node currently bound to it, or to the single leaf for
//! storage that has not been written in the block. Each statement creates a
//! fresh node and rebinds its destination; the superseded node stays in the
//! graph for any consumers it already has.
//!
//! # Example
//!
//! ```rust
//! use passcut_ir::builder::build_dag;
//! use passcut_ir::stmt::{Block, Opcode};
//! use passcut_ir::types::VarKind;
//!
//! let mut block = Block::new();
//! let a = block.var("a", VarKind::Input, 4);
//! let t = block.var("t", VarKind::Temp, 4);
//! let out = block.var("out", VarKind::Output, 4);
//! block.emit(t, Opcode::Mul, &[a, a]);
//! block.emit(out, Opcode::Add, &[t, a]);
//!
//! let dag = build_dag(&block).unwrap();
//! // root + leaf `a` + two statements
//! assert_eq!(dag.node_count(), 4);
//! ```

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use crate::graph::node::NodeIndex;
use crate::graph::{Dag, DagError};
use crate::stmt::Block;
use crate::types::{OperandKey, VarId, VarKind, Variable};

/// Incremental DAG construction over a block's declarations.
pub struct DagBuilder {
    dag: Dag,
    /// Current value of each written location.
    current: HashMap<VarId, NodeIndex>,
    /// Leaf per unwritten location.
    leaves: HashMap<VarId, NodeIndex>,
    next_stmt: usize,
}

impl DagBuilder {
    /// Start a builder after checking the declarations.
    pub fn new(variables: &[Variable]) -> Result<Self, DagError> {
        validate_declarations(variables)?;
        Ok(Self {
            dag: Dag::new(variables.to_vec()),
            current: HashMap::new(),
            leaves: HashMap::new(),
            next_stmt: 0,
        })
    }

    fn declaration(&self, stmt: usize, var: VarId) -> Result<&Variable, DagError> {
        self.dag
            .variables()
            .get(var.index())
            .ok_or(DagError::UnknownVariable { stmt, var })
    }

    /// Resolve a source key to its node.
    fn resolve(&mut self, stmt: usize, key: &OperandKey) -> Result<NodeIndex, DagError> {
        let decl = self.declaration(stmt, key.var)?;
        if !key.swizzle.fits(decl.size) {
            return Err(DagError::SwizzleOutOfRange {
                stmt,
                name: decl.name.clone(),
                swizzle: key.swizzle.to_string(),
            });
        }
        if let Some(&node) = self.current.get(&key.var) {
            return Ok(node);
        }
        if decl.kind.is_block_defined() {
            return Err(DagError::UndefinedRead {
                stmt,
                name: decl.name.clone(),
            });
        }
        if let Some(&leaf) = self.leaves.get(&key.var) {
            return Ok(leaf);
        }
        let leaf = self.dag.add_leaf(key.var);
        self.leaves.insert(key.var, leaf);
        Ok(leaf)
    }

    /// Add one statement, returning its node.
    pub fn push(&mut self, stmt: &crate::stmt::Statement) -> Result<NodeIndex, DagError> {
        let index = self.next_stmt;
        let dest_decl = self.declaration(index, stmt.dest.var)?.clone();
        if !dest_decl.kind.is_writable() {
            return Err(DagError::ReadOnlyDestination {
                stmt: index,
                name: dest_decl.name,
                kind: dest_decl.kind.to_string(),
            });
        }
        if !stmt.dest.mask.is_write_mask() || !stmt.dest.mask.fits(dest_decl.size) {
            return Err(DagError::InvalidWriteMask {
                stmt: index,
                name: dest_decl.name,
                mask: stmt.dest.mask.to_string(),
            });
        }
        if stmt.src.len() != stmt.op.arity() {
            return Err(DagError::ArityMismatch {
                stmt: index,
                op: stmt.op,
                expected: stmt.op.arity(),
                found: stmt.src.len(),
            });
        }
        for (i, key) in stmt.src.iter().enumerate() {
            let decl = self.declaration(index, key.var)?;
            let sampler_slot = stmt.op.is_texture() && i == 0;
            if sampler_slot != (decl.kind == VarKind::Texture) {
                return Err(DagError::TextureOperand {
                    stmt: index,
                    name: decl.name.clone(),
                });
            }
        }

        let mut sources: SmallVec<[(OperandKey, NodeIndex); 3]> = SmallVec::new();
        for key in &stmt.src {
            let node = self.resolve(index, key)?;
            sources.push((*key, node));
        }
        let prior = if stmt.dest.mask.is_partial_write(dest_decl.size) {
            self.current.get(&stmt.dest.var).copied()
        } else {
            None
        };

        let node = self
            .dag
            .add_op(stmt.op, stmt.dest, &sources, prior, index);
        if let Some(old) = self.current.insert(stmt.dest.var, node) {
            self.dag.unbind(old, stmt.dest.var);
        }
        self.dag.bind(node, stmt.dest.var);
        self.next_stmt += 1;
        Ok(node)
    }

    /// Attach live outputs to the root and return the finished DAG.
    pub fn finish(mut self) -> Dag {
        let mut bound: Vec<(VarId, NodeIndex)> = self.current.iter().map(|(&v, &n)| (v, n)).collect();
        bound.sort();
        let mut live = HashSet::new();
        for (var, node) in bound {
            if self.dag.variable(var).kind == VarKind::Output {
                self.dag.attach_output(node);
                live.insert(node);
            }
        }
        let dead: Vec<NodeIndex> = self
            .dag
            .op_nodes()
            .filter(|&v| self.dag.node(v).predecessors.is_empty() && !live.contains(&v))
            .collect();
        for v in dead {
            tracing::debug!(node = %v, label = %self.dag.node(v).label, "dead statement");
        }
        self.dag
    }
}

/// Build the DAG for a whole block.
pub fn build_dag(block: &Block) -> Result<Dag, DagError> {
    let mut builder = DagBuilder::new(&block.variables)?;
    for stmt in &block.statements {
        builder.push(stmt)?;
    }
    let dag = builder.finish();
    tracing::debug!(
        statements = block.statements.len(),
        nodes = dag.node_count(),
        outputs = dag.node(dag.root()).children.len(),
        "dependency DAG built"
    );
    Ok(dag)
}

fn validate_declarations(variables: &[Variable]) -> Result<(), DagError> {
    let mut names = HashSet::new();
    for var in variables {
        if !names.insert(var.name.as_str()) {
            return Err(DagError::DuplicateVariable {
                name: var.name.clone(),
            });
        }
        if !(1..=4).contains(&var.size) {
            return Err(DagError::InvalidVariable {
                name: var.name.clone(),
                detail: format!("size {} outside 1..=4", var.size),
            });
        }
        match (&var.value, var.kind) {
            (None, VarKind::Const) => {
                return Err(DagError::InvalidVariable {
                    name: var.name.clone(),
                    detail: "constant without a value".into(),
                });
            }
            (Some(value), _) if value.len() != var.size as usize => {
                return Err(DagError::InvalidVariable {
                    name: var.name.clone(),
                    detail: format!("{} value(s) for {} component(s)", value.len(), var.size),
                });
            }
            _ => {}
        }
    }
    Ok(())
}
