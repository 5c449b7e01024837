//! Statement IR and dependency DAG for passcut.
//!
//! A shader's straight-line computation is a [`Block`]: declared variables
//! plus ordered statements. [`build_dag`] value-numbers the block into a
//! [`Dag`] whose synthetic root lists the live outputs; that DAG is what the
//! partitioner cuts into passes. [`interp::evaluate`] runs blocks on the CPU
//! so a partition can be checked against the program it came from.

pub mod builder;
pub mod graph;
pub mod hash;
pub mod interp;
pub mod stmt;
pub mod types;

pub use builder::{build_dag, DagBuilder};
pub use graph::node::{DagNode, NodeIndex, NodeKind};
pub use graph::{Dag, DagError};
pub use hash::{content_hash, hash_hex, ContentHash};
pub use interp::{evaluate, Env, EvalError, Vec4};
pub use stmt::{Block, Opcode, Statement};
pub use types::{Destination, OperandKey, Swizzle, ValueType, VarId, VarKind, Variable};
