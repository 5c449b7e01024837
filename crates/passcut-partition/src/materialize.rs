//! Turn a marking into runnable passes.
//!
//! Every marked node read by an operation in another pass becomes a shared
//! variable carried over one channel. Passes are emitted producers first and
//! each gets an independent [`Block`]: its statements in original order, each
//! writing a fresh temporary, reading leaves from their original storage and
//! cut values from `stream` variables. An epilogue copies results into the
//! block's outputs and the pass's outgoing channel.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use passcut_ir::{
    Block, Dag, Destination, NodeIndex, NodeKind, OperandKey, Opcode, Statement, ValueType, VarId,
    VarKind, Variable,
};
use serde::Serialize;

use crate::error::PartitionError;
use crate::region::{collect_passes, region_usage, Region};
use crate::state::NodeFlags;
use crate::usage::ResourceUsage;

/// What a pass computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassRoot {
    /// The final pass, writing the block's remaining outputs.
    Root,
    /// A pass ending in a marked node.
    Node(NodeIndex),
}

/// One pass of a partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Pass {
    /// Position in execution order.
    pub id: usize,
    pub root: PassRoot,
    /// Label of the pass root.
    pub label: String,
    /// DAG nodes the pass evaluates, in statement order.
    pub nodes: Vec<NodeIndex>,
    /// Standalone program for the pass.
    pub body: Block,
    /// Channels read.
    pub channels_in: Vec<usize>,
    /// Channel written, if a later pass reads this pass's value.
    pub channel_out: Option<usize>,
    /// Block outputs written.
    pub outputs: Vec<String>,
    pub usage: ResourceUsage,
}

/// A value carried from one pass to later ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SharedVariable {
    pub channel: usize,
    pub producer: NodeIndex,
    /// Destination variable of the producing statement.
    pub var: String,
    /// Name of the `stream` variable in the pass bodies.
    pub name: String,
    pub size: u8,
    pub value_type: ValueType,
}

/// Ordered passes plus the values crossing between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    pub passes: Vec<Pass>,
    pub shared: Vec<SharedVariable>,
}

impl Partition {
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn shared_count(&self) -> usize {
        self.shared.len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the partition described by `marked`.
pub fn materialize(dag: &Dag, marked: &[NodeIndex]) -> Result<Partition, PartitionError> {
    let mut flags = NodeFlags::with_marks(dag.node_count(), marked);
    let regions = collect_passes(dag, &mut flags);
    let order = pass_order(&regions);

    // One channel per producer read across a cut, numbered in pass order.
    let read_across: HashSet<NodeIndex> = regions
        .iter()
        .flat_map(|r| r.channel_inputs(dag).collect::<Vec<_>>())
        .collect();
    let taken: HashSet<&str> = dag.variables().iter().map(|v| v.name.as_str()).collect();
    let mut channels: IndexMap<NodeIndex, SharedVariable> = IndexMap::new();
    for &i in &order {
        let producer = regions[i].root;
        if !read_across.contains(&producer) {
            continue;
        }
        let dest = dest_variable(dag, producer)?;
        let channel = channels.len();
        let mut name = format!("{}_ch{channel}", dest.name);
        while taken.contains(name.as_str()) {
            name.push('_');
        }
        channels.insert(
            producer,
            SharedVariable {
                channel,
                producer,
                var: dest.name.clone(),
                name,
                size: dest.size,
                value_type: dest.value_type,
            },
        );
    }

    let mut passes = Vec::with_capacity(order.len());
    for &i in &order {
        let region = &regions[i];
        if region.is_empty() {
            continue;
        }
        let mut pass = build_pass(dag, region, &channels)?;
        pass.id = passes.len();
        passes.push(pass);
    }
    tracing::debug!(
        passes = passes.len(),
        shared = channels.len(),
        "materialized partition"
    );
    Ok(Partition {
        passes,
        shared: channels.into_values().collect(),
    })
}

/// Regions producers first; the root region (index 0) comes last.
fn pass_order(regions: &[Region]) -> Vec<usize> {
    let by_root: HashMap<NodeIndex, usize> =
        regions.iter().enumerate().map(|(i, r)| (r.root, i)).collect();
    let mut entered = vec![false; regions.len()];
    let mut order = Vec::with_capacity(regions.len());
    if regions.is_empty() {
        return order;
    }
    entered[0] = true;
    let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
    while let Some(&mut (r, ref mut next)) = stack.last_mut() {
        let Some(&cut) = regions[r].cuts.get(*next) else {
            order.push(r);
            stack.pop();
            continue;
        };
        *next += 1;
        if let Some(&c) = by_root.get(&cut) {
            if !entered[c] {
                entered[c] = true;
                stack.push((c, 0));
            }
        }
    }
    order
}

fn dest_variable(dag: &Dag, v: NodeIndex) -> Result<&Variable, PartitionError> {
    dag.node(v)
        .dest()
        .map(|d| dag.variable(d.var))
        .ok_or_else(|| PartitionError::Materialize {
            detail: format!("{v} is not a statement"),
        })
}

/// Per-pass mapping from DAG values to body variables.
struct BodyBuilder<'a> {
    dag: &'a Dag,
    body: Block,
    values: HashMap<NodeIndex, VarId>,
}

impl BodyBuilder<'_> {
    fn declare_unique(&mut self, mut var: Variable) -> VarId {
        while self.body.find(&var.name).is_some() {
            var.name.push('_');
        }
        self.body.declare(var)
    }

    fn value(&self, v: NodeIndex) -> Result<VarId, PartitionError> {
        self.values
            .get(&v)
            .copied()
            .ok_or_else(|| PartitionError::Materialize {
                detail: format!("no value for {} ({})", v, self.dag.node(v).label),
            })
    }

    fn copy(&mut self, dest: VarId, from: NodeIndex) -> Result<(), PartitionError> {
        let src = self.value(from)?;
        self.body.push(Statement::new(
            Destination::new(dest),
            Opcode::Asn,
            &[OperandKey::new(src)],
        ));
        Ok(())
    }
}

fn build_pass(
    dag: &Dag,
    region: &Region,
    channels: &IndexMap<NodeIndex, SharedVariable>,
) -> Result<Pass, PartitionError> {
    let root = dag.root();
    let in_region: HashSet<NodeIndex> = region.ops.iter().copied().collect();
    let mut b = BodyBuilder {
        dag,
        body: Block::new(),
        values: HashMap::new(),
    };

    for &leaf in &region.leaves {
        if let Some(var) = dag.node(leaf).leaf_var() {
            let id = b.body.declare(dag.variable(var).clone());
            b.values.insert(leaf, id);
        }
    }

    let mut channels_in = Vec::new();
    for c in region.channel_inputs(dag) {
        let Some(shared) = channels.get(&c) else {
            continue;
        };
        let id = b.body.declare(stream_variable(shared));
        b.values.insert(c, id);
        channels_in.push(shared.channel);
    }

    // Results this pass hands out: block outputs, then the outgoing channel.
    let writers: Vec<NodeIndex> = if region.root == root {
        dag.node(root)
            .children
            .iter()
            .copied()
            .filter(|c| in_region.contains(c))
            .collect()
    } else if dag.is_live_output(region.root) {
        vec![region.root]
    } else {
        Vec::new()
    };
    let mut epilogue: Vec<(VarId, NodeIndex)> = Vec::new();
    let mut outputs = Vec::new();
    for &w in &writers {
        for &var in &dag.node(w).bound_to {
            let original = dag.variable(var);
            if original.kind == VarKind::Output {
                epilogue.push((b.body.declare(original.clone()), w));
                outputs.push(original.name.clone());
            }
        }
    }
    let channel_out = if region.root == root {
        None
    } else {
        channels.get(&region.root).map(|shared| {
            epilogue.push((b.body.declare(stream_variable(shared)), region.root));
            shared.channel
        })
    };

    // Arena order is statement order.
    let mut nodes = region.ops.clone();
    nodes.sort();

    for &v in &nodes {
        let NodeKind::Op {
            op, dest, sources, ..
        } = &dag.node(v).kind
        else {
            continue;
        };
        let dest_var = dag.variable(dest.var);
        let temp = b.declare_unique(Variable {
            name: format!("{}_{}", dest_var.name, v.0),
            kind: VarKind::Temp,
            size: dest_var.size,
            value_type: dest_var.value_type,
            value: None,
        });
        if let Some(prior) = dag.node(v).prior() {
            b.copy(temp, prior)?;
        }
        let mut src = Vec::with_capacity(sources.len());
        for (key, &child) in sources.iter().zip(&dag.node(v).children) {
            src.push(OperandKey {
                var: b.value(child)?,
                ..*key
            });
        }
        b.body.push(Statement::new(
            Destination {
                var: temp,
                mask: dest.mask,
            },
            *op,
            &src,
        ));
        b.values.insert(v, temp);
    }

    for (var, from) in epilogue {
        b.copy(var, from)?;
    }

    Ok(Pass {
        id: 0,
        root: if region.root == root {
            PassRoot::Root
        } else {
            PassRoot::Node(region.root)
        },
        label: dag.node(region.root).label.clone(),
        nodes,
        body: b.body,
        channels_in,
        channel_out,
        outputs,
        usage: region_usage(dag, region),
    })
}

fn stream_variable(shared: &SharedVariable) -> Variable {
    Variable {
        name: shared.name.clone(),
        kind: VarKind::Stream,
        size: shared.size,
        value_type: shared.value_type,
        value: None,
    }
}
