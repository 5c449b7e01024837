//! Partial dominator tree.
//!
//! Dominators are computed with Lengauer–Tarjan over the consumer→producer
//! edges, starting at the DAG root. The depth-first numbering also finds the
//! multiply-referenced nodes: any node reached a second time. The partial
//! tree keeps only the shared operation nodes and, transitively, their
//! immediate dominators; every other node is elided.

use passcut_ir::{Dag, DagError, NodeIndex};

/// Immediate dominators, shared flags and partial-tree children of a DAG.
#[derive(Debug, Clone)]
pub struct Pdt {
    root: NodeIndex,
    dom: Vec<Option<NodeIndex>>,
    mr: Vec<bool>,
    in_tree: Vec<bool>,
    pchildren: Vec<Vec<NodeIndex>>,
    reachable: usize,
}

/// Working arrays of the dominator computation. Vertex numbers are 1-based;
/// `semi == 0` means unnumbered.
struct Lt {
    semi: Vec<usize>,
    vertex: Vec<NodeIndex>,
    parent: Vec<Option<NodeIndex>>,
    ancestor: Vec<Option<NodeIndex>>,
    label: Vec<NodeIndex>,
    pred: Vec<Vec<NodeIndex>>,
    bucket: Vec<Vec<NodeIndex>>,
    dom: Vec<Option<NodeIndex>>,
    mr: Vec<bool>,
}

impl Lt {
    fn new(n: usize, root: NodeIndex) -> Self {
        Self {
            semi: vec![0; n],
            vertex: vec![root],
            parent: vec![None; n],
            ancestor: vec![None; n],
            label: (0..n).map(|i| NodeIndex(i as u32)).collect(),
            pred: vec![Vec::new(); n],
            bucket: vec![Vec::new(); n],
            dom: vec![None; n],
            mr: vec![false; n],
        }
    }

    fn number(&mut self, v: NodeIndex) {
        self.vertex.push(v);
        self.semi[v.index()] = self.vertex.len() - 1;
        self.label[v.index()] = v;
        self.ancestor[v.index()] = None;
    }

    /// Number vertices depth-first and record DFS predecessors.
    fn dfs(&mut self, dag: &Dag, root: NodeIndex) -> Result<(), DagError> {
        let mut on_stack = vec![false; self.semi.len()];
        self.number(root);
        on_stack[root.index()] = true;
        let mut stack: Vec<(NodeIndex, usize)> = vec![(root, 0)];
        while let Some(&mut (v, ref mut next)) = stack.last_mut() {
            let succ = dag.successors(v);
            let Some(&w) = succ.get(*next) else {
                on_stack[v.index()] = false;
                stack.pop();
                continue;
            };
            *next += 1;
            self.pred[w.index()].push(v);
            if self.semi[w.index()] == 0 {
                self.parent[w.index()] = Some(v);
                self.number(w);
                on_stack[w.index()] = true;
                stack.push((w, 0));
            } else if on_stack[w.index()] {
                return Err(DagError::CycleDetected(w));
            } else {
                self.mr[w.index()] = true;
            }
        }
        Ok(())
    }

    fn eval(&mut self, v: NodeIndex) -> NodeIndex {
        if self.ancestor[v.index()].is_none() {
            return v;
        }
        self.compress(v);
        self.label[v.index()]
    }

    /// Path compression with an explicit stack. Requires `ancestor[v]`.
    fn compress(&mut self, v: NodeIndex) {
        let mut path = Vec::new();
        let mut u = v;
        while let Some(a) = self.ancestor[u.index()] {
            if self.ancestor[a.index()].is_none() {
                break;
            }
            path.push(u);
            u = a;
        }
        for &u in path.iter().rev() {
            let Some(a) = self.ancestor[u.index()] else {
                continue;
            };
            let la = self.label[a.index()];
            let lu = self.label[u.index()];
            if self.semi[la.index()] < self.semi[lu.index()] {
                self.label[u.index()] = la;
            }
            self.ancestor[u.index()] = self.ancestor[a.index()];
        }
    }

    fn link(&mut self, v: NodeIndex, w: NodeIndex) {
        self.ancestor[w.index()] = Some(v);
    }

    fn dominators(&mut self) {
        let n = self.vertex.len() - 1;
        for i in (2..=n).rev() {
            let w = self.vertex[i];
            let Some(parent) = self.parent[w.index()] else {
                continue;
            };
            let preds = std::mem::take(&mut self.pred[w.index()]);
            for &v in &preds {
                let u = self.eval(v);
                if self.semi[u.index()] < self.semi[w.index()] {
                    self.semi[w.index()] = self.semi[u.index()];
                }
            }
            self.pred[w.index()] = preds;
            let s = self.vertex[self.semi[w.index()]];
            self.bucket[s.index()].push(w);
            self.link(parent, w);

            let bucket = std::mem::take(&mut self.bucket[parent.index()]);
            for v in bucket {
                let u = self.eval(v);
                self.dom[v.index()] = Some(if self.semi[u.index()] < self.semi[v.index()] {
                    u
                } else {
                    parent
                });
            }
        }
        for i in 2..=n {
            let w = self.vertex[i];
            let sdom = self.vertex[self.semi[w.index()]];
            if let Some(d) = self.dom[w.index()] {
                if d != sdom {
                    self.dom[w.index()] = self.dom[d.index()];
                }
            }
        }
        let root = self.vertex[1];
        self.dom[root.index()] = None;
    }
}

impl Pdt {
    /// Build dominators and the partial tree for `dag`.
    pub fn build(dag: &Dag) -> Result<Self, DagError> {
        let n = dag.node_count();
        let root = dag.root();
        let mut lt = Lt::new(n, root);
        lt.dfs(dag, root)?;
        lt.dominators();

        let mut in_tree: Vec<bool> = (0..n)
            .map(|i| lt.mr[i] && dag.node(NodeIndex(i as u32)).is_op())
            .collect();
        let mut pchildren = vec![Vec::new(); n];
        for v in dag.postorder_from(root) {
            if !in_tree[v.index()] {
                continue;
            }
            if let Some(d) = lt.dom[v.index()] {
                in_tree[d.index()] = true;
                pchildren[d.index()].push(v);
            }
        }
        in_tree[root.index()] = true;

        let pdt = Self {
            root,
            dom: lt.dom,
            mr: lt.mr,
            in_tree,
            pchildren,
            reachable: lt.vertex.len() - 1,
        };
        tracing::debug!(
            reachable = pdt.reachable,
            shared = pdt.shared_count(dag),
            "partial dominator tree built"
        );
        Ok(pdt)
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Immediate dominator; `None` for the root and unreachable nodes.
    pub fn idom(&self, v: NodeIndex) -> Option<NodeIndex> {
        self.dom[v.index()]
    }

    /// Whether `v` was reached from more than one consumer.
    pub fn is_mr(&self, v: NodeIndex) -> bool {
        self.mr[v.index()]
    }

    /// Whether `v` is a multiply-referenced operation node, the only kind
    /// of node with a save-vs-recompute decision.
    pub fn is_shared(&self, dag: &Dag, v: NodeIndex) -> bool {
        self.mr[v.index()] && dag.node(v).is_op()
    }

    pub fn in_tree(&self, v: NodeIndex) -> bool {
        self.in_tree[v.index()]
    }

    /// Children of `v` in the partial tree, in DAG post-order.
    pub fn children(&self, v: NodeIndex) -> &[NodeIndex] {
        &self.pchildren[v.index()]
    }

    /// Number of nodes reachable from the root (root included).
    pub fn reachable(&self) -> usize {
        self.reachable
    }

    pub fn shared_count(&self, dag: &Dag) -> usize {
        dag.indices().filter(|&v| self.is_shared(dag, v)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use passcut_ir::{build_dag, Block, Opcode, VarKind};

    /// `x = a*a; y = x+a; z = x*a; out = y+z`: x is shared and dominated by out.
    fn diamond() -> Block {
        let mut b = Block::new();
        let a = b.var("a", VarKind::Input, 4);
        let x = b.var("x", VarKind::Temp, 4);
        let y = b.var("y", VarKind::Temp, 4);
        let z = b.var("z", VarKind::Temp, 4);
        let out = b.var("out", VarKind::Output, 4);
        b.emit(x, Opcode::Mul, &[a, a]);
        b.emit(y, Opcode::Add, &[x, a]);
        b.emit(z, Opcode::Mul, &[x, a]);
        b.emit(out, Opcode::Add, &[y, z]);
        b
    }

    #[test]
    fn chain_has_no_shared_nodes() {
        let dag = build_dag(&mad_chain(4)).unwrap();
        let pdt = Pdt::build(&dag).unwrap();
        assert_eq!(pdt.shared_count(&dag), 0);
        assert!(pdt.children(dag.root()).is_empty());
        // each mad is dominated by its consumer
        assert_eq!(pdt.idom(NodeIndex(2)), Some(NodeIndex(3)));
        assert_eq!(pdt.idom(NodeIndex(5)), Some(dag.root()));
        // the input leaf is read by every mad
        assert!(pdt.is_mr(NodeIndex(1)));
        assert!(!pdt.is_shared(&dag, NodeIndex(1)));
    }

    #[test]
    fn diamond_dominator() {
        let dag = build_dag(&diamond()).unwrap();
        // n1 a, n2 x, n3 y, n4 z, n5 out
        let pdt = Pdt::build(&dag).unwrap();
        let x = NodeIndex(2);
        let out = NodeIndex(5);
        assert!(pdt.is_shared(&dag, x));
        assert_eq!(pdt.idom(x), Some(out));
        assert_eq!(pdt.idom(NodeIndex(3)), Some(out));
        assert_eq!(pdt.children(out), &[x]);
        assert!(pdt.in_tree(out));
        assert_eq!(pdt.children(dag.root()), &[out]);
        assert_eq!(pdt.reachable(), 6);
    }

    #[test]
    fn shared_output_is_multiply_referenced() {
        let mut b = Block::new();
        let a = b.var("a", VarKind::Input, 4);
        let o1 = b.var("o1", VarKind::Output, 4);
        let o2 = b.var("o2", VarKind::Output, 4);
        b.emit(o1, Opcode::Abs, &[a]);
        b.emit(o2, Opcode::Mul, &[o1, a]);
        let dag = build_dag(&b).unwrap();
        let pdt = Pdt::build(&dag).unwrap();
        assert!(pdt.is_shared(&dag, NodeIndex(2)));
        assert_eq!(pdt.idom(NodeIndex(2)), Some(dag.root()));
        assert_eq!(pdt.children(dag.root()), &[NodeIndex(2)]);
    }

    #[test]
    fn nested_shared_nodes() {
        // x feeds y and z; y feeds p and q; everything meets at out.
        let mut b = Block::new();
        let a = b.var("a", VarKind::Input, 4);
        let names = ["x", "y", "z", "p", "q"];
        let ids: Vec<_> = names
            .iter()
            .map(|n| b.var(n, VarKind::Temp, 4))
            .collect();
        let out = b.var("out", VarKind::Output, 4);
        let (x, y, z, p, q) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
        b.emit(x, Opcode::Mul, &[a, a]);
        b.emit(y, Opcode::Add, &[x, a]);
        b.emit(z, Opcode::Mul, &[x, a]);
        b.emit(p, Opcode::Add, &[y, z]);
        b.emit(q, Opcode::Mul, &[y, a]);
        b.emit(out, Opcode::Add, &[p, q]);
        let dag = build_dag(&b).unwrap();
        // n1 a, n2 x, n3 y, n4 z, n5 p, n6 q, n7 out
        let pdt = Pdt::build(&dag).unwrap();
        let (xn, yn, outn) = (NodeIndex(2), NodeIndex(3), NodeIndex(7));
        assert!(pdt.is_shared(&dag, xn));
        assert!(pdt.is_shared(&dag, yn));
        assert_eq!(pdt.idom(yn), Some(outn));
        assert_eq!(pdt.idom(xn), Some(outn));
        // post-order lists x before y
        assert_eq!(pdt.children(outn), &[xn, yn]);
    }

    #[test]
    fn cyclic_dag_is_rejected() {
        let mut b = Block::new();
        let a = b.var("a", VarKind::Input, 4);
        let t = b.var("t", VarKind::Temp, 4);
        let out = b.var("out", VarKind::Output, 4);
        b.emit(t, Opcode::Add, &[a, a]);
        b.emit(out, Opcode::Mul, &[t, a]);
        let dag = build_dag(&b).unwrap();

        // n2 t now reads n3 out, which reads n2. Skip validation on the way in.
        let mut value = serde_json::to_value(&dag).unwrap();
        value["nodes"][2]["children"] = serde_json::json!([3, 3]);
        let cyclic: Dag = serde_json::from_value(value).unwrap();

        match Pdt::build(&cyclic) {
            Err(DagError::CycleDetected(v)) => assert_eq!(v, NodeIndex(3)),
            other => panic!("expected a cycle, got {other:?}"),
        }
    }
}
