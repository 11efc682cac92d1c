//! Stable integer ids for the nodes of one program.
//!
//! Ids are assigned in BFS order starting at 0, so the root is always id 0
//! and ids are dense. The decider uses them to name SMT variables per node;
//! the enumerators use them to translate blame back onto template positions.
//!
//! Identity is by node address: two structurally equal subtrees occurring at
//! different positions get different ids.

use std::collections::HashMap;

use crate::error::{DslError, DslResult};
use crate::iterator::bfs;
use crate::node::{node_key, NodeRef};

/// Bidirectional mapping between the nodes of one program and dense ids.
pub struct NodeIndexer {
    ids: HashMap<usize, usize>,
    nodes: Vec<NodeRef>,
}

impl NodeIndexer {
    /// Indexes every node of `prog` in BFS order.
    pub fn new(prog: &NodeRef) -> NodeIndexer {
        let mut ids = HashMap::new();
        let mut nodes = Vec::new();
        for node in bfs(prog) {
            ids.insert(node_key(&node), nodes.len());
            nodes.push(node);
        }
        NodeIndexer { ids, nodes }
    }

    /// The id of `node`, or `None` if it is not part of the indexed program.
    pub fn get_id(&self, node: &NodeRef) -> Option<usize> {
        self.ids.get(&node_key(node)).copied()
    }

    pub fn get_id_or_raise(&self, node: &NodeRef) -> DslResult<usize> {
        self.get_id(node).ok_or(DslError::NodeNotIndexed)
    }

    /// The node with the given id, if assigned.
    pub fn get_node(&self, id: usize) -> Option<&NodeRef> {
        self.nodes.get(id)
    }

    pub fn get_node_or_raise(&self, id: usize) -> DslResult<&NodeRef> {
        self.get_node(id).ok_or(DslError::IdNotAssigned { id })
    }

    /// All indexed nodes, by id.
    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use weaver_spec::parse;

    #[test]
    fn ids_follow_bfs_order_and_identity() {
        let spec = parse(
            r#"
            value Int;
            program Toy(Int, Int) -> Int;
            func plus: Int -> Int, Int;
            "#,
        )
        .unwrap();
        let b = Builder::new(&spec);
        // plus(plus(@param0, @param1), @param0): the two @param0 leaves are
        // distinct nodes and must get distinct ids.
        let inner = b
            .make_apply("plus", vec![b.make_param(0).unwrap(), b.make_param(1).unwrap()])
            .unwrap();
        let outer_p0 = b.make_param(0).unwrap();
        let prog = b.make_apply("plus", vec![inner.clone(), outer_p0.clone()]).unwrap();

        let indexer = NodeIndexer::new(&prog);
        assert_eq!(indexer.num_nodes(), 5);
        assert_eq!(indexer.get_id(&prog), Some(0));
        assert_eq!(indexer.get_id(&inner), Some(1));
        assert_eq!(indexer.get_id(&outer_p0), Some(2));

        let inner_p0 = inner.children()[0].clone();
        assert!(inner_p0.deep_eq(&outer_p0));
        assert_ne!(indexer.get_id(&inner_p0), indexer.get_id(&outer_p0));
    }

    #[test]
    fn foreign_nodes_are_not_indexed() {
        let spec = parse(
            r#"
            value Int;
            program Toy(Int) -> Int;
            func id: Int -> Int;
            "#,
        )
        .unwrap();
        let b = Builder::new(&spec);
        let prog = b.make_apply("id", vec![b.make_param(0).unwrap()]).unwrap();
        let foreign = b.make_param(0).unwrap();

        let indexer = NodeIndexer::new(&prog);
        assert_eq!(indexer.get_id(&foreign), None);
        assert!(indexer.get_id_or_raise(&foreign).is_err());
        assert!(indexer.get_node_or_raise(17).is_err());
    }
}
