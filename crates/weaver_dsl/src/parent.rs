//! Parent lookup within one program.

use std::collections::HashMap;

use crate::error::{DslError, DslResult};
use crate::iterator::bfs;
use crate::node::{node_key, NodeRef};

/// Maps each node of one program to its parent. The root has none.
pub struct ParentFinder {
    parents: HashMap<usize, NodeRef>,
}

impl ParentFinder {
    pub fn new(prog: &NodeRef) -> ParentFinder {
        let mut parents = HashMap::new();
        for node in bfs(prog) {
            for child in node.children() {
                parents.insert(node_key(child), node.clone());
            }
        }
        ParentFinder { parents }
    }

    /// The parent of `node`, or `None` for the root or foreign nodes.
    pub fn get_parent(&self, node: &NodeRef) -> Option<&NodeRef> {
        self.parents.get(&node_key(node))
    }

    pub fn get_parent_or_raise(&self, node: &NodeRef) -> DslResult<&NodeRef> {
        self.get_parent(node).ok_or(DslError::NoParent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use std::rc::Rc;
    use weaver_spec::parse;

    #[test]
    fn finds_parents_of_all_non_root_nodes() {
        let spec = parse(
            r#"
            value Int;
            program Toy(Int, Int) -> Int;
            func plus: Int -> Int, Int;
            "#,
        )
        .unwrap();
        let b = Builder::new(&spec);
        let inner = b
            .make_apply("plus", vec![b.make_param(0).unwrap(), b.make_param(1).unwrap()])
            .unwrap();
        let sibling = b.make_param(1).unwrap();
        let prog = b
            .make_apply("plus", vec![inner.clone(), sibling.clone()])
            .unwrap();

        let finder = ParentFinder::new(&prog);
        assert!(finder.get_parent(&prog).is_none());
        assert!(finder.get_parent_or_raise(&prog).is_err());
        assert!(Rc::ptr_eq(finder.get_parent(&inner).unwrap(), &prog));
        assert!(Rc::ptr_eq(finder.get_parent(&sibling).unwrap(), &prog));
        let leaf = inner.children()[0].clone();
        assert!(Rc::ptr_eq(finder.get_parent(&leaf).unwrap(), &inner));
    }
}
