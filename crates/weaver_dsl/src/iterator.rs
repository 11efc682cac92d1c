//! Tree traversals over shared nodes.

use std::collections::VecDeque;

use crate::node::NodeRef;

/// Breadth-first traversal, root first, children left to right.
pub fn bfs(root: &NodeRef) -> Bfs {
    let mut queue = VecDeque::new();
    queue.push_back(root.clone());
    Bfs { queue }
}

pub struct Bfs {
    queue: VecDeque<NodeRef>,
}

impl Iterator for Bfs {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        let node = self.queue.pop_front()?;
        for child in node.children() {
            self.queue.push_back(child.clone());
        }
        Some(node)
    }
}

/// Post-order traversal: children before parents, left to right.
pub fn post_order(root: &NodeRef) -> PostOrder {
    // Reverse preorder with reversed children is postorder backwards.
    let mut stack = vec![root.clone()];
    let mut order = Vec::new();
    while let Some(node) = stack.pop() {
        for child in node.children() {
            stack.push(child.clone());
        }
        order.push(node);
    }
    order.reverse();
    PostOrder {
        items: order.into_iter(),
    }
}

pub struct PostOrder {
    items: std::vec::IntoIter<NodeRef>,
}

impl Iterator for PostOrder {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        self.items.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use weaver_spec::parse;

    fn program() -> NodeRef {
        let spec = parse(
            r#"
            enum SmallInt { "0", "1" }
            value Int;
            program Toy(Int, Int) -> Int;
            func const: Int -> SmallInt;
            func plus: Int -> Int, Int;
            "#,
        )
        .unwrap();
        let builder = Builder::new(&spec);
        // plus(const("1"), plus(@param0, @param1))
        builder
            .from_sexp("(plus (const (SmallInt \"1\")) (plus (@param 0) (@param 1)))")
            .unwrap()
    }

    #[test]
    fn bfs_visits_level_by_level() {
        let prog = program();
        let names: Vec<String> = bfs(&prog).map(|n| n.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "plus(const(1), plus(@param0, @param1))",
                "const(1)",
                "plus(@param0, @param1)",
                "1",
                "@param0",
                "@param1",
            ]
        );
    }

    #[test]
    fn post_order_visits_children_first() {
        let prog = program();
        let names: Vec<String> = post_order(&prog).map(|n| n.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "1",
                "const(1)",
                "@param0",
                "@param1",
                "plus(@param0, @param1)",
                "plus(const(1), plus(@param0, @param1))",
            ]
        );
    }

    #[test]
    fn single_leaf_traversals() {
        let spec = parse(
            r#"
            value Int;
            program Id(Int) -> Int;
            func id: Int -> Int;
            "#,
        )
        .unwrap();
        let leaf = Builder::new(&spec).make_param(0).unwrap();
        assert_eq!(bfs(&leaf).count(), 1);
        assert_eq!(post_order(&leaf).count(), 1);
    }
}
