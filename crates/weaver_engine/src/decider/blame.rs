//! Blame: the decider's currency of explanation.

use std::fmt;

use weaver_dsl::NodeRef;
use weaver_spec::ProdRef;

/// One (node, production) pair inside a blame set.
///
/// Read as "this node cannot be labelled with this production". The node is
/// always part of the rejected candidate; the production is either the
/// node's own or a substitute proven equally hopeless.
#[derive(Clone)]
pub struct Blame {
    pub node: NodeRef,
    pub production: ProdRef,
}

impl Blame {
    pub fn new(node: NodeRef, production: ProdRef) -> Blame {
        Blame { node, production }
    }
}

impl fmt::Debug for Blame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Blame(node={}, production={})",
            self.node,
            self.production.id()
        )
    }
}

impl fmt::Display for Blame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.node, self.production.id())
    }
}

/// An unordered collection of blames, interpreted disjunctively: no
/// satisfying program identifies every listed node with its listed
/// production.
pub type BlameSet = Vec<Blame>;
