use serde::{Deserialize, Serialize};

use crate::id::ContentId;
use crate::node::Node;

/// A named, sized edge from one node to another.
///
/// Links are plain values: a node owns a list of them, but the same link
/// value may be copied into any number of nodes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// UTF-8 name, expected to be unique within one node's link table.
    pub name: String,
    /// Cumulative size of the target and everything it links to.
    pub size: u64,
    /// Identifier of the target node.
    pub target: ContentId,
}

impl Link {
    pub fn new(name: impl Into<String>, size: u64, target: ContentId) -> Self {
        Self {
            name: name.into(),
            size,
            target,
        }
    }

    /// Build a link pointing at `node`, sized with its cumulative size.
    pub fn to_node(name: impl Into<String>, node: &dyn Node) -> Self {
        Self::new(name, node.size(), node.id())
    }
}
