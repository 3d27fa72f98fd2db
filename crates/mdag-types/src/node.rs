//! Node values of the Merkle DAG.
//!
//! A [`Node`] is immutable once built: its identifier is derived from its
//! canonical encoding, so changing the payload or the link table produces a
//! different node. Two concrete node kinds ship with the crate:
//!
//! - [`RawNode`] -- opaque leaf bytes, no links
//! - [`LinkedNode`] -- a payload plus an ordered link table, encoded with bincode

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::{self, Block};
use crate::error::{DagError, DagResult};
use crate::id::ContentId;
use crate::link::Link;

/// Shared handle to a node of any kind.
pub type NodeRef = Arc<dyn Node>;

/// A node in the Merkle DAG.
pub trait Node: Send + Sync + fmt::Debug {
    /// Content identifier of the canonical encoding.
    fn id(&self) -> ContentId;

    /// The canonical encoding; this is what the store persists.
    fn raw_data(&self) -> &[u8];

    /// The payload carried by the node, without the link table.
    fn data(&self) -> &[u8];

    /// Outgoing links, in their stored order.
    fn links(&self) -> &[Link];

    /// Follow the first segment of `path` through this node's link table.
    ///
    /// Returns the first link whose name matches, together with the
    /// segments left to resolve from the linked node.
    fn resolve_link<'p>(&self, path: &'p [&'p str]) -> DagResult<(Link, &'p [&'p str])> {
        let (first, rest) = path.split_first().ok_or(DagError::EmptyPath)?;
        self.links()
            .iter()
            .find(|link| link.name == *first)
            .map(|link| (link.clone(), rest))
            .ok_or_else(|| DagError::NoSuchLink((*first).to_string()))
    }

    /// Paths resolvable from this node, one per named link.
    fn tree(&self) -> Vec<String> {
        self.links().iter().map(|link| link.name.clone()).collect()
    }

    /// Cumulative size: this node's encoding plus every linked subtree.
    fn size(&self) -> u64 {
        self.raw_data().len() as u64 + self.links().iter().map(|l| l.size).sum::<u64>()
    }

    /// Size statistics for this node.
    fn stat(&self) -> NodeStat {
        let block_size = self.raw_data().len();
        let data_size = self.data().len();
        NodeStat {
            hash: self.id().to_hex(),
            num_links: self.links().len(),
            block_size,
            links_size: block_size.saturating_sub(data_size),
            data_size,
            cumulative_size: self.size(),
        }
    }
}

impl PartialEq for dyn Node {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for dyn Node {}

/// Size statistics of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStat {
    pub hash: String,
    /// Number of entries in the link table.
    pub num_links: usize,
    /// Size of the raw, encoded node.
    pub block_size: usize,
    /// Bytes of the encoding not taken by the payload.
    pub links_size: usize,
    pub data_size: usize,
    /// Encoded size plus the sizes of every linked subtree.
    pub cumulative_size: u64,
}

impl fmt::Display for NodeStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NodeStat{{NumLinks: {}, BlockSize: {}, LinksSize: {}, DataSize: {}, CumulativeSize: {}}}",
            self.num_links, self.block_size, self.links_size, self.data_size, self.cumulative_size
        )
    }
}

// ---------------------------------------------------------------------------
// RawNode
// ---------------------------------------------------------------------------

/// Leaf node holding opaque bytes.
#[derive(Clone, Debug)]
pub struct RawNode {
    id: ContentId,
    data: Bytes,
}

impl RawNode {
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            id: ContentId::raw(&data),
            data,
        }
    }

    /// Decode a raw block. Any bytes are a valid raw node.
    pub fn decode(block: &Block) -> DagResult<Self> {
        if block.id().codec() != codec::RAW {
            return Err(DagError::Decode {
                id: block.id(),
                reason: format!("expected raw codec, got {:#x}", block.id().codec()),
            });
        }
        Ok(Self {
            id: block.id(),
            data: block.data().clone(),
        })
    }
}

impl Node for RawNode {
    fn id(&self) -> ContentId {
        self.id
    }

    fn raw_data(&self) -> &[u8] {
        &self.data
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn links(&self) -> &[Link] {
        &[]
    }

    fn resolve_link<'p>(&self, path: &'p [&'p str]) -> DagResult<(Link, &'p [&'p str])> {
        match path.first() {
            None => Err(DagError::EmptyPath),
            Some(name) => Err(DagError::NoSuchLink((*name).to_string())),
        }
    }

    fn tree(&self) -> Vec<String> {
        Vec::new()
    }
}

impl PartialEq for RawNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RawNode {}

// ---------------------------------------------------------------------------
// LinkedNode
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct LinkedEncoding {
    data: Vec<u8>,
    links: Vec<Link>,
}

/// Node with a payload and an ordered link table.
#[derive(Clone, Debug)]
pub struct LinkedNode {
    id: ContentId,
    data: Bytes,
    links: Vec<Link>,
    encoded: Bytes,
}

impl LinkedNode {
    /// Build and encode a node. The link order is preserved as given.
    pub fn new(data: impl Into<Bytes>, links: Vec<Link>) -> DagResult<Self> {
        let data = data.into();
        let encoding = LinkedEncoding {
            data: data.to_vec(),
            links,
        };
        let encoded = bincode::serialize(&encoding)
            .map_err(|e| DagError::Serialization(e.to_string()))?;
        Ok(Self {
            id: ContentId::compute(codec::LINKED, &encoded),
            data,
            links: encoding.links,
            encoded: Bytes::from(encoded),
        })
    }

    /// Decode a block produced by [`LinkedNode::new`].
    pub fn decode(block: &Block) -> DagResult<Self> {
        let id = block.id();
        if id.codec() != codec::LINKED {
            return Err(DagError::Decode {
                id,
                reason: format!("expected linked codec, got {:#x}", id.codec()),
            });
        }
        let encoding: LinkedEncoding =
            bincode::deserialize(block.data()).map_err(|e| DagError::Decode {
                id,
                reason: e.to_string(),
            })?;
        Ok(Self {
            id,
            data: Bytes::from(encoding.data),
            links: encoding.links,
            encoded: block.data().clone(),
        })
    }
}

impl Node for LinkedNode {
    fn id(&self) -> ContentId {
        self.id
    }

    fn raw_data(&self) -> &[u8] {
        &self.encoded
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn links(&self) -> &[Link] {
        &self.links
    }
}

impl PartialEq for LinkedNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LinkedNode {}
