use async_trait::async_trait;
use tokio::sync::mpsc;

use mdag_types::{CancelScope, ContentId, DagError, DagResult, Link, Node, NodeRef};

/// One item of a [`NodeGetter::get_many`] stream.
#[derive(Clone, Debug)]
pub enum NodeOption {
    /// A requested node.
    Found(NodeRef),
    /// A single identifier could not be produced. Other identifiers in the
    /// same request are unaffected.
    Failed { id: ContentId, error: DagError },
    /// The whole request failed; no further items follow.
    Aborted(DagError),
}

/// Read side of a node store.
///
/// Implementations must tolerate concurrent calls.
#[async_trait]
pub trait NodeGetter: Send + Sync {
    /// Fetch one node.
    ///
    /// Returns [`DagError::NotFound`] if the store does not hold `id`.
    async fn get(&self, scope: &CancelScope, id: &ContentId) -> DagResult<NodeRef>;

    /// Fetch many nodes, delivering results as they become available and in
    /// no particular order.
    ///
    /// The stream may close before every identifier has been answered; the
    /// missing ones are to be treated as not found. Implementations should
    /// stop producing once `scope` is cancelled.
    fn get_many(&self, scope: &CancelScope, ids: Vec<ContentId>) -> mpsc::Receiver<NodeOption>;

    /// Fetch the node a link points at.
    async fn get_link(&self, scope: &CancelScope, link: &Link) -> DagResult<NodeRef> {
        self.get(scope, &link.target).await
    }
}

/// Optional fast path for stores that can list a node's children without
/// handing back the whole node.
#[async_trait]
pub trait LinkGetter: NodeGetter {
    /// The link table of the node stored under `id`.
    async fn get_links(&self, scope: &CancelScope, id: &ContentId) -> DagResult<Vec<Link>> {
        Ok(self.get(scope, id).await?.links().to_vec())
    }
}

/// Write side of a node store.
#[async_trait]
pub trait NodeAdder: Send + Sync {
    /// Add one node. Adding a node that already exists is a no-op.
    async fn add(&self, scope: &CancelScope, node: NodeRef) -> DagResult<()>;

    /// Add many nodes as one write.
    ///
    /// Must be safe to call concurrently. A failure is reported for the batch
    /// as a whole; callers learn nothing about which nodes landed.
    async fn add_many(&self, scope: &CancelScope, nodes: Vec<NodeRef>) -> DagResult<()>;
}

/// A full Merkle DAG service: read, write and remove.
#[async_trait]
pub trait DagService: NodeGetter + NodeAdder {
    /// Remove a node. Removing an absent node succeeds.
    async fn remove(&self, scope: &CancelScope, id: &ContentId) -> DagResult<()>;

    /// Remove many nodes. Absent nodes are skipped.
    async fn remove_many(&self, scope: &CancelScope, ids: Vec<ContentId>) -> DagResult<()> {
        for id in &ids {
            self.remove(scope, id).await?;
        }
        Ok(())
    }
}
