use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::mpsc;

use mdag_types::{CancelScope, ContentId, DagError, DagResult, Link, Node, NodeRef};

use crate::traits::{DagService, LinkGetter, NodeAdder, NodeGetter, NodeOption};

/// In-memory, HashMap-based node store.
///
/// Intended for tests and embedding. Nodes are shared handles, so reads and
/// writes only clone an `Arc`.
pub struct MemoryDag {
    nodes: RwLock<HashMap<ContentId, NodeRef>>,
}

impl MemoryDag {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Number of nodes currently stored.
    pub fn len(&self) -> usize {
        self.nodes.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().expect("lock poisoned").is_empty()
    }

    /// Returns `true` if `id` is stored.
    pub fn contains(&self, id: &ContentId) -> bool {
        self.nodes.read().expect("lock poisoned").contains_key(id)
    }

    fn lookup(&self, id: &ContentId) -> Option<NodeRef> {
        self.nodes.read().expect("lock poisoned").get(id).cloned()
    }
}

impl Default for MemoryDag {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeGetter for MemoryDag {
    async fn get(&self, scope: &CancelScope, id: &ContentId) -> DagResult<NodeRef> {
        if scope.is_cancelled() {
            return Err(DagError::Cancelled);
        }
        self.lookup(id).ok_or(DagError::NotFound(*id))
    }

    fn get_many(&self, scope: &CancelScope, ids: Vec<ContentId>) -> mpsc::Receiver<NodeOption> {
        // Every answer fits, so try_send below cannot hit a full channel.
        let (tx, rx) = mpsc::channel(ids.len().max(1));
        if scope.is_cancelled() {
            let _ = tx.try_send(NodeOption::Aborted(DagError::Cancelled));
            return rx;
        }
        let nodes = self.nodes.read().expect("lock poisoned");
        for id in ids {
            let option = match nodes.get(&id) {
                Some(node) => NodeOption::Found(node.clone()),
                None => NodeOption::Failed {
                    id,
                    error: DagError::NotFound(id),
                },
            };
            let _ = tx.try_send(option);
        }
        rx
    }
}

#[async_trait]
impl LinkGetter for MemoryDag {
    async fn get_links(&self, scope: &CancelScope, id: &ContentId) -> DagResult<Vec<Link>> {
        if scope.is_cancelled() {
            return Err(DagError::Cancelled);
        }
        let nodes = self.nodes.read().expect("lock poisoned");
        let node = nodes.get(id).ok_or(DagError::NotFound(*id))?;
        Ok(node.links().to_vec())
    }
}

#[async_trait]
impl NodeAdder for MemoryDag {
    async fn add(&self, scope: &CancelScope, node: NodeRef) -> DagResult<()> {
        self.add_many(scope, vec![node]).await
    }

    async fn add_many(&self, scope: &CancelScope, nodes: Vec<NodeRef>) -> DagResult<()> {
        if scope.is_cancelled() {
            return Err(DagError::Cancelled);
        }
        let mut map = self.nodes.write().expect("lock poisoned");
        for node in nodes {
            // Content addressing: an existing entry is already this node.
            map.entry(node.id()).or_insert(node);
        }
        Ok(())
    }
}

#[async_trait]
impl DagService for MemoryDag {
    async fn remove(&self, scope: &CancelScope, id: &ContentId) -> DagResult<()> {
        if scope.is_cancelled() {
            return Err(DagError::Cancelled);
        }
        self.nodes.write().expect("lock poisoned").remove(id);
        Ok(())
    }

    async fn remove_many(&self, scope: &CancelScope, ids: Vec<ContentId>) -> DagResult<()> {
        if scope.is_cancelled() {
            return Err(DagError::Cancelled);
        }
        let mut map = self.nodes.write().expect("lock poisoned");
        for id in &ids {
            map.remove(id);
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryDag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDag")
            .field("node_count", &self.len())
            .finish()
    }
}
