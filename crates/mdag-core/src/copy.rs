use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use mdag_store::{NodeAdder, NodeGetter};
use mdag_types::{CancelScope, ContentId, DagResult, Node};

use crate::batch::Batch;
use crate::config::BatchConfig;
use crate::fetch::get_nodes;

/// Copy every node reachable from `root` out of `from` and into `to`.
///
/// The walk is depth-first. Each node's unvisited children are requested
/// with one [`get_nodes`] call, and writes go through a [`Batch`] built from
/// `config`, so the copy is durable only once this returns `Ok`. Returns the
/// number of distinct nodes copied.
pub async fn copy_dag(
    scope: &CancelScope,
    from: Arc<dyn NodeGetter>,
    to: Arc<dyn NodeAdder>,
    root: ContentId,
    config: BatchConfig,
) -> DagResult<usize> {
    let mut batch = Batch::new(to, scope, config)?;
    let mut visited = HashSet::from([root]);
    let mut stack = vec![from.get(scope, &root).await?];
    let mut copied = 0;

    while let Some(node) = stack.pop() {
        let children: Vec<ContentId> = node
            .links()
            .iter()
            .map(|link| link.target)
            .filter(|id| visited.insert(*id))
            .collect();
        let promises = get_nodes(scope, from.clone(), &children);

        batch.add(node).await?;
        copied += 1;

        for promise in promises {
            stack.push(promise.get(scope).await?);
        }
    }

    batch.commit().await?;
    debug!(root = %root.short_hex(), copied, "DAG copied");
    Ok(copied)
}
