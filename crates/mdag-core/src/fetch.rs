//! Concurrent, deduplicated resolution of linked nodes.
//!
//! [`get_nodes`] turns a list of identifiers, duplicates included, into one
//! [`NodePromise`] per position. Only the distinct identifiers are requested
//! from the store, in a single `get_many` call; each answer is then fanned
//! out to every position that asked for it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use mdag_store::{NodeGetter, NodeOption};
use mdag_types::{CancelScope, ContentId, DagError, Node};

use crate::promise::NodePromise;

/// Positions of `target` in `ids`, looking only at `start..`.
pub fn find_links(ids: &[ContentId], target: &ContentId, start: usize) -> Vec<usize> {
    ids.iter()
        .enumerate()
        .skip(start)
        .filter(|(_, id)| *id == target)
        .map(|(i, _)| i)
        .collect()
}

/// Resolve every link of `root`. Promise `i` answers `root.links()[i]`.
pub fn get_dag(
    scope: &CancelScope,
    getter: Arc<dyn NodeGetter>,
    root: &dyn Node,
) -> Vec<NodePromise> {
    let ids: Vec<ContentId> = root.links().iter().map(|link| link.target).collect();
    get_nodes(scope, getter, &ids)
}

/// Fetch `ids` with one deduplicated store request.
///
/// The returned promises line up with `ids`: same length, same order, and a
/// repeated identifier gets its own promise for each occurrence. The fetch
/// runs on a spawned task, so this must be called from within a Tokio
/// runtime. Empty input returns no promises and touches no store.
///
/// Promises settle as follows:
/// - a delivered node resolves every position that requested it;
/// - a per-identifier error fails only that identifier's positions;
/// - a terminal stream error fails every position still pending;
/// - a stream that closes early fails the stragglers with
///   [`DagError::NotFound`];
/// - cancelling `scope` fails every position still pending with
///   [`DagError::Cancelled`].
pub fn get_nodes(
    scope: &CancelScope,
    getter: Arc<dyn NodeGetter>,
    ids: &[ContentId],
) -> Vec<NodePromise> {
    if ids.is_empty() {
        return Vec::new();
    }

    let promises: Vec<NodePromise> = ids.iter().map(|_| NodePromise::new(scope)).collect();

    let mut pending: HashMap<ContentId, Vec<usize>> = HashMap::new();
    let mut distinct = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        pending
            .entry(*id)
            .or_insert_with(|| {
                distinct.push(*id);
                Vec::new()
            })
            .push(i);
    }

    debug!(
        requested = ids.len(),
        distinct = distinct.len(),
        "fetching linked nodes"
    );

    let fetch_scope = scope.child();
    let producers = promises.clone();
    tokio::spawn(async move {
        fan_out(&fetch_scope, getter.as_ref(), distinct, pending, &producers).await;
        // Tell the store to stop producing for this request.
        fetch_scope.cancel();
    });

    promises
}

async fn fan_out(
    scope: &CancelScope,
    getter: &dyn NodeGetter,
    distinct: Vec<ContentId>,
    mut pending: HashMap<ContentId, Vec<usize>>,
    promises: &[NodePromise],
) {
    let mut results = getter.get_many(scope, distinct);

    while !pending.is_empty() {
        let option = tokio::select! {
            option = results.recv() => option,
            _ = scope.cancelled() => {
                fail_pending(pending, promises, |_| DagError::Cancelled);
                return;
            }
        };

        match option {
            Some(NodeOption::Found(node)) => match pending.remove(&node.id()) {
                Some(positions) => {
                    for i in positions {
                        // A caller may have failed this position already.
                        promises[i].try_resolve(node.clone());
                    }
                }
                None => debug!(id = %node.id(), "ignoring unrequested or repeated node"),
            },
            Some(NodeOption::Failed { id, error }) => {
                if let Some(positions) = pending.remove(&id) {
                    for i in positions {
                        promises[i].fail(error.clone());
                    }
                }
            }
            Some(NodeOption::Aborted(error)) => {
                debug!(error = %error, pending = pending.len(), "node stream aborted");
                fail_pending(pending, promises, |_| error.clone());
                return;
            }
            None => {
                debug!(missing = pending.len(), "node stream closed early");
                fail_pending(pending, promises, DagError::NotFound);
                return;
            }
        }
    }
}

fn fail_pending(
    pending: HashMap<ContentId, Vec<usize>>,
    promises: &[NodePromise],
    error: impl Fn(ContentId) -> DagError,
) {
    for (id, positions) in pending {
        for i in positions {
            promises[i].fail(error(id));
        }
    }
}
