//! Buffered, bounded-parallel writes to a node store.
//!
//! A [`Batch`] collects nodes and hands them to the store in groups. Once
//! the buffer crosses a size or count threshold it is dispatched on its own
//! task and a fresh buffer starts filling, so callers keep adding while
//! earlier groups are still being written.
//!
//! # Invariants
//!
//! - At most `max_parallel_flushes` writes are dispatched but unacknowledged.
//!   The result queue has exactly that capacity and doubles as the admission
//!   gate: when it is full, the flush that would exceed it waits for a slot.
//! - Every added node goes to exactly one `add_many` call.
//! - The first error is sticky. After it, every `add` and `commit` returns it
//!   without touching the store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use mdag_store::NodeAdder;
use mdag_types::{CancelScope, DagError, DagResult, Node, NodeRef};

use crate::config::BatchConfig;

type FlushResult = DagResult<()>;

/// Write buffer in front of a [`NodeAdder`].
///
/// A batch is driven by one caller at a time (`add` and `commit` take
/// `&mut self`). Flushes dispatched by the batch run concurrently with that
/// caller and may complete in any order.
pub struct Batch {
    adder: Option<Arc<dyn NodeAdder>>,
    scope: CancelScope,
    config: BatchConfig,

    active_flushes: usize,
    results_tx: mpsc::Sender<FlushResult>,
    results: Option<mpsc::Receiver<FlushResult>>,
    err: Option<DagError>,

    nodes: Vec<NodeRef>,
    size: usize,
}

impl Batch {
    /// Create a batch writing to `adder`.
    ///
    /// The batch runs in a child of `scope`: cancelling `scope` (or calling
    /// [`Batch::cancel`]) aborts flushes that have not finished and makes the
    /// next blocking call return [`DagError::Cancelled`].
    pub fn new(
        adder: Arc<dyn NodeAdder>,
        scope: &CancelScope,
        config: BatchConfig,
    ) -> DagResult<Self> {
        config.validate()?;
        let (results_tx, results) = mpsc::channel(config.max_parallel_flushes);
        Ok(Self {
            adder: Some(adder),
            scope: scope.child(),
            config,
            active_flushes: 0,
            results_tx,
            results: Some(results),
            err: None,
            nodes: Vec::new(),
            size: 0,
        })
    }

    /// Buffer a node, flushing if a threshold is crossed.
    ///
    /// Returns the batch's sticky error, if any, so callers can stop early
    /// instead of waiting for [`Batch::commit`]. May wait for a flush slot
    /// when `max_parallel_flushes` writes are already in flight.
    pub async fn add(&mut self, node: NodeRef) -> DagResult<()> {
        self.check()?;
        // Not required for correctness; surfaces failed flushes sooner.
        self.process_results();
        self.check()?;

        self.size += node.raw_data().len();
        self.nodes.push(node);

        if self.size > self.config.max_buffered_bytes
            || self.nodes.len() > self.config.max_buffered_nodes
        {
            self.flush().await;
        }
        self.check()
    }

    /// Flush what is buffered and wait for every outstanding flush.
    ///
    /// Returns the first error any flush produced, or
    /// [`DagError::Cancelled`] if the scope is cancelled while waiting.
    pub async fn commit(&mut self) -> DagResult<()> {
        self.check()?;
        self.flush().await;

        while self.active_flushes > 0 && self.err.is_none() {
            match self.next_result().await {
                Some(Err(err)) => self.set_error(err),
                Some(Ok(())) => self.active_flushes -= 1,
                None => self.set_error(DagError::Cancelled),
            }
        }
        self.check()
    }

    /// Cancel this batch's scope.
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    /// The sticky error, if the batch has failed.
    pub fn error(&self) -> Option<&DagError> {
        self.err.as_ref()
    }

    /// Nodes waiting in the current buffer.
    pub fn buffered_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Payload bytes waiting in the current buffer.
    pub fn buffered_bytes(&self) -> usize {
        self.size
    }

    /// Flushes dispatched whose results have not been collected yet.
    pub fn in_flight(&self) -> usize {
        self.active_flushes
    }

    /// Limits this batch was built with.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    fn check(&self) -> DagResult<()> {
        match &self.err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Collect finished flushes without waiting.
    fn process_results(&mut self) {
        while self.active_flushes > 0 {
            let Some(results) = self.results.as_mut() else {
                return;
            };
            match results.try_recv() {
                Ok(Ok(())) => self.active_flushes -= 1,
                Ok(Err(err)) => {
                    self.set_error(err);
                    return;
                }
                Err(_) => return,
            }
        }
    }

    /// Wait for the next flush result. `None` means the scope was cancelled.
    async fn next_result(&mut self) -> Option<FlushResult> {
        let results = self.results.as_mut()?;
        tokio::select! {
            // The batch holds a sender, so a closed queue means the results
            // were lost; never count that as success.
            result = results.recv() => Some(result.unwrap_or(Err(DagError::Cancelled))),
            _ = self.scope.cancelled() => None,
        }
    }

    async fn flush(&mut self) {
        let count = self.nodes.len();
        if count == 0 {
            return;
        }
        if self.scope.is_cancelled() {
            self.set_error(DagError::Cancelled);
            return;
        }

        if self.active_flushes >= self.config.max_parallel_flushes {
            match self.next_result().await {
                Some(Ok(())) => self.active_flushes -= 1,
                Some(Err(err)) => {
                    self.set_error(err);
                    return;
                }
                None => {
                    self.set_error(DagError::Cancelled);
                    return;
                }
            }
        }

        let Some(adder) = self.adder.clone() else {
            return;
        };
        let nodes = std::mem::replace(&mut self.nodes, Vec::with_capacity(count));
        let bytes = std::mem::take(&mut self.size);
        let results = self.results_tx.clone();
        let scope = self.scope.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                result = adder.add_many(&scope, nodes) => result,
                _ = scope.cancelled() => return,
            };
            // The queue holds one slot per in-flight flush, so this does not
            // wait unless the batch has been torn down.
            tokio::select! {
                _ = results.send(result) => {}
                _ = scope.cancelled() => {}
            }
        });

        self.active_flushes += 1;
        debug!(
            nodes = count,
            bytes,
            in_flight = self.active_flushes,
            "batch flush dispatched"
        );
    }

    fn set_error(&mut self, err: DagError) {
        warn!(error = %err, buffered = self.nodes.len(), "batch failed");
        self.scope.cancel();

        // Dropping the receiver discards queued results and makes any later
        // send fail immediately, so abandoned flush tasks never block.
        self.results = None;
        // Buffers can be large; release them now rather than with the batch.
        self.adder = None;
        self.nodes = Vec::new();
        self.size = 0;
        self.active_flushes = 0;
        self.err = Some(err);
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        // Abandoned batches stop writing. After a successful commit nothing
        // is in flight, so this only affects uncommitted work.
        self.scope.cancel();
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("buffered_nodes", &self.nodes.len())
            .field("buffered_bytes", &self.size)
            .field("in_flight", &self.active_flushes)
            .field("error", &self.err)
            .finish()
    }
}
