//! Instrumented stores shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use mdag_store::{MemoryDag, NodeAdder, NodeGetter, NodeOption};
use mdag_types::{CancelScope, ContentId, DagError, DagResult, NodeRef};

/// Node adder that records every `add_many` call and can be told to fail,
/// slow down, or hang.
pub(crate) struct RecordingStore {
    dag: MemoryDag,
    calls: Mutex<Vec<Vec<ContentId>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_on: Option<usize>,
    delay: Duration,
    hang: bool,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            dag: MemoryDag::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_on: None,
            delay: Duration::ZERO,
            hang: false,
        }
    }

    /// Fail the `call`-th `add_many` (1-based).
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Never finish a write until its scope is cancelled.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn calls(&self) -> Vec<Vec<ContentId>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn dag(&self) -> &MemoryDag {
        &self.dag
    }

    pub fn injected_error(call: usize) -> DagError {
        DagError::Write(format!("injected failure on call {call}"))
    }
}

#[async_trait]
impl NodeAdder for RecordingStore {
    async fn add(&self, scope: &CancelScope, node: NodeRef) -> DagResult<()> {
        self.add_many(scope, vec![node]).await
    }

    async fn add_many(&self, scope: &CancelScope, nodes: Vec<NodeRef>) -> DagResult<()> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(nodes.iter().map(|n| n.id()).collect());
            calls.len()
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if self.hang {
            scope.cancelled().await;
            return Err(DagError::Cancelled);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_on == Some(call) {
            return Err(Self::injected_error(call));
        }
        self.dag.add_many(scope, nodes).await
    }
}

/// Node getter that answers every `get_many` with a fixed script.
pub(crate) struct ScriptedGetter {
    script: Vec<NodeOption>,
    hold_open: bool,
    calls: Mutex<Vec<Vec<ContentId>>>,
    request_scopes: Mutex<Vec<CancelScope>>,
}

impl ScriptedGetter {
    pub fn new(script: Vec<NodeOption>) -> Self {
        Self {
            script,
            hold_open: false,
            calls: Mutex::new(Vec::new()),
            request_scopes: Mutex::new(Vec::new()),
        }
    }

    /// Keep the stream open after the script runs out, until the request
    /// scope is cancelled.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn calls(&self) -> Vec<Vec<ContentId>> {
        self.calls.lock().unwrap().clone()
    }

    /// Completes once every request scope handed to `get_many` is cancelled.
    pub async fn wait_released(&self) {
        let scopes = self.request_scopes.lock().unwrap().clone();
        for scope in scopes {
            scope.cancelled().await;
        }
    }
}

#[async_trait]
impl NodeGetter for ScriptedGetter {
    async fn get(&self, _scope: &CancelScope, id: &ContentId) -> DagResult<NodeRef> {
        Err(DagError::NotFound(*id))
    }

    fn get_many(&self, scope: &CancelScope, ids: Vec<ContentId>) -> mpsc::Receiver<NodeOption> {
        self.calls.lock().unwrap().push(ids);
        self.request_scopes.lock().unwrap().push(scope.clone());

        let (tx, rx) = mpsc::channel(1);
        let script = self.script.clone();
        let hold_open = self.hold_open;
        let scope = scope.clone();
        tokio::spawn(async move {
            for option in script {
                if tx.send(option).await.is_err() {
                    return;
                }
            }
            if hold_open {
                scope.cancelled().await;
            }
            drop(tx);
        });
        rx
    }
}
