//! Single-assignment result cell for a node that is still being fetched.
//!
//! A [`NodePromise`] starts pending and settles exactly once, either with a
//! node ([`NodePromise::resolve`]) or with an error ([`NodePromise::fail`]).
//! The two are asymmetric:
//!
//! - `resolve` on a settled promise panics: two producers resolved the same
//!   slot. The fetch fan-out, which shares its promises with callers, uses
//!   a first-wins path instead.
//! - `fail` on a settled promise does nothing. The benign race is a fan-out
//!   delivering a node while the stream-closed path fails the stragglers;
//!   whichever settled first wins.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use mdag_types::{CancelScope, DagError, DagResult, NodeRef};

struct Shared {
    slot: Mutex<Option<DagResult<NodeRef>>>,
    settled: watch::Sender<bool>,
}

/// Handle to a pending node. Clones observe the same cell.
#[derive(Clone)]
pub struct NodePromise {
    shared: Arc<Shared>,
    scope: CancelScope,
}

impl NodePromise {
    /// A pending promise bound to `scope`: once the scope is cancelled,
    /// waiters stop waiting.
    pub fn new(scope: &CancelScope) -> Self {
        let (settled, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                settled,
            }),
            scope: scope.clone(),
        }
    }

    /// Settle with a node.
    ///
    /// # Panics
    ///
    /// Panics if the promise has already been settled.
    pub fn resolve(&self, node: NodeRef) {
        if !self.try_resolve(node) {
            panic!("resolving an already settled node promise");
        }
    }

    /// Settle with a node unless something settled the promise first.
    ///
    /// Used by the fetch fan-out, which shares its promises with callers
    /// that may already have failed some of them.
    pub(crate) fn try_resolve(&self, node: NodeRef) -> bool {
        self.settle(Ok(node))
    }

    /// Settle with an error, unless the promise is already settled.
    ///
    /// Returns `true` if this call settled the promise.
    pub fn fail(&self, error: DagError) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, result: DagResult<NodeRef>) -> bool {
        let mut slot = self.shared.slot.lock().expect("promise lock poisoned");
        if slot.is_some() {
            return false;
        }
        *slot = Some(result);
        drop(slot);
        self.shared.settled.send_replace(true);
        true
    }

    /// The settled result, or `None` while pending. Never waits.
    pub fn poll(&self) -> Option<DagResult<NodeRef>> {
        self.shared
            .slot
            .lock()
            .expect("promise lock poisoned")
            .clone()
    }

    pub fn is_settled(&self) -> bool {
        *self.shared.settled.borrow()
    }

    /// Wait for the promise to settle.
    ///
    /// Returns [`DagError::Cancelled`] if the promise's own scope or `cancel`
    /// fires first. A result that is already available is returned even if
    /// both scopes have been cancelled.
    pub async fn get(&self, cancel: &CancelScope) -> DagResult<NodeRef> {
        if let Some(result) = self.poll() {
            return result;
        }
        let mut settled = self.shared.settled.subscribe();
        let wait = async move {
            let _ = settled.wait_for(|done| *done).await;
        };
        tokio::select! {
            _ = wait => {}
            _ = self.scope.cancelled() => {}
            _ = cancel.cancelled() => {}
        }
        self.poll().unwrap_or(Err(DagError::Cancelled))
    }
}

impl std::fmt::Debug for NodePromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodePromise")
            .field("settled", &self.is_settled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mdag_types::{ContentId, Node, RawNode};

    use super::*;

    fn node(data: &[u8]) -> NodeRef {
        Arc::new(RawNode::new(data.to_vec()))
    }

    #[tokio::test]
    async fn resolve_then_get() {
        let scope = CancelScope::new();
        let promise = NodePromise::new(&scope);
        assert!(promise.poll().is_none());
        promise.resolve(node(b"a"));
        assert!(promise.is_settled());
        let got = promise.get(&CancelScope::new()).await.unwrap();
        assert_eq!(got.raw_data(), b"a");
        // Cached: a second get sees the same value.
        let again = promise.get(&CancelScope::new()).await.unwrap();
        assert_eq!(again.id(), got.id());
    }

    #[tokio::test]
    async fn fail_after_resolve_keeps_value() {
        let promise = NodePromise::new(&CancelScope::new());
        let a = node(b"a");
        promise.resolve(a.clone());
        assert!(!promise.fail(DagError::Read("late".into())));
        let got = promise.get(&CancelScope::new()).await.unwrap();
        assert_eq!(got.id(), a.id());
    }

    #[tokio::test]
    async fn first_failure_wins() {
        let promise = NodePromise::new(&CancelScope::new());
        let id = ContentId::raw(b"x");
        assert!(promise.fail(DagError::NotFound(id)));
        assert!(!promise.fail(DagError::Cancelled));
        let err = promise.get(&CancelScope::new()).await.unwrap_err();
        assert_eq!(err, DagError::NotFound(id));
    }

    #[test]
    #[should_panic(expected = "already settled")]
    fn double_resolve_panics() {
        let promise = NodePromise::new(&CancelScope::new());
        promise.resolve(node(b"a"));
        promise.resolve(node(b"a"));
    }

    #[test]
    #[should_panic(expected = "already settled")]
    fn resolve_after_fail_panics() {
        let promise = NodePromise::new(&CancelScope::new());
        promise.fail(DagError::Cancelled);
        promise.resolve(node(b"a"));
    }

    #[test]
    fn try_resolve_yields_to_earlier_failure() {
        let promise = NodePromise::new(&CancelScope::new());
        assert!(promise.fail(DagError::Cancelled));
        assert!(!promise.try_resolve(node(b"a")));
        assert_eq!(promise.poll().unwrap().unwrap_err(), DagError::Cancelled);

        let fresh = NodePromise::new(&CancelScope::new());
        assert!(fresh.try_resolve(node(b"b")));
        assert!(!fresh.try_resolve(node(b"c")));
        assert_eq!(fresh.poll().unwrap().unwrap().raw_data(), b"b");
    }

    #[tokio::test]
    async fn waiter_wakes_on_resolve() {
        let promise = NodePromise::new(&CancelScope::new());
        let waiter = tokio::spawn({
            let promise = promise.clone();
            async move { promise.get(&CancelScope::new()).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        promise.resolve(node(b"late"));
        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.raw_data(), b"late");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_consumers_see_one_value() {
        let promise = NodePromise::new(&CancelScope::new());
        let waiters: Vec<_> = (0..16)
            .map(|_| {
                let promise = promise.clone();
                tokio::spawn(async move { promise.get(&CancelScope::new()).await })
            })
            .collect();
        let value = node(b"shared");
        promise.resolve(value.clone());
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().unwrap().id(), value.id());
        }
    }

    #[tokio::test]
    async fn caller_cancellation_interrupts_get() {
        let promise = NodePromise::new(&CancelScope::new());
        let caller = CancelScope::new();
        let waiter = tokio::spawn({
            let promise = promise.clone();
            let caller = caller.clone();
            async move { promise.get(&caller).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.cancel();
        let err = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("get should return promptly")
            .unwrap()
            .unwrap_err();
        assert!(err.is_cancelled());
        // The promise itself is untouched and can still be settled.
        assert!(!promise.is_settled());
        promise.resolve(node(b"after"));
    }

    #[tokio::test]
    async fn own_scope_cancellation_interrupts_get() {
        let scope = CancelScope::new();
        let promise = NodePromise::new(&scope);
        scope.cancel();
        let err = promise.get(&CancelScope::new()).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn settled_value_beats_cancellation() {
        let scope = CancelScope::new();
        let promise = NodePromise::new(&scope);
        promise.resolve(node(b"v"));
        scope.cancel();
        assert!(promise.get(&scope).await.is_ok());
    }
}
