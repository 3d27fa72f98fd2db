//! Hierarchical cancellation scopes.
//!
//! A [`CancelScope`] is cancelled either directly or because an ancestor was
//! cancelled. Cancellation only ever flows downwards: cancelling a child
//! leaves its parent untouched.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;

struct ScopeInner {
    tx: watch::Sender<bool>,
    children: Mutex<Vec<Weak<ScopeInner>>>,
}

impl ScopeInner {
    fn new(cancelled: bool) -> Self {
        let (tx, _) = watch::channel(cancelled);
        Self {
            tx,
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self) {
        // send_replace never fails, even with no receivers.
        if self.tx.send_replace(true) {
            return;
        }
        let children = std::mem::take(&mut *self.children.lock().expect("scope lock poisoned"));
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Cloneable handle to a cancellation scope.
///
/// Clones share the same scope; [`CancelScope::child`] creates a new scope
/// nested under this one.
#[derive(Clone)]
pub struct CancelScope {
    inner: Arc<ScopeInner>,
}

impl CancelScope {
    /// A fresh root scope.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner::new(false)),
        }
    }

    /// A scope that is cancelled whenever `self` is.
    pub fn child(&self) -> Self {
        let mut children = self.inner.children.lock().expect("scope lock poisoned");
        let child = Arc::new(ScopeInner::new(self.is_cancelled()));
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child));
        Self { inner: child }
    }

    /// Cancel this scope and every scope derived from it. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.tx.borrow()
    }

    /// Completes once the scope is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.tx.subscribe();
        // The sender lives as long as `self`, so wait_for only errors if the
        // scope is dropped mid-wait, which a borrowed `self` rules out.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelScope")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
