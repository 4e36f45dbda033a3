//! Per-identity debouncing of expensive derived computations.
//!
//! Each layer identity has at most one pending task. Scheduling again aborts
//! the previous task and restarts the quiet period, so only the most recent
//! inputs are ever computed. A task that has already started computing when it
//! is superseded or cancelled still finishes, but its result is dropped: a
//! result is written only if the task is still the registered one for its
//! identity and the target node still exists.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::id::LayerId;
use crate::render::DerivedFuture;
use crate::stage::SceneHandle;

struct PendingTask {
    ticket: u64,
    handle: AbortHandle,
}

/// Debounced task table keyed by layer identity.
pub struct Debouncer {
    pending: Mutex<HashMap<LayerId, PendingTask>>,
    next_ticket: AtomicU64,
    /// Results written onto a node.
    applied: AtomicU64,
    /// Tasks aborted or discarded before writing.
    superseded: AtomicU64,
}

impl Debouncer {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
        }
    }

    /// Schedule `job` for `id` after `delay`, superseding any pending task.
    ///
    /// Returns `false` when no tokio runtime is available; the node then keeps
    /// its previous content.
    pub fn schedule(self: &Arc<Self>, id: LayerId, delay: Duration, scene: SceneHandle, job: DerivedFuture) -> bool {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(layer = %id, "no async runtime; derived content not recomputed");
                return false;
            }
        };

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        let this = Arc::clone(self);
        let key = id.clone();

        // Hold the table while spawning so the task cannot finish before it
        // is registered.
        let mut pending = self.pending.lock();
        let task = runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let outcome = job.await;
            this.finish(&key, ticket, outcome, &scene);
        });

        let previous = pending.insert(
            id.clone(),
            PendingTask {
                ticket,
                handle: task.abort_handle(),
            },
        );
        drop(pending);

        if let Some(previous) = previous {
            previous.handle.abort();
            self.superseded.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(layer = %id, ticket = previous.ticket, "derived computation superseded");
        }
        true
    }

    /// Cancel the pending task for `id`. Returns whether one existed.
    pub fn cancel(&self, id: &LayerId) -> bool {
        let removed = self.pending.lock().remove(id);
        match removed {
            Some(task) => {
                task.handle.abort();
                self.superseded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(layer = %id, "derived computation cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, id: &LayerId) -> bool {
        self.pending.lock().contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn applied_count(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn superseded_count(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }

    fn finish(
        &self,
        id: &LayerId,
        ticket: u64,
        outcome: common::EditorResult<crate::render::NodePatch>,
        scene: &SceneHandle,
    ) {
        {
            let mut pending = self.pending.lock();
            match pending.get(id) {
                Some(task) if task.ticket == ticket => {
                    pending.remove(id);
                }
                _ => {
                    tracing::debug!(layer = %id, ticket, "stale derived result dropped");
                    return;
                }
            }
        }

        match outcome {
            Ok(patch) => {
                let mut scene = scene.write();
                let tree = scene.tree_mut();
                match tree.find(id.as_str()) {
                    Some(node) => {
                        tree.update(node, patch);
                        self.applied.fetch_add(1, Ordering::Relaxed);
                    }
                    None => tracing::debug!(layer = %id, "derived result for unmounted layer dropped"),
                }
            }
            Err(err) => {
                tracing::warn!(layer = %id, error = %err, "derived computation failed; keeping previous content");
            }
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}
