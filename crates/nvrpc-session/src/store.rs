use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::config::MAX_REQUEST_ID_CEILING;
use crate::error::SessionError;
use crate::message::{Outcome, RequestId};

/// What a pending call is completed with: the remote outcome, or the reason
/// the session could not deliver one.
pub type Completion = Result<Outcome, SessionError>;

/// Invoked exactly once when its request completes.
pub type Callback = Box<dyn FnOnce(Completion) + Send + 'static>;

/// Returned by [`CorrelationStore::register`] after the store was drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("correlation store is closed")]
pub struct StoreClosed;

/// Pending-request bookkeeping: hands out ids and maps each outstanding id
/// to the callback that completes it.
///
/// Callbacks always run outside the internal lock.
pub struct CorrelationStore {
    next_id: AtomicU64,
    ceiling: u64,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    pending: HashMap<RequestId, Callback>,
    closed: bool,
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new(MAX_REQUEST_ID_CEILING)
    }
}

impl CorrelationStore {
    /// Ids wrap modulo `ceiling`, clamped to `1..=MAX_REQUEST_ID_CEILING`.
    pub fn new(ceiling: u64) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            ceiling: ceiling.clamp(1, MAX_REQUEST_ID_CEILING),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Callbacks never run under the lock, so a poisoned map is intact.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next id. Distinct for up to `ceiling` consecutive calls.
    pub fn issue_id(&self) -> RequestId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) % self.ceiling;
        // ceiling <= 2^32, so n fits.
        RequestId(n as u32)
    }

    /// Record the callback for `id`.
    ///
    /// # Panics
    ///
    /// If `id` is already pending. Ids come from [`issue_id`](Self::issue_id),
    /// so a collision means more than `ceiling` calls are outstanding.
    pub fn register(&self, id: RequestId, callback: Callback) -> Result<(), StoreClosed> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(StoreClosed);
        }
        match inner.pending.entry(id) {
            Entry::Occupied(_) => panic!("request id {id} is already pending"),
            Entry::Vacant(slot) => {
                slot.insert(callback);
            }
        }
        Ok(())
    }

    /// Complete the call waiting on `id`. Returns false, and does nothing
    /// else, when no call is waiting.
    pub fn resolve(&self, id: RequestId, outcome: Outcome) -> bool {
        let callback = self.lock().pending.remove(&id);
        match callback {
            Some(callback) => {
                callback(Ok(outcome));
                true
            }
            None => {
                debug!(%id, "response for unknown request id; ignoring");
                false
            }
        }
    }

    /// Drop the callback for `id` without invoking it.
    pub fn forget(&self, id: RequestId) -> bool {
        self.lock().pending.remove(&id).is_some()
    }

    /// Close the store and fail every pending call with `failure()`.
    ///
    /// Returns how many calls were failed. Later calls drain nothing and
    /// [`register`](Self::register) refuses new entries.
    pub fn drain_all(&self, failure: impl Fn() -> SessionError) -> usize {
        let pending = {
            let mut inner = self.lock();
            inner.closed = true;
            std::mem::take(&mut inner.pending)
        };
        let count = pending.len();
        for (_, callback) in pending {
            callback(Err(failure()));
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Outstanding ids in ascending order.
    pub fn pending_ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.lock().pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for CorrelationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("CorrelationStore")
            .field("ceiling", &self.ceiling)
            .field("pending", &inner.pending.len())
            .field("closed", &inner.closed)
            .finish()
    }
}
