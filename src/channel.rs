//! ReclaimChannel: the queue through which expired key handles reach a map.
//!
//! Producers are the `Drop` paths of key owners and may run on any thread.
//! The single consumer is the owning map, which drains the queue on its own
//! call stack during a sweep. Nothing here ever blocks.

use crate::handle::WeakKeyHandle;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Unbounded multi-producer, single-consumer queue of expired handles.
pub struct ReclaimChannel<K> {
    id: u64,
    tx: Sender<WeakKeyHandle<K>>,
    rx: Receiver<WeakKeyHandle<K>>,
    // Notifiers hold a `Weak` to this; once the channel is gone they are
    // pruned from key watch lists instead of accumulating.
    open: Arc<()>,
}

impl<K> ReclaimChannel<K> {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            tx,
            rx,
            open: Arc::new(()),
        }
    }

    /// Process-unique identifier of this channel.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Take one delivered handle, if any. Never blocks.
    pub fn poll(&self) -> Option<WeakKeyHandle<K>> {
        self.rx.try_recv().ok()
    }

    /// Number of handles delivered but not yet polled.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub(crate) fn notifier(&self) -> Notifier<K> {
        Notifier {
            channel_id: self.id,
            tx: self.tx.clone(),
            open: Arc::downgrade(&self.open),
        }
    }
}

impl<K> Default for ReclaimChannel<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> core::fmt::Debug for ReclaimChannel<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReclaimChannel")
            .field("id", &self.id)
            .field("pending", &self.rx.len())
            .finish()
    }
}

/// Producer side of a `ReclaimChannel`, held by a key's watch list.
pub(crate) struct Notifier<K> {
    channel_id: u64,
    tx: Sender<WeakKeyHandle<K>>,
    open: Weak<()>,
}

impl<K> Notifier<K> {
    pub(crate) fn channel_id(&self) -> u64 {
        self.channel_id
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.open.strong_count() == 0
    }

    /// Deliver `handle`. A closed channel drops the notification.
    pub(crate) fn notify(&self, handle: WeakKeyHandle<K>) {
        if self.tx.send(handle).is_err() {
            log::trace!(
                "reclaim channel {} closed; dropping expiry notification",
                self.channel_id
            );
        }
    }
}
