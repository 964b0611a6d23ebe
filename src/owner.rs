//! Owner: the strong, caller-held side of a weakly mapped key.
//!
//! A key lives in a shared cell together with its watch list. Maps only ever
//! hold `Weak` references to the cell. When the last `Owner` clone is
//! dropped the cell's `Drop` runs (on whichever thread released it) and every
//! watching channel receives the key's handle exactly once. By then the
//! strong count is already zero, so the delivered handle resolves to nothing.

use crate::channel::{Notifier, ReclaimChannel};
use crate::handle::WeakKeyHandle;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub(crate) struct KeyCell<K> {
    key: K,
    watchers: Mutex<Vec<Watcher<K>>>,
}

struct Watcher<K> {
    notifier: Notifier<K>,
    handle: WeakKeyHandle<K>,
}

impl<K> KeyCell<K> {
    pub(crate) fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Drop for KeyCell<K> {
    fn drop(&mut self) {
        let watchers = core::mem::take(
            self.watchers
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for w in watchers {
            w.notifier.notify(w.handle);
        }
    }
}

/// Shared ownership of a key. Maps keep an entry only while at least one
/// `Owner` of its key is alive somewhere in the program.
///
/// `PartialEq`, `Hash` and `Debug` forward to `K`.
pub struct Owner<K> {
    cell: Arc<KeyCell<K>>,
}

impl<K> Owner<K> {
    pub fn new(key: K) -> Self {
        Self {
            cell: Arc::new(KeyCell {
                key,
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Number of live `Owner` clones (including `this`).
    pub fn owner_count(this: &Self) -> usize {
        Arc::strong_count(&this.cell)
    }

    /// True when both owners share the same key cell, not merely equal keys.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.cell, &b.cell)
    }

    pub(crate) fn from_cell(cell: Arc<KeyCell<K>>) -> Self {
        Self { cell }
    }

    pub(crate) fn downgrade(this: &Self) -> Weak<KeyCell<K>> {
        Arc::downgrade(&this.cell)
    }

    /// Register `handle` for delivery to `channel` when this key expires.
    ///
    /// Idempotent per channel: returns `false` if the key was already
    /// watched by `channel`. Entries for channels that no longer exist are
    /// pruned on the way.
    pub(crate) fn track(this: &Self, channel: &ReclaimChannel<K>, handle: &WeakKeyHandle<K>) -> bool {
        let mut watchers = this
            .cell
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        watchers.retain(|w| !w.notifier.is_closed());
        if watchers
            .iter()
            .any(|w| w.notifier.channel_id() == channel.id())
        {
            return false;
        }
        watchers.push(Watcher {
            notifier: channel.notifier(),
            handle: handle.clone(),
        });
        true
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(this: &Self) -> usize {
        this.cell
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<K> Clone for Owner<K> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<K> Deref for Owner<K> {
    type Target = K;
    fn deref(&self) -> &K {
        &self.cell.key
    }
}

impl<K> Borrow<K> for Owner<K> {
    fn borrow(&self) -> &K {
        &self.cell.key
    }
}

impl<K> AsRef<K> for Owner<K> {
    fn as_ref(&self) -> &K {
        &self.cell.key
    }
}

impl<K: PartialEq> PartialEq for Owner<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cell.key == other.cell.key
    }
}

impl<K: Eq> Eq for Owner<K> {}

impl<K: Hash> Hash for Owner<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.key.hash(state);
    }
}

impl<K: fmt::Debug> fmt::Debug for Owner<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cell.key.fmt(f)
    }
}

impl<K> From<K> for Owner<K> {
    fn from(key: K) -> Self {
        Owner::new(key)
    }
}
