//! SlotTable: the backing hash table, with stable slot ids and a structural
//! modification counter.
//!
//! Entries live in a generational `SlotMap`; a hashbrown `HashTable` indexes
//! them by a hash computed once by the caller and stored alongside the
//! entry, so the table never hashes anything itself. Probes take an
//! equality closure, which lets the map compare weak handles against
//! borrowed lookup keys. Removal by slot id bypasses equality entirely.

use crate::config::{MapConfig, MAX_CAPACITY};
use crate::reentrancy::DebugReentrancy;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};

/// Stable identity of one stored entry. Never aliases a later entry, even
/// when the physical slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SlotId(DefaultKey);

#[derive(Debug)]
struct Slot<H, V> {
    key: H,
    value: V,
    hash: u64,
}

pub(crate) struct SlotTable<H, V> {
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Slot<H, V>>,
    config: MapConfig,
    // Logical bucket count; doubles whenever the load factor is exceeded.
    buckets: usize,
    mod_count: u64,
    reentrancy: DebugReentrancy,
}

impl<H, V> SlotTable<H, V> {
    /// Expects an already validated configuration.
    pub(crate) fn with_config(config: MapConfig) -> Self {
        let buckets = config.initial_capacity.max(1);
        let reserve = config.threshold(buckets).min(config.initial_capacity);
        Self {
            index: HashTable::with_capacity(reserve),
            slots: SlotMap::with_capacity(reserve),
            config,
            buckets,
            mod_count: 0,
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub(crate) fn config(&self) -> &MapConfig {
        &self.config
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Logical bucket count, as driven by the configured load factor.
    /// Never exceeds `MAX_CAPACITY`.
    pub(crate) fn capacity(&self) -> usize {
        self.buckets
    }

    /// Entries the table holds before it grows again. Unbounded once the
    /// bucket count has reached `MAX_CAPACITY`.
    pub(crate) fn load_limit(&self) -> usize {
        if self.buckets >= MAX_CAPACITY {
            usize::MAX
        } else {
            self.config.threshold(self.buckets)
        }
    }

    /// Incremented by every insert of a new entry, every removal, and every
    /// clear that removed something. Value replacement does not count.
    pub(crate) fn mod_count(&self) -> u64 {
        self.mod_count
    }

    pub(crate) fn find<F>(&self, hash: u64, mut eq: F) -> Option<SlotId>
    where
        F: FnMut(&H) -> bool,
    {
        self.index
            .find(hash, |&k| self.slots.get(k).map(|e| eq(&e.key)).unwrap_or(false))
            .map(|&k| SlotId(k))
    }

    pub(crate) fn get(&self, id: SlotId) -> Option<(&H, &V)> {
        self.slots.get(id.0).map(|e| (&e.key, &e.value))
    }

    pub(crate) fn value(&self, id: SlotId) -> Option<&V> {
        self.slots.get(id.0).map(|e| &e.value)
    }

    pub(crate) fn value_mut(&mut self, id: SlotId) -> Option<&mut V> {
        self.slots.get_mut(id.0).map(|e| &mut e.value)
    }

    /// Insert an entry the caller has already probed for and found absent.
    pub(crate) fn insert_new(&mut self, hash: u64, key: H, value: V) -> SlotId {
        self.grow_for(self.slots.len() + 1);
        let _g = self.reentrancy.enter();
        let k = self.slots.insert(Slot { key, value, hash });
        let slots = &self.slots;
        let _ = self
            .index
            .insert_unique(hash, k, |&kk| slots.get(kk).map(|e| e.hash).unwrap_or(0));
        self.mod_count = self.mod_count.wrapping_add(1);
        SlotId(k)
    }

    /// Replace the value of an existing entry, keeping its key.
    pub(crate) fn replace(&mut self, id: SlotId, value: V) -> Option<V> {
        let _g = self.reentrancy.enter();
        self.slots
            .get_mut(id.0)
            .map(|e| core::mem::replace(&mut e.value, value))
    }

    pub(crate) fn remove(&mut self, id: SlotId) -> Option<(H, V)> {
        let _g = self.reentrancy.enter();
        let k = id.0;

        let entry = self.slots.remove(k)?;

        // Unlink by identity; the stored hash locates the bucket.
        if let Ok(found) = self.index.find_entry(entry.hash, |&kk| kk == k) {
            let _ = found.remove();
        }
        self.mod_count = self.mod_count.wrapping_add(1);

        Some((entry.key, entry.value))
    }

    /// Remove the first entry in `hash`'s bucket chain satisfying `pred`.
    pub(crate) fn remove_where<F>(&mut self, hash: u64, pred: F) -> Option<(H, V)>
    where
        F: FnMut(&H) -> bool,
    {
        let id = self.find(hash, pred)?;
        self.remove(id)
    }

    /// Remove everything. Entries are dropped after the guard is released.
    ///
    /// The slot map is drained in place so slot versions survive and ids
    /// issued before the clear stay dead.
    pub(crate) fn clear(&mut self) -> usize {
        let old: Vec<_> = {
            let _g = self.reentrancy.enter();
            self.index.clear();
            self.slots.drain().collect()
        };
        let n = old.len();
        if n > 0 {
            self.mod_count = self.mod_count.wrapping_add(1);
        }
        drop(old);
        n
    }

    pub(crate) fn ids(&self) -> Vec<SlotId> {
        self.slots.keys().map(SlotId).collect()
    }

    pub(crate) fn iter(&self) -> Iter<'_, H, V> {
        Iter {
            it: self.slots.iter(),
        }
    }

    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, H, V> {
        IterMut {
            it: self.slots.iter_mut(),
        }
    }

    fn grow_for(&mut self, needed: usize) {
        if needed <= self.load_limit() {
            return;
        }
        while needed > self.load_limit() {
            self.buckets = self.buckets.saturating_mul(2).min(MAX_CAPACITY);
        }
        let target = self
            .load_limit()
            .min(needed.saturating_mul(2))
            .max(needed);
        let slots = &self.slots;
        self.index.reserve(target.saturating_sub(self.index.len()), |&kk| {
            slots.get(kk).map(|e| e.hash).unwrap_or(0)
        });
    }
}

/// Iterator over immutable entries in `SlotTable`.
pub(crate) struct Iter<'a, H, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Slot<H, V>>,
}

impl<'a, H, V> Iterator for Iter<'a, H, V> {
    type Item = (SlotId, &'a H, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(k, e)| (SlotId(k), &e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Iterator over mutable entries in `SlotTable`.
pub(crate) struct IterMut<'a, H, V> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Slot<H, V>>,
}

impl<'a, H, V> Iterator for IterMut<'a, H, V> {
    type Item = (SlotId, &'a H, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, e)| (SlotId(k), &e.key, &mut e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}
