//! Live entry views over an `ExpiringMap`.
//!
//! Every iterator here filters expired entries as it goes and never removes
//! them; physical removal is left to the map's sweep or to
//! `Cursor::remove_current`. Keys are yielded as fresh `Owner`s so a key
//! cannot expire while the caller is looking at it. A `None` key is the
//! null key.

use crate::error::{Error, Result};
use crate::handle::WeakKeyHandle;
use crate::map::ExpiringMap;
use crate::owner::Owner;
use crate::table::{self, SlotId};

/// Iterator over live entries. Created by `ExpiringMap::iter`.
pub struct Iter<'a, K, V> {
    inner: table::Iter<'a, WeakKeyHandle<K>, V>,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(inner: table::Iter<'a, WeakKeyHandle<K>, V>) -> Self {
        Self { inner }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Option<Owner<K>>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for (_, handle, value) in self.inner.by_ref() {
            if let Some(key) = handle.live_key() {
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

/// Iterator over live entries with mutable values. Writes go straight to
/// the backing table.
pub struct IterMut<'a, K, V> {
    inner: table::IterMut<'a, WeakKeyHandle<K>, V>,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(inner: table::IterMut<'a, WeakKeyHandle<K>, V>) -> Self {
        Self { inner }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (Option<Owner<K>>, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        for (_, handle, value) in self.inner.by_ref() {
            if let Some(key) = handle.live_key() {
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

pub struct Keys<'a, K, V>(Iter<'a, K, V>);

impl<'a, K, V> Keys<'a, K, V> {
    pub(crate) fn new(inner: Iter<'a, K, V>) -> Self {
        Self(inner)
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = Option<Owner<K>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

pub struct Values<'a, K, V>(Iter<'a, K, V>);

impl<'a, K, V> Values<'a, K, V> {
    pub(crate) fn new(inner: Iter<'a, K, V>) -> Self {
        Self(inner)
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

pub struct ValuesMut<'a, K, V>(IterMut<'a, K, V>);

impl<'a, K, V> ValuesMut<'a, K, V> {
    pub(crate) fn new(inner: IterMut<'a, K, V>) -> Self {
        Self(inner)
    }
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

/// The live entry set of a map, as a view.
///
/// Nothing is cached: `len` walks the backing table on every call, so its
/// answer reflects expiries that happened since the view was created.
pub struct Entries<'a, K, V, S> {
    map: &'a ExpiringMap<K, V, S>,
}

impl<'a, K, V, S> Entries<'a, K, V, S> {
    pub(crate) fn new(map: &'a ExpiringMap<K, V, S>) -> Self {
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn iter(&self) -> Iter<'a, K, V> {
        Iter::new(self.map.table.iter())
    }
}

impl<'a, K, V, S> IntoIterator for Entries<'a, K, V, S> {
    type Item = (Option<Owner<K>>, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a ExpiringMap<K, V, S> {
    type Item = (Option<Owner<K>>, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut ExpiringMap<K, V, S> {
    type Item = (Option<Owner<K>>, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// Stepwise, fail-fast iteration that does not hold a borrow of the map.
///
/// The cursor records the map's entries and structural modification count
/// when it is created. Each step takes the map as an argument, so the caller
/// is free to mutate the map in between; if it does so structurally (insert
/// of a new key, removal, a sweep that removed something, a non-empty
/// clear) every later step fails with `Error::ConcurrentModification`.
/// Removing through `remove_current` is the one structural change the
/// cursor tolerates. Expired entries are skipped, never removed.
#[derive(Debug, Clone)]
pub struct Cursor {
    map_id: u64,
    ids: Vec<SlotId>,
    pos: usize,
    current: Option<SlotId>,
    expected_mod_count: u64,
}

impl Cursor {
    pub(crate) fn new(map_id: u64, ids: Vec<SlotId>, expected_mod_count: u64) -> Self {
        Self {
            map_id,
            ids,
            pos: 0,
            current: None,
            expected_mod_count,
        }
    }

    fn check<K, V, S>(&self, map: &ExpiringMap<K, V, S>) -> Result<()> {
        if map.channel.id() != self.map_id {
            return Err(Error::WrongMap);
        }
        if map.table.mod_count() != self.expected_mod_count {
            log::debug!(
                "expiring map {}: structural modification during cursor iteration",
                self.map_id
            );
            return Err(Error::ConcurrentModification);
        }
        Ok(())
    }

    /// Advance to the next live entry. `Ok(None)` once exhausted.
    pub fn next_entry<'m, K, V, S>(
        &mut self,
        map: &'m ExpiringMap<K, V, S>,
    ) -> Result<Option<(Option<Owner<K>>, &'m V)>> {
        self.check(map)?;
        while let Some(&id) = self.ids.get(self.pos) {
            self.pos += 1;
            if let Some((handle, value)) = map.table.get(id) {
                if let Some(key) = handle.live_key() {
                    self.current = Some(id);
                    return Ok(Some((key, value)));
                }
            }
        }
        self.current = None;
        Ok(None)
    }

    /// Mutable access to the value last yielded by `next_entry`.
    pub fn value_mut<'m, K, V, S>(
        &self,
        map: &'m mut ExpiringMap<K, V, S>,
    ) -> Result<Option<&'m mut V>> {
        self.check(map)?;
        match self.current {
            Some(id) => Ok(map.table.value_mut(id)),
            None => Ok(None),
        }
    }

    /// Remove the entry last yielded by `next_entry`.
    ///
    /// Removal is by slot identity, so exactly that entry goes, never
    /// merely an equal one. Returns `Ok(None)` when there is no current
    /// entry (nothing yielded yet, or it was already removed).
    pub fn remove_current<K, V, S>(&mut self, map: &mut ExpiringMap<K, V, S>) -> Result<Option<V>> {
        self.check(map)?;
        let Some(id) = self.current.take() else {
            return Ok(None);
        };
        let removed = map.table.remove(id).map(|(_, v)| v);
        self.expected_mod_count = map.table.mod_count();
        Ok(removed)
    }

    /// Slots not yet visited, including ones that may turn out expired.
    pub fn remaining_upper_bound(&self) -> usize {
        self.ids.len() - self.pos
    }
}
