//! ExpiringMap: a hash map whose keys are held weakly.
//!
//! Every stored key is a `WeakKeyHandle` registered with the map's own
//! `ReclaimChannel`. When a key's last `Owner` is dropped its handle lands in
//! the channel; the next mutating call drains the channel and removes the
//! matching entries by identity. Reads never sweep. Between an expiry and
//! the next sweep the dead entry is still physically present, but it is
//! invisible: dead handles match no lookup and are skipped by iteration.

use crate::channel::ReclaimChannel;
use crate::config::MapConfig;
use crate::error::Result;
use crate::handle::{WeakKeyHandle, NULL_HASH};
use crate::iter::{Cursor, Entries, Iter, IterMut, Keys, Values, ValuesMut};
use crate::owner::Owner;
use crate::table::SlotTable;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

pub struct ExpiringMap<K, V, S = RandomState> {
    pub(crate) table: SlotTable<WeakKeyHandle<K>, V>,
    pub(crate) channel: ReclaimChannel<K>,
    hasher: S,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash,
{
    /// Empty map with the default configuration.
    pub fn new() -> Self {
        Self::build(MapConfig::default(), RandomState::new())
    }

    pub fn with_capacity(initial_capacity: usize) -> Result<Self> {
        Self::with_config(MapConfig {
            initial_capacity,
            ..MapConfig::default()
        })
    }

    pub fn with_capacity_and_load_factor(initial_capacity: usize, load_factor: f32) -> Result<Self> {
        Self::with_config(MapConfig::new(initial_capacity, load_factor))
    }

    pub fn with_config(config: MapConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K, V> Default for ExpiringMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ExpiringMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::build(MapConfig::default(), hasher)
    }

    /// Fails fast with `InvalidCapacity` / `InvalidLoadFactor`.
    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, hasher))
    }

    fn build(config: MapConfig, hasher: S) -> Self {
        let channel = ReclaimChannel::new();
        log::debug!(
            "expiring map {} created: initial_capacity={} load_factor={}",
            channel.id(),
            config.initial_capacity,
            config.load_factor
        );
        Self {
            table: SlotTable::with_config(config),
            channel,
            hasher,
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn config(&self) -> &MapConfig {
        self.table.config()
    }

    /// Logical bucket count of the backing table.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Remove every entry whose key expiry has been delivered to this map.
    ///
    /// Drains the channel to empty without blocking. Removal is by handle
    /// identity, so an entry re-inserted under a new, equal key is never hit
    /// by the old key's notification. Returns the number of entries removed.
    pub fn sweep(&mut self) -> usize {
        let mut removed = 0;
        while let Some(dead) = self.channel.poll() {
            // The removed value is dropped here; if it owned keys of this
            // map, their notifications are picked up by this same loop.
            if self
                .table
                .remove_where(dead.hash_code(), |stored| stored.same_referent(&dead))
                .is_some()
            {
                removed += 1;
            }
        }
        if removed > 0 {
            log::trace!(
                "expiring map {}: swept {} expired entries, {} remain",
                self.channel.id(),
                removed,
                self.table.len()
            );
        }
        removed
    }

    /// Associate `value` with `key`, returning the previous value.
    ///
    /// If an equal live key is already stored, only the value is replaced:
    /// the entry stays tied to the originally stored key and expires with it.
    pub fn put(&mut self, key: &Owner<K>, value: V) -> Option<V> {
        self.sweep();
        let hash = self.hasher.hash_one::<&K>(key);
        let probe: &K = key;
        match self.table.find(hash, |stored| stored.matches(probe)) {
            Some(id) => self.table.replace(id, value),
            None => {
                let handle = WeakKeyHandle::tracked(key, &self.hasher, &self.channel);
                self.table.insert_new(handle.hash_code(), handle, value);
                None
            }
        }
    }

    /// Associate `value` with the null key, which never expires.
    pub fn put_null(&mut self, value: V) -> Option<V> {
        self.sweep();
        match self.table.find(NULL_HASH, WeakKeyHandle::is_null) {
            Some(id) => self.table.replace(id, value),
            None => {
                self.table.insert_new(NULL_HASH, WeakKeyHandle::null(), value);
                None
            }
        }
    }

    /// Look up `key` without sweeping.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = self.table.find(self.hasher.hash_one(key), |h| h.matches(key))?;
        self.table.value(id)
    }

    /// Mutable lookup. A value update is not structural, so this does not
    /// sweep either.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = self.table.find(self.hasher.hash_one(key), |h| h.matches(key))?;
        self.table.value_mut(id)
    }

    pub fn get_null(&self) -> Option<&V> {
        let id = self.table.find(NULL_HASH, WeakKeyHandle::is_null)?;
        self.table.value(id)
    }

    pub fn get_null_mut(&mut self) -> Option<&mut V> {
        let id = self.table.find(NULL_HASH, WeakKeyHandle::is_null)?;
        self.table.value_mut(id)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table
            .find(self.hasher.hash_one(key), |h| h.matches(key))
            .is_some()
    }

    pub fn contains_null_key(&self) -> bool {
        self.table.find(NULL_HASH, WeakKeyHandle::is_null).is_some()
    }

    /// True if some live entry holds a value equal to `value`.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.sweep();
        let hash = self.hasher.hash_one(key);
        self.table
            .remove_where(hash, |h| h.matches(key))
            .map(|(_, v)| v)
    }

    pub fn remove_null(&mut self) -> Option<V> {
        self.sweep();
        self.table
            .remove_where(NULL_HASH, WeakKeyHandle::is_null)
            .map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.sweep();
        let n = self.table.clear();
        log::trace!("expiring map {}: cleared {} entries", self.channel.id(), n);
    }
}

impl<K, V, S> ExpiringMap<K, V, S> {
    /// Number of live entries. Walks the table: a cached count would be
    /// stale as soon as any key expired.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Entries physically present in the backing table, including expired
    /// ones not yet swept.
    pub fn raw_len(&self) -> usize {
        self.table.len()
    }

    /// Expiry notifications delivered but not yet swept.
    pub fn pending_expirations(&self) -> usize {
        self.channel.len()
    }

    /// Live `(key, &value)` pairs in unspecified order. A `None` key is the
    /// null key; expired entries are skipped, not removed.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.table.iter())
    }

    /// Like `iter`, with values writable in place.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(self.table.iter_mut())
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values::new(self.iter())
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut::new(self.iter_mut())
    }

    /// The live entry view.
    pub fn entries(&self) -> Entries<'_, K, V, S> {
        Entries::new(self)
    }

    /// A fail-fast cursor over the current entries that does not borrow the
    /// map; see `Cursor`.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.channel.id(), self.table.ids(), self.table.mod_count())
    }
}

impl<K, V, S> Clone for ExpiringMap<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Copies the live entries into a fresh map with its own channel. The
    /// copy is sized for at least twice the live count.
    fn clone(&self) -> Self {
        let live = self.len();
        let mut config = *self.config();
        config.initial_capacity = config.initial_capacity.max(live.saturating_mul(2));
        let mut out = Self::build(config, self.hasher.clone());
        for (k, v) in self.iter() {
            match k {
                Some(k) => out.put(&k, v.clone()),
                None => out.put_null(v.clone()),
            };
        }
        out
    }
}

impl<'a, K, V, S> Extend<(&'a Owner<K>, V)> for ExpiringMap<K, V, S>
where
    K: Eq + Hash + 'a,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (&'a Owner<K>, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.put(k, v);
        }
    }
}

impl<'a, K, V> FromIterator<(&'a Owner<K>, V)> for ExpiringMap<K, V>
where
    K: Eq + Hash + 'a,
{
    fn from_iter<I: IntoIterator<Item = (&'a Owner<K>, V)>>(iter: I) -> Self {
        let mut map = ExpiringMap::new();
        map.extend(iter);
        map
    }
}

impl<K, V, S> fmt::Debug for ExpiringMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn owners(names: &[&str]) -> Vec<Owner<String>> {
        names.iter().map(|n| Owner::new(n.to_string())).collect()
    }

    /// Invariant: an entry whose key is kept alive is visible right after
    /// insertion, by equal keys as well as by the inserting owner.
    #[test]
    fn put_then_get() {
        let mut m = ExpiringMap::new();
        let k = Owner::new("a".to_string());
        assert_eq!(m.put(&k, 1), None);
        assert_eq!(m.get("a"), Some(&1));
        assert_eq!(m.get(&*k), Some(&1));
        assert_eq!(m.put(&k, 2), Some(1));
        assert_eq!(m.get("a"), Some(&2));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: dropping the last owner hides the entry immediately and a
    /// later mutating call physically removes it.
    #[test]
    fn expiry_then_sweep() {
        let mut m = ExpiringMap::new();
        let ks = owners(&["a", "b"]);
        m.put(&ks[0], 1);
        m.put(&ks[1], 2);

        let mut ks = ks;
        let b = ks.pop().unwrap();
        drop(b);
        assert_eq!(m.get("b"), None);
        assert_eq!(m.len(), 1);
        assert_eq!(m.raw_len(), 2, "reads do not sweep");
        assert_eq!(m.pending_expirations(), 1);

        assert_eq!(m.sweep(), 1);
        assert_eq!(m.raw_len(), 1);
        assert_eq!(m.pending_expirations(), 0);
        assert_eq!(m.sweep(), 0, "second sweep is a no-op");
    }

    /// Invariant: replacing a value keeps the originally stored key, so the
    /// entry expires with that key even if the replacing owner lives on.
    #[test]
    fn replacement_keeps_original_key() {
        let mut m = ExpiringMap::new();
        let first = Owner::new(10u32);
        let second = Owner::new(10u32);
        m.put(&first, "one");
        assert_eq!(m.put(&second, "two"), Some("one"));
        assert_eq!(m.raw_len(), 1);

        drop(first);
        assert_eq!(m.get(&10), None);
        m.sweep();
        assert_eq!(m.raw_len(), 0);

        // Dropping the replacing owner later is harmless.
        drop(second);
        assert_eq!(m.sweep(), 0);
    }

    /// Invariant: an old key's notification never removes an entry that was
    /// re-inserted under a new, equal key.
    #[test]
    fn stale_notification_does_not_hit_new_entry() {
        let mut m = ExpiringMap::new();
        let old = Owner::new("k".to_string());
        m.put(&old, 1);
        assert_eq!(m.remove("k"), Some(1));

        let new = Owner::new("k".to_string());
        m.put(&new, 2);
        drop(old);
        assert_eq!(m.pending_expirations(), 1);
        assert_eq!(m.sweep(), 0);
        assert_eq!(m.get("k"), Some(&2));
    }

    #[test]
    fn null_key_round_trip() {
        let mut m: ExpiringMap<String, i32> = ExpiringMap::new();
        assert!(!m.contains_null_key());
        assert_eq!(m.put_null(7), None);
        assert_eq!(m.get_null(), Some(&7));
        *m.get_null_mut().unwrap() += 1;
        assert_eq!(m.put_null(9), Some(8));
        assert_eq!(m.len(), 1);
        assert!(m.contains_null_key());
        assert_eq!(m.get(""), None, "null is distinct from every real key");
        assert_eq!(m.remove_null(), Some(9));
        assert!(m.is_empty());
    }

    /// Invariant: a stored `None` value is present, unlike an absent key.
    #[test]
    fn none_value_is_distinct_from_absence() {
        let mut m: ExpiringMap<u8, Option<u8>> = ExpiringMap::new();
        let k = Owner::new(1u8);
        m.put(&k, None);
        assert_eq!(m.get(&1), Some(&None));
        assert!(m.contains_key(&1));
        assert_eq!(m.get(&2), None);
        assert!(!m.contains_key(&2));
    }

    #[test]
    fn clear_sweeps_and_empties() {
        let mut m = ExpiringMap::new();
        let ks = owners(&["a", "b", "c"]);
        for (i, k) in ks.iter().enumerate() {
            m.put(k, i);
        }
        m.put_null(99);
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.raw_len(), 0);
        drop(ks);
        // Notifications for keys cleared earlier are harmless.
        assert_eq!(m.sweep(), 0);
    }

    #[test]
    fn construction_validates_config() {
        assert!(ExpiringMap::<u8, u8>::with_capacity(0).is_ok());
        assert_eq!(
            ExpiringMap::<u8, u8>::with_capacity_and_load_factor(16, 0.0).err(),
            Some(Error::InvalidLoadFactor(0.0))
        );
        assert!(matches!(
            ExpiringMap::<u8, u8>::with_capacity(usize::MAX),
            Err(Error::InvalidCapacity(_))
        ));
        let m = ExpiringMap::<u8, u8>::with_capacity_and_load_factor(32, 0.5).unwrap();
        assert_eq!(m.capacity(), 32);
        assert_eq!(m.config().load_factor, 0.5);
    }

    #[test]
    fn contains_value_ignores_expired_entries() {
        let mut m = ExpiringMap::new();
        let a = Owner::new('a');
        let b = Owner::new('b');
        m.put(&a, 1);
        m.put(&b, 2);
        assert!(m.contains_value(&2));
        drop(b);
        assert!(!m.contains_value(&2));
        assert!(m.contains_value(&1));
    }

    #[test]
    fn clone_copies_live_entries_with_own_tracking() {
        let mut m = ExpiringMap::new();
        let a = Owner::new(1u32);
        let b = Owner::new(2u32);
        m.put(&a, "a");
        m.put(&b, "b");
        m.put_null("null");
        drop(b);

        let mut copy = m.clone();
        assert_eq!(copy.len(), 2);
        assert_eq!(copy.get(&1), Some(&"a"));
        assert_eq!(copy.get_null(), Some(&"null"));

        drop(a);
        assert_eq!(copy.sweep(), 1);
        assert_eq!(m.sweep(), 2);
        assert_eq!(copy.len(), 1);
    }

    #[test]
    fn extend_and_collect() {
        let ks = owners(&["x", "y"]);
        let m: ExpiringMap<String, usize> = ks.iter().zip(0..).collect();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("y"), Some(&1));
    }

    #[test]
    fn debug_lists_live_entries() {
        let mut m = ExpiringMap::new();
        let k = Owner::new("k");
        m.put(&k, 1);
        assert_eq!(format!("{:?}", m), "{Some(\"k\"): 1}");
    }
}
