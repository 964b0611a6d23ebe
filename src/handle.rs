//! WeakKeyHandle: the non-owning key stored in the backing table.

use crate::channel::ReclaimChannel;
use crate::owner::{KeyCell, Owner};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use std::sync::Weak;

/// Hash code of the null key sentinel.
pub const NULL_HASH: u64 = 0;

enum Repr<K> {
    Null,
    Key(Weak<KeyCell<K>>),
}

/// A weak reference to a key plus the key's hash, captured while the key
/// was still alive so the handle stays locatable after the key is gone.
///
/// Equality forwards to the keys only while both sides are live. A dead
/// handle is equal to nothing, itself included, which is why this type
/// implements `PartialEq` but not `Eq`. The null sentinel is equal to other
/// null sentinels and never dies.
pub struct WeakKeyHandle<K> {
    repr: Repr<K>,
    hash: u64,
}

impl<K> WeakKeyHandle<K> {
    /// Handle for the null key.
    pub fn null() -> Self {
        Self {
            repr: Repr::Null,
            hash: NULL_HASH,
        }
    }

    /// Untracked handle, used for lookups and by callers that manage their
    /// own expiry.
    pub fn new<S>(owner: &Owner<K>, hasher: &S) -> Self
    where
        K: Hash,
        S: BuildHasher,
    {
        Self {
            repr: Repr::Key(Owner::downgrade(owner)),
            hash: hasher.hash_one::<&K>(owner),
        }
    }

    /// Handle registered with `channel`: once `owner`'s key loses its last
    /// owner, a handle identical to this one is delivered to `channel`.
    pub fn tracked<S>(owner: &Owner<K>, hasher: &S, channel: &ReclaimChannel<K>) -> Self
    where
        K: Hash,
        S: BuildHasher,
    {
        let handle = Self::new(owner, hasher);
        Owner::track(owner, channel, &handle);
        handle
    }

    pub fn is_null(&self) -> bool {
        matches!(self.repr, Repr::Null)
    }

    /// False once the key has lost its last owner. Never becomes true again.
    pub fn is_live(&self) -> bool {
        match &self.repr {
            Repr::Null => true,
            Repr::Key(w) => w.strong_count() > 0,
        }
    }

    /// A fresh owner of the key, if it is still alive. The null sentinel
    /// resolves to `None` as well; use `is_null` to tell them apart.
    pub fn resolve(&self) -> Option<Owner<K>> {
        match &self.repr {
            Repr::Null => None,
            Repr::Key(w) => w.upgrade().map(Owner::from_cell),
        }
    }

    /// Outer `None`: dead. Inner `None`: the null key.
    pub(crate) fn live_key(&self) -> Option<Option<Owner<K>>> {
        match &self.repr {
            Repr::Null => Some(None),
            Repr::Key(w) => w.upgrade().map(|c| Some(Owner::from_cell(c))),
        }
    }

    /// Cached hash; stable for the handle's whole life.
    pub fn hash_code(&self) -> u64 {
        self.hash
    }

    /// Identity comparison: both handles were made from the same key cell
    /// (or are both null). Unlike `==` this holds for dead handles too.
    pub fn same_referent(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Null, Repr::Null) => true,
            (Repr::Key(a), Repr::Key(b)) => Weak::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Live and holding a key equal to `q`.
    pub(crate) fn matches<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        match &self.repr {
            Repr::Null => false,
            Repr::Key(w) => w.upgrade().is_some_and(|c| c.key().borrow() == q),
        }
    }
}

impl<K> Clone for WeakKeyHandle<K> {
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Null => Repr::Null,
            Repr::Key(w) => Repr::Key(w.clone()),
        };
        Self {
            repr,
            hash: self.hash,
        }
    }
}

impl<K: PartialEq> PartialEq for WeakKeyHandle<K> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Null, Repr::Null) => true,
            (Repr::Key(a), Repr::Key(b)) => match (a.upgrade(), b.upgrade()) {
                (Some(a), Some(b)) => a.key() == b.key(),
                _ => false,
            },
            _ => false,
        }
    }
}

impl<K> Hash for WeakKeyHandle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl<K: fmt::Debug> fmt::Debug for WeakKeyHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Null => f.write_str("WeakKeyHandle(null)"),
            Repr::Key(w) => match w.upgrade() {
                Some(c) => f.debug_tuple("WeakKeyHandle").field(c.key()).finish(),
                None => write!(f, "WeakKeyHandle(<expired> #{:016x})", self.hash),
            },
        }
    }
}
