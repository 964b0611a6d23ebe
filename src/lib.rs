//! expiring-map: a hash map whose keys are held weakly, so that an entry
//! is considered absent as soon as nothing else in the program owns its key.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: present a coherent map (size, lookup, iteration) over entries
//!   that can disappear at any moment, from any thread, outside any call
//!   into the map.
//! - Layers:
//!   - Owner<K>: the strong, caller-held reference to a key. The key lives
//!     in a shared cell with a watch list; dropping the last `Owner`
//!     delivers the key's handle to every watching channel.
//!   - ReclaimChannel<K>: unbounded MPSC queue (crossbeam) of expired
//!     handles. Produced into from `Owner` drops, consumed only by its map.
//!   - WeakKeyHandle<K>: `Weak` to the key cell plus a hash captured while
//!     the key was alive. Dead handles are equal to nothing.
//!   - SlotTable<H, V>: hashbrown index over a slotmap of entries with
//!     stored hashes, stable slot ids and a structural modification count.
//!   - ExpiringMap<K, V, S>: public API; sweeps the channel before every
//!     mutating operation and filters dead entries on every read.
//!
//! Expiry protocol
//! - absent -> live (put) -> expired (last owner dropped; asynchronous)
//!   -> physically removed (next sweep). Expiry is one-way.
//! - A sweep drains the channel to empty without blocking and removes each
//!   delivered handle by identity (same key cell), never by equality.
//!   Every handle delivered before the sweep began is gone afterwards.
//! - Reads (`get`, `contains_key`, `len`, iteration) never sweep and never
//!   mutate the table. An expired-but-unswept entry is still physically
//!   present but invisible: its handle matches no lookup and iteration
//!   skips it.
//! - `len()` walks the table; there is no cached count, because it would
//!   be wrong as soon as one key expired.
//!
//! Constraints
//! - Not internally synchronised. Mutation takes `&mut self`; sharing a map
//!   across threads needs an external lock. Owners may be dropped on any
//!   thread; the channel is the only cross-thread path into the map.
//! - Keys must keep `Hash` consistent with `Eq`; violations are the
//!   caller's problem, as with any hash map.
//! - The null key is supported through the `*_null` methods and never
//!   expires. Values are arbitrary; use `Option<V>` to store "null" values.
//!
//! Iteration under mutation
//! - Borrowing iterators (`iter`, `iter_mut`, `entries`) cannot observe a
//!   structural change; the borrow checker rules it out.
//! - `Cursor` does not borrow the map. It snapshots the table's
//!   modification count and reports `Error::ConcurrentModification` on the
//!   next step after any outside structural change. `remove_current`
//!   removes the exact entry just yielded, by slot id.
//!
//! Reentrancy policy
//! - The backing table's mutating sections hold a debug-only guard: user
//!   code (`K: Eq`, and key drops triggered by probe-time upgrades) runs
//!   inside them. Removed keys and values are dropped after the guard is
//!   released.
//!
//! Logging
//! - `log` facade only: `debug!` on construction and on cursor fail-fast,
//!   `trace!` on sweeps that removed entries and on clears.

mod channel;
mod config;
mod error;
mod handle;
mod iter;
mod map;
mod owner;
mod reentrancy;
mod table;
mod table_proptest;

// Public surface
pub use channel::ReclaimChannel;
pub use config::{MapConfig, DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR, MAX_CAPACITY};
pub use error::{Error, Result};
pub use handle::{WeakKeyHandle, NULL_HASH};
pub use iter::{Cursor, Entries, Iter, IterMut, Keys, Values, ValuesMut};
pub use map::ExpiringMap;
pub use owner::Owner;
pub use reentrancy::DebugReentrancy;
