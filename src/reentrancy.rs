//! Debug-only reentrancy guard for the backing table's mutating sections.
//!
//! While the table is being mutated it may call user code (`K: Eq` during a
//! probe, or the `Drop` of a key whose last owner was a probe-time upgrade).
//! Entering another mutating section from there would observe the table
//! half-updated, so in debug builds it panics. Release builds compile the
//! guard away.
//!
//! The depth counter is atomic so the table stays `Sync`; read paths do not
//! take the guard, which lets externally synchronised readers run in
//! parallel.

#[cfg(debug_assertions)]
use core::sync::atomic::{AtomicU32, Ordering};
use core::marker::PhantomData;

/// Per-table reentrancy tracker. Mutating entry points start with
/// `let _g = self.reentrancy.enter();`.
#[derive(Debug, Default)]
pub struct DebugReentrancy {
    #[cfg(debug_assertions)]
    depth: AtomicU32,
}

impl DebugReentrancy {
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            depth: AtomicU32::new(0),
        }
    }

    /// Enter a mutating section. In debug builds, panics if one is already open.
    #[inline]
    pub fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let prev = self.depth.fetch_add(1, Ordering::Acquire);
            if prev != 0 {
                self.depth.fetch_sub(1, Ordering::Release);
                panic!("reentrancy detected: nested mutation of backing table");
            }
            return ReentrancyGuard {
                owner: self,
                _lt: PhantomData,
            };
        }

        #[cfg(not(debug_assertions))]
        {
            return ReentrancyGuard { _lt: PhantomData };
        }
    }

    /// Whether a mutating section is currently open (always false in release).
    #[cfg(test)]
    pub(crate) fn is_entered(&self) -> bool {
        #[cfg(debug_assertions)]
        {
            return self.depth.load(Ordering::Acquire) != 0;
        }
        #[cfg(not(debug_assertions))]
        {
            return false;
        }
    }
}

/// RAII guard returned by `DebugReentrancy::enter`.
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    _lt: PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let prev = self.owner.depth.fetch_sub(1, Ordering::Release);
            debug_assert!(prev > 0);
        }
    }
}
