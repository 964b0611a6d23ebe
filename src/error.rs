//! Error type shared by construction and cursor operations.
//!
//! Absence of a key is never an error; lookups return `Option`.

/// Errors surfaced by `ExpiringMap` and its `Cursor`.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Requested initial capacity exceeds `MAX_CAPACITY`.
    #[error("initial capacity {0} exceeds the maximum supported capacity")]
    InvalidCapacity(usize),

    /// Load factor is zero, negative, infinite or NaN.
    #[error("load factor must be finite and greater than zero, got {0}")]
    InvalidLoadFactor(f32),

    /// The map was structurally modified after the cursor was created,
    /// by something other than the cursor itself.
    #[error("map was structurally modified during iteration")]
    ConcurrentModification,

    /// A cursor was stepped against a map other than the one that created it.
    #[error("cursor used with a map other than the one that created it")]
    WrongMap,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
