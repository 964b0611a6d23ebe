//! Construction-time configuration, forwarded to the backing table.

use crate::error::{Error, Result};

/// Largest initial capacity accepted by `MapConfig::validate`.
pub const MAX_CAPACITY: usize = 1 << 30;

pub const DEFAULT_CAPACITY: usize = 16;
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Bucket capacity and load factor for an `ExpiringMap`.
///
/// The load factor is the fill ratio at which the backing table grows its
/// logical bucket count. Values above `1.0` are allowed and simply delay
/// growth.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapConfig {
    pub initial_capacity: usize,
    pub load_factor: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

impl MapConfig {
    pub fn new(initial_capacity: usize, load_factor: f32) -> Self {
        Self {
            initial_capacity,
            load_factor,
        }
    }

    /// Fail fast on a configuration the table cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity > MAX_CAPACITY {
            return Err(Error::InvalidCapacity(self.initial_capacity));
        }
        if !self.load_factor.is_finite() || self.load_factor <= 0.0 {
            return Err(Error::InvalidLoadFactor(self.load_factor));
        }
        Ok(())
    }

    /// Number of entries `buckets` can hold before the table grows.
    pub(crate) fn threshold(&self, buckets: usize) -> usize {
        let t = (buckets as f64 * self.load_factor as f64).floor();
        if t >= usize::MAX as f64 {
            usize::MAX
        } else {
            (t as usize).max(1)
        }
    }
}
