use crate::error::{Error, Result};

pub const INIT_ARR_SIZE: usize = 1000;
pub const RESIZE_FACTOR: f64 = 1.5;

/// Multiplicative growth for the range and page sequences. Storage starts at
/// `initial_capacity` and is multiplied by `factor` until it fits; failing to
/// reserve is reported instead of aborting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthPolicy {
    pub initial_capacity: usize,
    pub factor: f64,
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        GrowthPolicy {
            initial_capacity: INIT_ARR_SIZE,
            factor: RESIZE_FACTOR,
        }
    }
}

impl GrowthPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(Error::InvalidConfig("initial capacity must be non-zero".into()));
        }
        if !(self.factor > 1.0) || !self.factor.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "growth factor must be a finite number above 1.0, got {}",
                self.factor
            )));
        }
        Ok(())
    }

    /// Smallest capacity on this policy's growth curve holding `needed` entries.
    pub fn capacity_for(&self, current: usize, needed: usize) -> Result<usize> {
        let mut capacity = current.max(self.initial_capacity);
        while capacity < needed {
            let grown = (capacity as f64 * self.factor).ceil();
            if grown >= usize::MAX as f64 {
                return Err(Error::CapacityOverflow);
            }
            // never stall on tiny capacities
            capacity = (grown as usize).max(capacity + 1);
        }
        Ok(capacity)
    }

    /// Makes room for `additional` more entries in `vec`.
    pub fn reserve<T>(&self, vec: &mut Vec<T>, additional: usize) -> Result<()> {
        let needed = vec
            .len()
            .checked_add(additional)
            .ok_or(Error::CapacityOverflow)?;
        if needed <= vec.capacity() {
            return Ok(());
        }
        let target = self.capacity_for(vec.capacity(), needed)?;
        vec.try_reserve_exact(target - vec.len())
            .map_err(|source| Error::Allocation {
                requested: target,
                source,
            })?;
        trace!("Grew storage to {} entries", vec.capacity());
        Ok(())
    }

    pub fn push<T>(&self, vec: &mut Vec<T>, value: T) -> Result<()> {
        self.reserve(vec, 1)?;
        vec.push(value);
        Ok(())
    }
}
