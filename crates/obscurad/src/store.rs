//! Shared ownership of the register block.
//!
//! The daemon holds exactly one [`RegisterBlock`], shared between the
//! transport layer (reads), the command gateway (command decisions) and the
//! job runner (outcome publication) behind a single mutex. Multi-step
//! critical sections go through [`SharedRegisters::with_block`] so the
//! check-then-act sequences stay atomic with respect to every other
//! register access.

use std::sync::{Arc, Mutex, PoisonError};

use obscura_registers::{RegisterBlock, RegisterError};

/// Cloneable handle to the daemon's register block.
#[derive(Debug, Clone)]
pub struct SharedRegisters {
    inner: Arc<Mutex<RegisterBlock>>,
}

impl SharedRegisters {
    /// Wraps a block for shared access.
    #[must_use]
    pub fn new(block: RegisterBlock) -> Self {
        Self {
            inner: Arc::new(Mutex::new(block)),
        }
    }

    /// Copies `count` cells starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::OutOfRange`] if the range exceeds the block.
    pub fn read(&self, address: u16, count: u16) -> Result<Vec<u16>, RegisterError> {
        self.with_block(|block| block.get(address, count).map(<[u16]>::to_vec))
    }

    /// Overwrites cells starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::OutOfRange`] if the range exceeds the block.
    pub fn write(&self, address: u16, values: &[u16]) -> Result<(), RegisterError> {
        self.with_block(|block| block.set(address, values))
    }

    /// Runs `operation` with the block locked.
    ///
    /// A poisoned lock recovers the inner block: every critical section
    /// leaves the cells fully written, so there is no partially-applied
    /// state to observe.
    pub fn with_block<T>(&self, operation: impl FnOnce(&mut RegisterBlock) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        operation(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use obscura_registers::map;

    use super::*;

    #[test]
    fn read_and_write_round_trip() {
        let store = SharedRegisters::new(RegisterBlock::new());
        store.write(40, &[7, 8, 9]).expect("in-range write");
        assert_eq!(store.read(40, 3).expect("in-range read"), vec![7, 8, 9]);
    }

    #[test]
    fn bounds_errors_pass_through() {
        let store = SharedRegisters::new(RegisterBlock::new());
        assert!(store.read(map::BLOCK_LEN, 1).is_err());
        assert!(store.write(map::BLOCK_LEN, &[1]).is_err());
    }

    #[test]
    fn with_block_applies_multiple_writes_atomically() {
        let store = SharedRegisters::new(RegisterBlock::new());
        let result: Result<(), obscura_registers::RegisterError> = store.with_block(|block| {
            block.set(map::RESULT, &[1, 2, 3])?;
            block.set(map::STATUS, &[1])
        });
        result.expect("reserved addresses are in range");
        assert_eq!(store.read(map::STATUS, 1).expect("read status"), vec![1]);
    }
}
