//! The holding-register block and its reserved address map.

use thiserror::Error;

use crate::codes::{JobStatus, OperationCode};

/// Reserved addresses within the register block.
///
/// Everything outside the reserved range is scratch space: the daemon never
/// touches it, and clients may read and write it freely.
pub mod map {
    /// Operation register: clients write an [`OperationCode`] here to
    /// request work.
    ///
    /// [`OperationCode`]: crate::OperationCode
    pub const OP: u16 = 1;

    /// Status register: the daemon publishes a [`JobStatus`] here.
    /// Read-only to clients by convention.
    ///
    /// [`JobStatus`]: crate::JobStatus
    pub const STATUS: u16 = 2;

    /// First cell of the result window: ASCII bytes, one per cell, zero
    /// terminated. Read-only to clients by convention.
    pub const RESULT: u16 = 3;

    /// Width of the result window in cells, terminator included.
    pub const RESULT_LEN: u16 = 32;

    /// Total number of cells in the block.
    pub const BLOCK_LEN: u16 = 125;
}

/// Errors surfaced by register block access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// The requested range falls outside the backing array.
    #[error("register range [{address}, {address}+{count}) exceeds block of {len} cells")]
    OutOfRange {
        /// First address of the rejected range.
        address: u16,
        /// Number of cells requested.
        count: u16,
        /// Size of the backing array.
        len: u16,
    },
}

/// Fixed-size array of 16-bit register cells with bounds-checked access.
///
/// The block performs no semantic validation and no locking; command
/// validation belongs to the gateway and the locking discipline to whoever
/// owns the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBlock {
    cells: Vec<u16>,
}

impl RegisterBlock {
    /// Builds a block of [`map::BLOCK_LEN`] cells seeded with the
    /// protocol-mandated initial values: `OP = Ready`, `STATUS = Complete`,
    /// result window zeroed.
    #[must_use]
    pub fn new() -> Self {
        let mut cells = vec![0_u16; usize::from(map::BLOCK_LEN)];
        if let Some(cell) = cells.get_mut(usize::from(map::OP)) {
            *cell = OperationCode::Ready.as_cell();
        }
        if let Some(cell) = cells.get_mut(usize::from(map::STATUS)) {
            *cell = JobStatus::Complete.as_cell();
        }
        Self { cells }
    }

    /// Number of cells in the block.
    #[must_use]
    pub fn len(&self) -> u16 {
        // The constructor caps the backing array at BLOCK_LEN, which fits.
        u16::try_from(self.cells.len()).unwrap_or(u16::MAX)
    }

    /// Whether the block holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Reads `count` cells starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::OutOfRange`] if the range exceeds the block.
    pub fn get(&self, address: u16, count: u16) -> Result<&[u16], RegisterError> {
        let start = usize::from(address);
        let end = start + usize::from(count);
        self.cells.get(start..end).ok_or(RegisterError::OutOfRange {
            address,
            count,
            len: self.len(),
        })
    }

    /// Overwrites cells starting at `address` with `values`.
    ///
    /// Succeeds unconditionally for any in-range write; there is no
    /// semantic validation at this layer.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::OutOfRange`] if the range exceeds the block.
    pub fn set(&mut self, address: u16, values: &[u16]) -> Result<(), RegisterError> {
        let start = usize::from(address);
        let end = start + values.len();
        let len = self.len();
        let target = self
            .cells
            .get_mut(start..end)
            .ok_or(RegisterError::OutOfRange {
                address,
                count: u16::try_from(values.len()).unwrap_or(u16::MAX),
                len,
            })?;
        target.copy_from_slice(values);
        Ok(())
    }
}

impl Default for RegisterBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes result text for the result window: one ASCII byte per cell,
/// zero terminated, truncated to fit [`map::RESULT_LEN`].
///
/// The returned vector always spans the full window so a publish overwrites
/// any previous payload.
#[must_use]
pub fn encode_result(text: &str) -> Vec<u16> {
    let mut cells: Vec<u16> = text
        .bytes()
        .take(usize::from(map::RESULT_LEN) - 1)
        .map(u16::from)
        .collect();
    cells.resize(usize::from(map::RESULT_LEN), 0);
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_block_carries_initial_values() {
        let block = RegisterBlock::new();
        assert_eq!(block.len(), map::BLOCK_LEN);
        assert_eq!(
            block.get(map::OP, 1),
            Ok(&[OperationCode::Ready.as_cell()][..])
        );
        assert_eq!(
            block.get(map::STATUS, 1),
            Ok(&[JobStatus::Complete.as_cell()][..])
        );
        let result = match block.get(map::RESULT, map::RESULT_LEN) {
            Ok(cells) => cells,
            Err(error) => panic!("result window should be readable: {error}"),
        };
        assert!(result.iter().all(|cell| *cell == 0));
    }

    #[test]
    fn get_rejects_out_of_range() {
        let block = RegisterBlock::new();
        let error = block.get(map::BLOCK_LEN - 1, 2);
        assert_eq!(
            error,
            Err(RegisterError::OutOfRange {
                address: map::BLOCK_LEN - 1,
                count: 2,
                len: map::BLOCK_LEN,
            })
        );
    }

    #[test]
    fn set_rejects_out_of_range() {
        let mut block = RegisterBlock::new();
        let error = block.set(map::BLOCK_LEN, &[1]);
        assert!(matches!(error, Err(RegisterError::OutOfRange { .. })));
    }

    #[test]
    fn set_overwrites_without_validation() {
        let mut block = RegisterBlock::new();
        match block.set(map::STATUS, &[0xBEEF]) {
            Ok(()) => {}
            Err(error) => panic!("in-range write should succeed: {error}"),
        }
        assert_eq!(block.get(map::STATUS, 1), Ok(&[0xBEEF][..]));
    }

    #[test]
    fn zero_count_read_yields_empty_slice() {
        let block = RegisterBlock::new();
        assert_eq!(block.get(0, 0), Ok(&[][..]));
    }

    #[test]
    fn encode_result_terminates_and_fills_window() {
        let cells = encode_result("OK");
        assert_eq!(cells.len(), usize::from(map::RESULT_LEN));
        assert_eq!(&cells[..3], &[u16::from(b'O'), u16::from(b'K'), 0]);
        assert!(cells[3..].iter().all(|cell| *cell == 0));
    }

    #[test]
    fn encode_result_truncates_long_text() {
        let text = "x".repeat(200);
        let cells = encode_result(&text);
        assert_eq!(cells.len(), usize::from(map::RESULT_LEN));
        assert_eq!(cells[usize::from(map::RESULT_LEN) - 1], 0);
        assert_eq!(cells[usize::from(map::RESULT_LEN) - 2], u16::from(b'x'));
    }
}
