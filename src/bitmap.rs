//! The allocation bitmap: an in-memory mirror of the device's
//! free-block bitmap, kept write-through on every mutation.
//!
//! One bit per data block; bit value `1` means free, `0` means in use.
//! Allocation is strictly first-fit on increasing block index —
//! deterministic, and simple to reason about for a store this small.

use crate::device::Device;
use crate::layout::{Layout, NULL_BLOCK};

/// In-memory mirror of the device's allocation bitmap.
pub struct AllocationBitmap {
    bits: Vec<u8>,
}

impl AllocationBitmap {
    /// Load the bitmap mirror from an already-formatted device.
    pub fn load(device: &impl Device, layout: &Layout) -> Self {
        let mut bits = vec![0u8; layout.bitmap_bytes];
        device.read_block(layout.bitmap_index, &mut bits);
        AllocationBitmap { bits }
    }

    /// Initialize an all-free bitmap and write it through to `device`.
    pub fn format(device: &mut impl Device, layout: &Layout) -> Self {
        let bits = vec![0xFFu8; layout.bitmap_bytes];
        device.write_block(layout.bitmap_index, &bits);
        AllocationBitmap { bits }
    }

    /// Whether block `b` is currently allocated.
    pub fn is_in_use(&self, b: u8) -> bool {
        let index = (b >> 3) as usize;
        let bit = b & 7;
        self.bits[index] & (1 << bit) == 0
    }

    /// Mark block `b` used or free, flushing the single affected
    /// bitmap byte to `device`.
    pub fn set_in_use(&mut self, device: &mut impl Device, layout: &Layout, b: u8, used: bool) {
        let index = (b >> 3) as usize;
        let bit = b & 7;
        if used {
            self.bits[index] &= !(1 << bit);
        } else {
            self.bits[index] |= 1 << bit;
        }
        device.write_byte(layout.bitmap_index + index, self.bits[index]);
    }

    /// The lowest-indexed free block, or `NULL_BLOCK` if none.
    pub fn find_free(&self, layout: &Layout) -> u8 {
        for block in 0..layout.num_blocks {
            if !self.is_in_use(block as u8) {
                return block as u8;
            }
        }
        NULL_BLOCK
    }
}
