//! The chain engine: walking, extending, and terminating a file's
//! singly-linked block chain, and interpreting the dual-purpose
//! terminator byte.
//!
//! These are free functions over a [`Device`] rather than methods on
//! [`crate::fs::Filesystem`] — nothing here needs the bitmap, the
//! pointer table, or a handle, only the device and a starting block,
//! the same separation of concerns kept elsewhere between an
//! allocator and a free-running extent walker.

use crate::bitmap::AllocationBitmap;
use crate::device::Device;
use crate::layout::{Layout, BLOCK_SIZE, LEN_BIT, NULL_BLOCK};

/// Decoded meaning of a terminator byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// The block is the tail of its chain and holds no data written
    /// yet in this session (a just-created or just-wiped block).
    OpenTail,
    /// A pointer to the next block in the chain.
    Next(u8),
    /// The tail block, holding exactly this many valid data bytes.
    Length(u8),
}

impl Terminator {
    fn decode(byte: u8) -> Self {
        if byte == NULL_BLOCK {
            Terminator::OpenTail
        } else if byte & LEN_BIT != 0 {
            Terminator::Length(byte & !LEN_BIT)
        } else {
            Terminator::Next(byte)
        }
    }

    fn encode(self) -> u8 {
        match self {
            Terminator::OpenTail => NULL_BLOCK,
            Terminator::Next(b) => b,
            Terminator::Length(l) => LEN_BIT | l,
        }
    }
}

/// Read the terminator byte of `block`.
pub fn get_next(device: &impl Device, layout: &Layout, block: u8) -> Terminator {
    Terminator::decode(device.read_byte(layout.terminator_offset(block)))
}

/// Write the terminator byte of `block`.
pub fn set_next(device: &mut impl Device, layout: &Layout, block: u8, value: Terminator) {
    device.write_byte(layout.terminator_offset(block), value.encode());
}

/// Free every block in `file`'s chain after its start block, leaving
/// the start block allocated with an open tail.
///
/// The start block stays allocated so that a subsequent re-open for
/// write is cheap and the file is left "existing but empty".
pub fn wipe(device: &mut impl Device, layout: &Layout, bitmap: &mut AllocationBitmap, start_block: u8) {
    let mut next = get_next(device, layout, start_block);
    while let Terminator::Next(block) = next {
        bitmap.set_in_use(device, layout, block, false);
        next = get_next(device, layout, block);
    }
    set_next(device, layout, start_block, Terminator::OpenTail);
}

/// The position and current block at which an append must resume:
/// the byte offset and block index just past the last written byte
/// of the file starting at `start_block`.
pub fn fast_forward(device: &impl Device, layout: &Layout, start_block: u8) -> (usize, u8) {
    let mut position = 0usize;
    let mut current_block = start_block;
    loop {
        match get_next(device, layout, current_block) {
            Terminator::Next(block) => {
                position += BLOCK_SIZE;
                current_block = block;
            }
            Terminator::Length(len) => {
                position += len as usize;
                break;
            }
            Terminator::OpenTail => break,
        }
    }
    (position, current_block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;

    fn setup(device_size: usize, max_files: usize) -> (MemoryDevice, Layout, AllocationBitmap) {
        let layout = Layout::new(device_size, max_files);
        let mut device = MemoryDevice::new(device_size);
        let bitmap = AllocationBitmap::format(&mut device, &layout);
        (device, layout, bitmap)
    }

    #[test]
    fn terminator_round_trips_all_three_kinds() {
        let (mut device, layout, _bitmap) = setup(2048, 61);
        set_next(&mut device, &layout, 0, Terminator::OpenTail);
        assert_eq!(get_next(&device, &layout, 0), Terminator::OpenTail);

        set_next(&mut device, &layout, 0, Terminator::Next(5));
        assert_eq!(get_next(&device, &layout, 0), Terminator::Next(5));

        set_next(&mut device, &layout, 0, Terminator::Length(17));
        assert_eq!(get_next(&device, &layout, 0), Terminator::Length(17));
    }

    #[test]
    fn wipe_frees_every_block_but_the_start() {
        let (mut device, layout, mut bitmap) = setup(2048, 61);
        bitmap.set_in_use(&mut device, &layout, 0, true);
        bitmap.set_in_use(&mut device, &layout, 1, true);
        bitmap.set_in_use(&mut device, &layout, 2, true);
        set_next(&mut device, &layout, 0, Terminator::Next(1));
        set_next(&mut device, &layout, 1, Terminator::Next(2));
        set_next(&mut device, &layout, 2, Terminator::Length(10));

        wipe(&mut device, &layout, &mut bitmap, 0);

        assert!(bitmap.is_in_use(0));
        assert!(!bitmap.is_in_use(1));
        assert!(!bitmap.is_in_use(2));
        assert_eq!(get_next(&device, &layout, 0), Terminator::OpenTail);
    }

    #[test]
    fn fast_forward_single_block_length() {
        let (mut device, layout, _bitmap) = setup(2048, 61);
        set_next(&mut device, &layout, 0, Terminator::Length(9));
        assert_eq!(fast_forward(&device, &layout, 0), (9, 0));
    }

    #[test]
    fn fast_forward_multi_block_chain() {
        let (mut device, layout, _bitmap) = setup(2048, 61);
        set_next(&mut device, &layout, 0, Terminator::Next(1));
        set_next(&mut device, &layout, 1, Terminator::Length(9));
        // one hop of BLOCK_SIZE, then 9 more bytes in block 1
        assert_eq!(fast_forward(&device, &layout, 0), (BLOCK_SIZE + 9, 1));
    }

    #[test]
    fn fast_forward_open_tail_stops_at_start() {
        let (mut device, layout, _bitmap) = setup(2048, 61);
        set_next(&mut device, &layout, 0, Terminator::OpenTail);
        assert_eq!(fast_forward(&device, &layout, 0), (0, 0));
    }
}
