//! The file pointer table: an in-memory mirror of the device's
//! per-file start-block table, kept write-through on every mutation.

use crate::device::Device;
use crate::layout::{Layout, NULL_BLOCK};

/// In-memory mirror of the per-file start-block table.
pub struct FilePointerTable {
    starts: Vec<u8>,
}

impl FilePointerTable {
    /// Load the pointer-table mirror from an already-formatted device.
    pub fn load(device: &impl Device, layout: &Layout) -> Self {
        let mut starts = vec![0u8; layout.max_files];
        device.read_block(layout.file_ptr_index, &mut starts);
        FilePointerTable { starts }
    }

    /// Initialize an empty pointer table (every entry `NULL_BLOCK`)
    /// and write it through to `device`.
    pub fn format(device: &mut impl Device, layout: &Layout) -> Self {
        let starts = vec![NULL_BLOCK; layout.max_files];
        device.write_block(layout.file_ptr_index, &starts);
        FilePointerTable { starts }
    }

    /// Whether file `f` currently has a start block.
    pub fn exists(&self, f: u8) -> bool {
        self.starts[f as usize] != NULL_BLOCK
    }

    /// The start block of file `f`, or `NULL_BLOCK` if it doesn't exist.
    pub fn start(&self, f: u8) -> u8 {
        self.starts[f as usize]
    }

    /// Set the start block of file `f`, flushing the single affected
    /// byte to `device`.
    pub fn set_start(&mut self, device: &mut impl Device, layout: &Layout, f: u8, block: u8) {
        self.starts[f as usize] = block;
        device.write_byte(layout.file_ptr_index + f as usize, block);
    }
}
