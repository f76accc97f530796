//! On-device region geometry.
//!
//! A device is split into four contiguous regions: a one-byte
//! configure byte, the allocation bitmap, the file pointer table, and
//! the data area. [`Layout`] derives the size and offset of each from
//! the device's total size and the number of files it is configured
//! to hold, once, at mount/format time.

/// Size in bytes of a single block, including its terminator byte.
pub const BLOCK_SIZE: usize = 32;
/// Data bytes available per block (the block minus its terminator).
pub const DATA_BYTES_PER_BLOCK: usize = BLOCK_SIZE - 1;
/// Sentinel marking "no block"/"no file" in the pointer table and
/// chain terminators.
pub const NULL_BLOCK: u8 = 0xFF;
/// Bit 7 of a terminator byte, set when the byte encodes a stored
/// length rather than a next-block pointer.
pub const LEN_BIT: u8 = 0x80;
/// XOR mask applied to `BITMAP_BYTES` to produce the configure byte
/// that signals a formatted device.
const CONFIGURE_MAGIC: u8 = 0xA1;

/// Maximum number of files a device may be configured to hold.
/// `0xFF` is reserved as the pointer-table sentinel.
pub const MAX_FILES_LIMIT: usize = 254;

/// Derived on-device region geometry for one device size / file count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Total device size in bytes.
    pub device_size: usize,
    /// Number of files the pointer table can address.
    pub max_files: usize,
    /// Size in bytes of the allocation bitmap region.
    pub bitmap_bytes: usize,
    /// Number of blocks in the data area.
    pub num_blocks: usize,
    /// Byte offset of the allocation bitmap region (always `1`).
    pub bitmap_index: usize,
    /// Byte offset of the file pointer table region.
    pub file_ptr_index: usize,
    /// Byte offset of the data area (first byte of block 0).
    pub file_index: usize,
}

impl Layout {
    /// Byte offset of the configure byte. Always `0`.
    pub const CONFIGURE_INDEX: usize = 0;

    /// Derive the region geometry for a device of `device_size` bytes
    /// configured to hold up to `max_files` files.
    ///
    /// Resolves the circular relationship between `bitmap_bytes` and
    /// `num_blocks` (each depends on the other) with a bounded
    /// fixed-point iteration: the two converge within a handful of
    /// rounds because growing `bitmap_bytes` by one byte can shrink
    /// `num_blocks` by at most `8` blocks, and `bitmap_bytes` is a
    /// strictly increasing step function of `num_blocks`.
    ///
    /// # Panics
    ///
    /// Panics if `max_files` exceeds [`MAX_FILES_LIMIT`], or if the
    /// resulting `num_blocks` would be zero (the device is too small
    /// to hold even one data block alongside its metadata).
    pub fn new(device_size: usize, max_files: usize) -> Self {
        assert!(
            max_files <= MAX_FILES_LIMIT,
            "max_files must be <= {MAX_FILES_LIMIT} (0xFF is reserved as the sentinel)"
        );

        let mut bitmap_bytes = 0usize;
        let mut num_blocks;
        loop {
            let metadata_bytes = 1 + bitmap_bytes + max_files;
            let data_bytes_total = device_size.saturating_sub(metadata_bytes);
            num_blocks = data_bytes_total / BLOCK_SIZE;
            let next_bitmap_bytes = num_blocks.div_ceil(8);
            if next_bitmap_bytes == bitmap_bytes {
                break;
            }
            bitmap_bytes = next_bitmap_bytes;
        }
        assert!(
            num_blocks > 0,
            "device_size {device_size} is too small to hold any data blocks with max_files {max_files}"
        );

        let bitmap_index = Self::CONFIGURE_INDEX + 1;
        let file_ptr_index = bitmap_index + bitmap_bytes;
        let file_index = file_ptr_index + max_files;

        Layout {
            device_size,
            max_files,
            bitmap_bytes,
            num_blocks,
            bitmap_index,
            file_ptr_index,
            file_index,
        }
    }

    /// The configure byte value that signals a formatted device with
    /// this layout's bitmap size.
    pub fn configure_magic(&self) -> u8 {
        (self.bitmap_bytes as u8) ^ CONFIGURE_MAGIC
    }

    /// Byte offset of block `block`'s terminator byte.
    pub fn terminator_offset(&self, block: u8) -> usize {
        self.file_index + block as usize * BLOCK_SIZE + DATA_BYTES_PER_BLOCK
    }

    /// Byte offset of data byte `off` (0-indexed within the block) of
    /// `block`.
    pub fn data_offset(&self, block: u8, off: usize) -> usize {
        self.file_index + block as usize * BLOCK_SIZE + off
    }
}
