//! The open-file table: volatile per-file handle state.
//!
//! None of this survives a remount — only the bitmap and pointer
//! table do. A handle is identified by the file id it refers to, so
//! there is one slot per possible file, not a dynamically allocated
//! descriptor space.

use crate::layout::NULL_BLOCK;

/// A handle's current access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// No open access; the only state from which `open_*` may be called.
    Closed,
    /// Open for reading.
    Read,
    /// Open for writing or appending (append is just a write handle
    /// positioned at the prior end of file).
    Write,
}

/// Volatile state for one file's handle.
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    /// Current access mode.
    pub access: AccessMode,
    /// Byte offset from the start of the file; `position % BLOCK_SIZE`
    /// is the intra-block offset of the next byte read or written.
    pub position: usize,
    /// Block index under the cursor, or `NULL_BLOCK` if none.
    pub current_block: u8,
}

impl Handle {
    /// A freshly mounted, closed handle.
    pub fn closed() -> Self {
        Handle {
            access: AccessMode::Closed,
            position: 0,
            current_block: NULL_BLOCK,
        }
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::closed()
    }
}
