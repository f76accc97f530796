//! The Stream API: open/close/read/write/delete built on top of the
//! allocation bitmap, file pointer table, chain engine, and open-file
//! table.
//!
//! [`Filesystem`] is the single owning value for a mounted volume: it
//! holds every mutable mirror and is threaded explicitly through every
//! operation via `&mut self`, the same shape as a `StorageEngine` that
//! owns its subordinate tables and exposes the public operations over
//! them, but without `Arc`/`Mutex` wrapping, since this store has
//! exactly one owner by construction, enforced by the borrow checker
//! rather than a lock.

use crate::bitmap::AllocationBitmap;
use crate::chain::{self, Terminator};
use crate::device::Device;
use crate::error::{FsError, FsResult};
use crate::handle::{AccessMode, Handle};
use crate::layout::{Layout, BLOCK_SIZE, DATA_BYTES_PER_BLOCK, NULL_BLOCK};
use crate::pointer_table::FilePointerTable;

/// A mounted filesystem over a device `D`.
///
/// Construct with [`Filesystem::mount`] (or the size-deriving
/// convenience [`Filesystem::mount_with_capacity`]); every other
/// operation is a method on the resulting value.
pub struct Filesystem<D: Device> {
    device: D,
    layout: Layout,
    bitmap: AllocationBitmap,
    pointer_table: FilePointerTable,
    handles: Vec<Handle>,
}

impl<D: Device> Filesystem<D> {
    /// Mount `device` under `layout`, formatting it first if its
    /// configure byte doesn't match an already-formatted device of
    /// this layout. Never touches the data area.
    pub fn mount(mut device: D, layout: Layout) -> Self {
        let configured = device.read_byte(Layout::CONFIGURE_INDEX);
        let (bitmap, pointer_table) = if configured == layout.configure_magic() {
            log::info!(
                "mounting microfs volume: {} blocks, {} files",
                layout.num_blocks,
                layout.max_files
            );
            (
                AllocationBitmap::load(&device, &layout),
                FilePointerTable::load(&device, &layout),
            )
        } else {
            log::info!(
                "formatting new microfs volume: {} blocks, {} files",
                layout.num_blocks,
                layout.max_files
            );
            Self::do_format(&mut device, &layout)
        };
        Filesystem {
            device,
            layout,
            bitmap,
            pointer_table,
            handles: vec![Handle::closed(); layout.max_files],
        }
    }

    /// Derive a [`Layout`] from `device`'s reported size and
    /// `max_files`, then mount as [`Filesystem::mount`] does.
    pub fn mount_with_capacity(device: D, max_files: usize) -> Self {
        let layout = Layout::new(device.size(), max_files);
        Self::mount(device, layout)
    }

    /// Force-format `device` under `layout`, discarding any existing
    /// content, and mount the freshly formatted result.
    pub fn format(mut device: D, layout: Layout) -> Self {
        log::info!(
            "force-formatting microfs volume: {} blocks, {} files",
            layout.num_blocks,
            layout.max_files
        );
        let (bitmap, pointer_table) = Self::do_format(&mut device, &layout);
        Filesystem {
            device,
            layout,
            bitmap,
            pointer_table,
            handles: vec![Handle::closed(); layout.max_files],
        }
    }

    fn do_format(device: &mut D, layout: &Layout) -> (AllocationBitmap, FilePointerTable) {
        device.write_byte(Layout::CONFIGURE_INDEX, layout.configure_magic());
        let bitmap = AllocationBitmap::format(device, layout);
        let pointer_table = FilePointerTable::format(device, layout);
        (bitmap, pointer_table)
    }

    /// This volume's region geometry.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Consume the filesystem and recover its underlying device, e.g.
    /// to remount it later or to inspect its raw bytes in a test.
    pub fn into_device(self) -> D {
        self.device
    }

    /// Whether file `file` currently has any data (its pointer-table
    /// entry is not the sentinel).
    pub fn exists(&self, file: u8) -> bool {
        if file as usize >= self.layout.max_files {
            return false;
        }
        self.pointer_table.exists(file)
    }

    /// The access mode of `file`'s handle. Useful for introspection in
    /// tests; not part of the minimal external interface.
    pub fn access_mode(&self, file: u8) -> Option<AccessMode> {
        self.handles.get(file as usize).map(|h| h.access)
    }

    fn check_handle_range(&self, handle: u8) -> FsResult<()> {
        if handle as usize >= self.layout.max_files {
            return Err(FsError::InvalidAccessHandle);
        }
        Ok(())
    }

    /// Allocate and register a start block for `file` if it doesn't
    /// already exist, returning its start block either way.
    fn ensure_file_exists(&mut self, file: u8) -> FsResult<u8> {
        if self.pointer_table.exists(file) {
            return Ok(self.pointer_table.start(file));
        }
        let block = self.bitmap.find_free(&self.layout);
        if block == NULL_BLOCK {
            log::error!("ensure_file_exists({file}): device out of space");
            return Err(FsError::OutOfSpace);
        }
        self.pointer_table.set_start(&mut self.device, &self.layout, file, block);
        self.bitmap.set_in_use(&mut self.device, &self.layout, block, true);
        chain::set_next(&mut self.device, &self.layout, block, Terminator::OpenTail);
        Ok(block)
    }

    /// Open `file` for reading. Requires the handle be `Closed` and
    /// the file to already exist.
    pub fn open_for_read(&mut self, file: u8) -> FsResult<u8> {
        self.check_handle_range(file)?;
        let h = file as usize;
        if self.handles[h].access != AccessMode::Closed {
            log::warn!("open_for_read({file}): already open");
            return Err(FsError::FileAlreadyOpen);
        }
        if !self.pointer_table.exists(file) {
            log::warn!("open_for_read({file}): does not exist");
            return Err(FsError::FileDoesNotExist);
        }
        self.handles[h] = Handle {
            access: AccessMode::Read,
            position: 0,
            current_block: self.pointer_table.start(file),
        };
        log::debug!("open_for_read({file}) ok");
        Ok(file)
    }

    /// Open `file` for writing, creating it if absent and discarding
    /// any prior content. Requires the handle be `Closed`.
    pub fn open_for_write(&mut self, file: u8) -> FsResult<u8> {
        self.check_handle_range(file)?;
        let h = file as usize;
        if self.handles[h].access != AccessMode::Closed {
            log::warn!("open_for_write({file}): already open");
            return Err(FsError::FileAlreadyOpen);
        }
        let start = self.ensure_file_exists(file)?;
        chain::wipe(&mut self.device, &self.layout, &mut self.bitmap, start);
        self.handles[h] = Handle {
            access: AccessMode::Write,
            position: 0,
            current_block: start,
        };
        log::debug!("open_for_write({file}) ok");
        Ok(file)
    }

    /// Open `file` for appending, creating it if absent. Requires the
    /// handle be `Closed`.
    pub fn open_for_append(&mut self, file: u8) -> FsResult<u8> {
        self.check_handle_range(file)?;
        let h = file as usize;
        if self.handles[h].access != AccessMode::Closed {
            log::warn!("open_for_append({file}): already open");
            return Err(FsError::FileAlreadyOpen);
        }
        let start = self.ensure_file_exists(file)?;
        let (position, current_block) = chain::fast_forward(&self.device, &self.layout, start);
        self.handles[h] = Handle {
            access: AccessMode::Write,
            position,
            current_block,
        };
        log::debug!("open_for_append({file}) ok at position {position}");
        Ok(file)
    }

    /// Read up to `buf.len()` bytes into `buf`, returning the number
    /// actually read. Fewer than `buf.len()` is returned only at end
    /// of file; it is not an error.
    pub fn read(&mut self, handle: u8, buf: &mut [u8]) -> FsResult<usize> {
        self.check_handle_range(handle)?;
        let h = handle as usize;
        if self.handles[h].access != AccessMode::Read {
            return Err(FsError::WrongFileIoType);
        }

        let requested = buf.len();
        let mut total = 0usize;
        while total < requested {
            let block = self.handles[h].current_block;
            let off = self.handles[h].position % BLOCK_SIZE;
            let remaining = requested - total;
            let next = chain::get_next(&self.device, &self.layout, block);
            let terminal = !matches!(next, Terminator::Next(_));
            let cap = match next {
                Terminator::Length(len) => len as usize,
                _ => DATA_BYTES_PER_BLOCK,
            };
            let avail_here = cap.saturating_sub(off);

            let mut partial = false;
            if avail_here > 0 {
                let take = if remaining > avail_here {
                    partial = true;
                    avail_here
                } else {
                    remaining
                };
                self.device.read_block(
                    self.layout.data_offset(block, off),
                    &mut buf[total..total + take],
                );
                total += take;
                self.handles[h].position += take;
            }

            if terminal {
                return Ok(total);
            }
            if partial || avail_here == 0 {
                // the block's data region from `off` onward is
                // exhausted (whether or not this iteration read
                // anything) but the chain continues: advance past the
                // terminator byte onto the next block.
                if let Terminator::Next(next_block) = next {
                    self.handles[h].current_block = next_block;
                }
                self.handles[h].position += 1;
            }
        }
        Ok(total)
    }

    /// Write all of `buf`, extending the chain with new blocks as
    /// needed. Returns `Ok(())` on full success; on `OutOfSpace`, all
    /// fully-committed blocks remain and `position` reflects exactly
    /// the bytes counted as written.
    pub fn write(&mut self, handle: u8, buf: &[u8]) -> FsResult<()> {
        self.check_handle_range(handle)?;
        let h = handle as usize;
        if self.handles[h].access != AccessMode::Write {
            return Err(FsError::WrongFileIoType);
        }

        let n = buf.len();
        let mut i = 0usize;
        while i < n {
            let block = self.handles[h].current_block;
            let off = self.handles[h].position % BLOCK_SIZE;
            let remaining = n - i;
            let room = DATA_BYTES_PER_BLOCK - off;

            if remaining > room {
                // Fill the rest of this block regardless of whether a
                // new block turns out to be available: the reference
                // implementation commits these bytes to the device
                // before checking for space, and only counts them
                // toward `position` if a next block was found.
                self.device
                    .write_block(self.layout.data_offset(block, off), &buf[i..i + room]);

                let next_block = self.bitmap.find_free(&self.layout);
                if next_block == NULL_BLOCK {
                    log::error!("write({handle}): out of space after filling block {block}");
                    return Err(FsError::OutOfSpace);
                }
                chain::set_next(&mut self.device, &self.layout, block, Terminator::Next(next_block));
                chain::set_next(&mut self.device, &self.layout, next_block, Terminator::OpenTail);
                self.bitmap.set_in_use(&mut self.device, &self.layout, next_block, true);
                self.handles[h].current_block = next_block;
                i += room;
                // Virtual advance: skips over the terminator slot of
                // the block just filled so the new block starts at
                // `position % BLOCK_SIZE == 0`.
                self.handles[h].position += BLOCK_SIZE - off;
            } else {
                self.device
                    .write_block(self.layout.data_offset(block, off), &buf[i..i + remaining]);
                self.handles[h].position += remaining;
                i += remaining;
            }
        }
        Ok(())
    }

    /// Close `file`'s handle. A no-op success if already closed.
    /// Stamps the tail block's terminator with the file's final
    /// length if the handle was open for writing.
    pub fn close(&mut self, file: u8) -> FsResult<()> {
        self.check_handle_range(file)?;
        let h = file as usize;
        if !self.pointer_table.exists(file) {
            return Err(FsError::FileDoesNotExist);
        }
        if self.handles[h].access == AccessMode::Closed {
            return Ok(());
        }
        if self.handles[h].access == AccessMode::Write {
            let current_block = self.handles[h].current_block;
            let len = (self.handles[h].position % BLOCK_SIZE) as u8;
            chain::set_next(&mut self.device, &self.layout, current_block, Terminator::Length(len));
        }
        self.handles[h].current_block = NULL_BLOCK;
        self.handles[h].access = AccessMode::Closed;
        log::debug!("close({file}) ok");
        Ok(())
    }

    /// Delete `file`: free every block in its chain and clear its
    /// pointer-table entry. Requires the handle be `Closed`.
    pub fn delete(&mut self, file: u8) -> FsResult<()> {
        self.check_handle_range(file)?;
        let h = file as usize;
        if !self.pointer_table.exists(file) {
            return Err(FsError::FileDoesNotExist);
        }
        if self.handles[h].access != AccessMode::Closed {
            return Err(FsError::FileAlreadyOpen);
        }
        let start = self.pointer_table.start(file);
        chain::wipe(&mut self.device, &self.layout, &mut self.bitmap, start);
        self.bitmap.set_in_use(&mut self.device, &self.layout, start, false);
        self.pointer_table.set_start(&mut self.device, &self.layout, file, NULL_BLOCK);
        log::debug!("delete({file}) ok");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;

    fn mounted(device_size: usize, max_files: usize) -> Filesystem<MemoryDevice> {
        let layout = Layout::new(device_size, max_files);
        Filesystem::mount(MemoryDevice::new(device_size), layout)
    }

    #[test]
    fn mount_formats_fresh_device() {
        let fs = mounted(2048, 61);
        for f in 0..61u8 {
            assert!(!fs.exists(f));
        }
    }

    #[test]
    fn write_read_roundtrip_64_bytes() {
        let mut fs = mounted(2048, 61);
        let data: Vec<u8> = (1..=64u8).collect();
        let h = fs.open_for_write(0).unwrap();
        fs.write(h, &data).unwrap();
        fs.close(h).unwrap();

        let h = fs.open_for_read(0).unwrap();
        let mut buf = [0u8; 65];
        let n = fs.read(h, &mut buf).unwrap();
        assert_eq!(n, 64);
        assert_eq!(&buf[..64], &data[..]);
        assert_eq!(buf[64], 0);
        fs.close(h).unwrap();
    }

    #[test]
    fn exact_block_boundary_31_bytes() {
        let mut fs = mounted(2048, 61);
        let data: Vec<u8> = (1..=31u8).collect();
        let h = fs.open_for_write(0).unwrap();
        fs.write(h, &data).unwrap();
        fs.close(h).unwrap();

        let h = fs.open_for_read(0).unwrap();
        let mut buf = [0u8; 32];
        let n = fs.read(h, &mut buf).unwrap();
        assert_eq!(n, 31);
        fs.close(h).unwrap();
    }

    #[test]
    fn two_block_file_spans_chain_correctly() {
        let mut fs = mounted(2048, 61);
        let data: Vec<u8> = (1..=40u8).collect();
        let h = fs.open_for_write(1).unwrap();
        fs.write(h, &data).unwrap();
        fs.close(h).unwrap();

        let h = fs.open_for_read(1).unwrap();
        let mut buf = [0u8; 100];
        let n = fs.read(h, &mut buf).unwrap();
        assert_eq!(n, 40);
        assert_eq!(&buf[..40], &data[..]);
        fs.close(h).unwrap();
    }

    #[test]
    fn resumed_read_at_intermediate_block_boundary_advances() {
        // A read that stops exactly at the end of a non-terminal
        // block's data region must still advance to the next block on
        // the following call rather than spinning with no progress.
        let mut fs = mounted(2048, 61);
        let data: Vec<u8> = (1..=40u8).collect();
        let h = fs.open_for_write(1).unwrap();
        fs.write(h, &data).unwrap();
        fs.close(h).unwrap();

        let h = fs.open_for_read(1).unwrap();
        let mut first = [0u8; 31];
        let n1 = fs.read(h, &mut first).unwrap();
        assert_eq!(n1, 31);
        assert_eq!(&first[..], &data[..31]);

        let mut second = [0u8; 9];
        let n2 = fs.read(h, &mut second).unwrap();
        assert_eq!(n2, 9);
        assert_eq!(&second[..], &data[31..40]);
        fs.close(h).unwrap();
    }

    #[test]
    fn append_continues_after_close() {
        let mut fs = mounted(2048, 61);
        let first: Vec<u8> = (1..=10u8).collect();
        let second: Vec<u8> = (11..=20u8).collect();

        let h = fs.open_for_write(2).unwrap();
        fs.write(h, &first).unwrap();
        fs.close(h).unwrap();

        let h = fs.open_for_append(2).unwrap();
        fs.write(h, &second).unwrap();
        fs.close(h).unwrap();

        let h = fs.open_for_read(2).unwrap();
        let mut buf = [0u8; 64];
        let n = fs.read(h, &mut buf).unwrap();
        assert_eq!(n, 20);
        assert_eq!(&buf[..10], &first[..]);
        assert_eq!(&buf[10..20], &second[..]);
    }

    #[test]
    fn delete_frees_blocks_and_clears_existence() {
        let mut fs = mounted(2048, 61);
        let data = vec![7u8; 200];
        let h = fs.open_for_write(3).unwrap();
        fs.write(h, &data).unwrap();
        fs.close(h).unwrap();
        assert!(fs.exists(3));

        fs.delete(3).unwrap();
        assert!(!fs.exists(3));
    }

    #[test]
    fn open_for_read_missing_file_errors() {
        let mut fs = mounted(2048, 61);
        assert_eq!(fs.open_for_read(0), Err(FsError::FileDoesNotExist));
    }

    #[test]
    fn double_open_errors() {
        let mut fs = mounted(2048, 61);
        let h = fs.open_for_write(0).unwrap();
        assert_eq!(fs.open_for_write(0), Err(FsError::FileAlreadyOpen));
        fs.close(h).unwrap();
    }

    #[test]
    fn wrong_io_type_errors() {
        let mut fs = mounted(2048, 61);
        let h = fs.open_for_write(0).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(fs.read(h, &mut buf), Err(FsError::WrongFileIoType));
        fs.close(h).unwrap();

        let h = fs.open_for_read(0).unwrap();
        assert_eq!(fs.write(h, &[1, 2, 3]), Err(FsError::WrongFileIoType));
    }

    #[test]
    fn invalid_handle_errors() {
        let mut fs = mounted(2048, 61);
        let mut buf = [0u8; 4];
        assert_eq!(fs.read(61, &mut buf), Err(FsError::InvalidAccessHandle));
        assert_eq!(fs.write(61, &[1]), Err(FsError::InvalidAccessHandle));
    }

    #[test]
    fn delete_while_open_errors() {
        let mut fs = mounted(2048, 61);
        let h = fs.open_for_write(0).unwrap();
        assert_eq!(fs.delete(0), Err(FsError::FileAlreadyOpen));
        fs.close(h).unwrap();
    }

    #[test]
    fn out_of_space_preserves_committed_data() {
        // A tiny volume: few blocks total, so one large write runs out.
        let layout = Layout::new(128, 4);
        let mut fs = Filesystem::mount(MemoryDevice::new(128), layout);
        let total_blocks = fs.layout().num_blocks;
        let capacity = total_blocks * DATA_BYTES_PER_BLOCK;
        let data = vec![9u8; capacity + DATA_BYTES_PER_BLOCK];

        let h = fs.open_for_write(0).unwrap();
        let result = fs.write(h, &data);
        assert_eq!(result, Err(FsError::OutOfSpace));
        fs.close(h).unwrap();

        let h = fs.open_for_read(0).unwrap();
        let mut buf = vec![0u8; data.len()];
        let n = fs.read(h, &mut buf).unwrap();
        assert!(n <= capacity);
        assert!(buf[..n].iter().all(|&b| b == 9));
    }

    #[test]
    fn handle_isolation_across_files() {
        let mut fs = mounted(2048, 61);
        let h0 = fs.open_for_write(0).unwrap();
        fs.write(h0, &[1, 2, 3]).unwrap();

        // operating on a different file id must not disturb file 0's handle.
        assert_eq!(fs.open_for_read(5), Err(FsError::FileDoesNotExist));
        assert_eq!(fs.access_mode(0), Some(AccessMode::Write));

        fs.close(h0).unwrap();
    }

    #[test]
    fn close_is_noop_when_already_closed() {
        let mut fs = mounted(2048, 61);
        let h = fs.open_for_write(0).unwrap();
        fs.write(h, &[1]).unwrap();
        fs.close(h).unwrap();
        assert_eq!(fs.close(h), Ok(()));
    }

    #[test]
    fn position_31_forces_new_block_even_for_one_byte() {
        // Drive position to block-offset 31 (a full data region) and
        // confirm writing one more byte still allocates a new block
        // rather than special-casing a single trailing byte.
        let mut fs = mounted(2048, 61);
        let h = fs.open_for_write(0).unwrap();
        fs.write(h, &[0u8; 31]).unwrap();
        let block_before = fs.handles[0].current_block;
        fs.write(h, &[0xAA]).unwrap();
        let block_after = fs.handles[0].current_block;
        assert_ne!(block_before, block_after);
        fs.close(h).unwrap();
    }
}
