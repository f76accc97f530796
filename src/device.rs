//! The Device Port: the only collaborator this crate does not own.
//!
//! [`Device`] is deliberately a thin, infallible capability — four
//! byte-level primitives over a flat address space — mirroring the
//! EEPROM driver the reference implementation targets
//! (`eeprom_read_byte`/`eeprom_update_byte`/`eeprom_read_block`/
//! `eeprom_update_block`, none of which can report failure). Treating
//! the device as infallible at this layer is a spec-level decision,
//! not an oversight: see `DESIGN.md`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A flat, byte-addressable, fixed-size store.
///
/// Implementations are expected to make every write durable before
/// the call returns (write-through), since the filesystem layer never
/// retries and never checks for I/O failure.
pub trait Device {
    /// Total addressable size in bytes.
    fn size(&self) -> usize;

    /// Read the byte at `addr`.
    fn read_byte(&self, addr: usize) -> u8;

    /// Write `value` at `addr`.
    fn write_byte(&mut self, addr: usize, value: u8);

    /// Read `buf.len()` bytes starting at `addr` into `buf`.
    fn read_block(&self, addr: usize, buf: &mut [u8]) {
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = self.read_byte(addr + i);
        }
    }

    /// Write `buf` starting at `addr`.
    fn write_block(&mut self, addr: usize, buf: &[u8]) {
        for (i, byte) in buf.iter().enumerate() {
            self.write_byte(addr + i, *byte);
        }
    }
}

/// An in-memory [`Device`], primarily for tests and for embedding this
/// filesystem inside a larger in-memory simulation.
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    bytes: Vec<u8>,
}

impl MemoryDevice {
    /// Create a zero-filled device of `size` bytes.
    pub fn new(size: usize) -> Self {
        MemoryDevice {
            bytes: vec![0u8; size],
        }
    }
}

impl Device for MemoryDevice {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn read_byte(&self, addr: usize) -> u8 {
        self.bytes[addr]
    }

    fn write_byte(&mut self, addr: usize, value: u8) {
        self.bytes[addr] = value;
    }

    fn read_block(&self, addr: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.bytes[addr..addr + buf.len()]);
    }

    fn write_block(&mut self, addr: usize, buf: &[u8]) {
        self.bytes[addr..addr + buf.len()].copy_from_slice(buf);
    }
}

/// A [`Device`] backed by a regular file (or a raw block device) on a
/// host OS. Useful for running this filesystem outside a
/// microcontroller, for development and for exercising the on-device
/// layout with real persistence across process restarts.
///
/// Every write is followed by `sync_all` to approximate the immediate
/// durability a real EEPROM cell gives for free; see
/// [`Device`]'s write-through contract.
pub struct FileDevice {
    file: File,
    size: usize,
}

impl FileDevice {
    /// Open (creating if absent) `path` as a device of `size` bytes.
    /// Pads or truncates the backing file to exactly `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be opened, resized, or synced. A host
    /// OS failing to give us a file is an environment error, not a
    /// filesystem-level condition this layer is specified to handle;
    /// see `DESIGN.md`'s Open Question on device fallibility.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Self {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .expect("failed to open backing file for FileDevice");
        file.set_len(size as u64)
            .expect("failed to size backing file for FileDevice");
        FileDevice { file, size }
    }
}

impl Device for FileDevice {
    fn size(&self) -> usize {
        self.size
    }

    fn read_byte(&self, addr: usize) -> u8 {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(addr as u64))
            .expect("seek failed reading FileDevice");
        let mut buf = [0u8; 1];
        file.read_exact(&mut buf)
            .expect("read failed reading FileDevice");
        buf[0]
    }

    fn write_byte(&mut self, addr: usize, value: u8) {
        self.file
            .seek(SeekFrom::Start(addr as u64))
            .expect("seek failed writing FileDevice");
        self.file
            .write_all(&[value])
            .expect("write failed writing FileDevice");
        self.file.sync_all().expect("sync failed writing FileDevice");
    }

    fn read_block(&self, addr: usize, buf: &mut [u8]) {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(addr as u64))
            .expect("seek failed reading FileDevice block");
        file.read_exact(buf)
            .expect("read failed reading FileDevice block");
    }

    fn write_block(&mut self, addr: usize, buf: &[u8]) {
        self.file
            .seek(SeekFrom::Start(addr as u64))
            .expect("seek failed writing FileDevice block");
        self.file
            .write_all(buf)
            .expect("write failed writing FileDevice block");
        self.file.sync_all().expect("sync failed writing FileDevice block");
    }
}
