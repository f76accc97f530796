//! `microfs`: a fixed-capacity, fixed-file-count byte-stream store over
//! a byte-addressable device.
//!
//! The store partitions a device into a configure byte, an allocation
//! bitmap, a file pointer table, and a data area of fixed-size blocks
//! linked by an overloaded terminator byte. See [`fs::Filesystem`] for
//! the operations this crate exposes, and [`device::Device`] for the
//! abstraction it runs over.
//!
//! ```
//! use microfs::{Device, Filesystem, Layout, MemoryDevice};
//!
//! let layout = Layout::new(2048, 61);
//! let mut fs = Filesystem::mount(MemoryDevice::new(layout.device_size), layout);
//!
//! let handle = fs.open_for_write(0).unwrap();
//! fs.write(handle, b"hello").unwrap();
//! fs.close(handle).unwrap();
//!
//! let handle = fs.open_for_read(0).unwrap();
//! let mut buf = [0u8; 5];
//! fs.read(handle, &mut buf).unwrap();
//! assert_eq!(&buf, b"hello");
//! ```

mod bitmap;
mod chain;
mod device;
mod error;
mod fs;
mod handle;
mod layout;
mod pointer_table;

pub use device::{Device, FileDevice, MemoryDevice};
pub use error::{FsError, FsResult};
pub use fs::Filesystem;
pub use handle::AccessMode;
pub use layout::{Layout, BLOCK_SIZE, DATA_BYTES_PER_BLOCK, MAX_FILES_LIMIT, NULL_BLOCK};
