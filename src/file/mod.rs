//! Raw image sources and binary decoding primitives.
//!
//! The boot-selection caller reads a loader binary from storage and hands its bytes to
//! [`crate::Launcher::launch`]. This module provides the types that hold those bytes before they
//! are parsed, and the little-endian codec every later stage decodes them with.
//!
//! # Key Components
//!
//! - [`crate::file::RawImage`] - An untrusted image, owned or memory-mapped
//! - [`crate::file::Backend`] - Trait for the data sources behind a [`RawImage`]
//! - [`crate::file::parser::Parser`] - Cursor for decoding fixed-layout records
//! - [`crate::file::io`] - Bounds-checked little-endian reads and writes
//!
//! # Examples
//!
//! ```rust,no_run
//! use mokload::file::RawImage;
//! use std::path::Path;
//!
//! let raw = RawImage::from_file(Path::new("EFI/ubuntu/grubx64.efi"))?;
//! let dos_magic = raw.data_slice(0, 2)?;
//! assert_eq!(dos_magic, b"MZ");
//! # Ok::<(), mokload::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{Error::Empty, Result};
use memory::Memory;
use physical::Physical;

/// Backend trait for raw image data sources.
///
/// This trait abstracts over where the untrusted bytes live, allowing both heap buffers and
/// memory-mapped files. All implementations must be thread-safe.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// An untrusted image, exactly as read from storage.
///
/// A `RawImage` performs no PE validation of its own; it only guarantees that the image is not
/// empty. Validation happens in [`crate::image::parse`] once the bytes are handed to the loader.
pub struct RawImage {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
}

impl RawImage {
    /// Maps an image from the given path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped, and
    /// [`crate::Error::Empty`] if the file is empty.
    pub fn from_file(file: &Path) -> Result<RawImage> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Wraps an image that has already been read into memory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mokload::{file::RawImage, Error};
    ///
    /// assert!(matches!(RawImage::from_mem(Vec::new()), Err(Error::Empty)));
    ///
    /// let raw = RawImage::from_mem(vec![b'M', b'Z', 0, 0])?;
    /// assert_eq!(raw.len(), 4);
    /// # Ok::<(), mokload::Error>(())
    /// ```
    pub fn from_mem(data: Vec<u8>) -> Result<RawImage> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<RawImage> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(RawImage {
            data: Box::new(data),
        })
    }

    /// Returns the total size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the image has a length of zero.
    ///
    /// Always `false` for a successfully constructed image.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the complete image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range leaves the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }
}
