//! Bounds-checked offset translation over image bytes.
//!
//! [`ImageView`] and [`ImageViewMut`] are the only way the loader turns an offset taken from an
//! image header into bytes. `translate(offset, len)` either returns exactly `len` bytes starting
//! at `offset` or fails with [`crate::Error::OutOfBounds`]; overflow of `offset + len` is
//! treated as out of bounds. The typed helpers build on it.
//!
//! ```rust
//! use mokload::image::view::ImageViewMut;
//!
//! let mut image = vec![0u8; 0x20];
//! let mut view = ImageViewMut::new(&mut image);
//!
//! view.write(0x10, 0x1_4000_0000u64)?;
//! assert_eq!(view.read::<u64>(0x10)?, 0x1_4000_0000);
//! assert!(view.translate(0x18, 0x10).is_err());
//! # Ok::<(), mokload::Error>(())
//! ```

use crate::{
    file::{
        io::{read_le, write_le, PeIO},
        parser::Parser,
    },
    Error::OutOfBounds,
    Result,
};

fn checked_range(offset: usize, len: usize, limit: usize) -> Result<std::ops::Range<usize>> {
    match offset.checked_add(len) {
        Some(end) if end <= limit => Ok(offset..end),
        _ => Err(OutOfBounds),
    }
}

/// Read-only view over raw or loaded image bytes.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    data: &'a [u8],
}

impl<'a> ImageView<'a> {
    /// Creates a view over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        ImageView { data }
    }

    /// Length of the viewed bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the view covers no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if any part of the range lies outside the view.
    pub fn translate(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let range = checked_range(offset, len, self.data.len())?;
        Ok(&self.data[range])
    }

    /// Reads a little-endian `T` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit in the view.
    pub fn read<T: PeIO>(&self, offset: usize) -> Result<T> {
        read_le(self.translate(offset, std::mem::size_of::<T>())?)
    }

    /// Returns a [`Parser`] over the `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range lies outside the view.
    pub fn parser(&self, offset: usize, len: usize) -> Result<Parser<'a>> {
        Ok(Parser::new(self.translate(offset, len)?))
    }
}

/// Mutable view over a loaded image.
#[derive(Debug)]
pub struct ImageViewMut<'a> {
    data: &'a mut [u8],
}

impl<'a> ImageViewMut<'a> {
    /// Creates a mutable view over `data`.
    pub fn new(data: &'a mut [u8]) -> Self {
        ImageViewMut { data }
    }

    /// Length of the viewed bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the view covers no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if any part of the range lies outside the view.
    pub fn translate(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let range = checked_range(offset, len, self.data.len())?;
        Ok(&self.data[range])
    }

    /// Returns the `len` bytes starting at `offset` for writing.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if any part of the range lies outside the view.
    pub fn translate_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let range = checked_range(offset, len, self.data.len())?;
        Ok(&mut self.data[range])
    }

    /// Reads a little-endian `T` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit in the view.
    pub fn read<T: PeIO>(&self, offset: usize) -> Result<T> {
        read_le(self.translate(offset, std::mem::size_of::<T>())?)
    }

    /// Writes `value` little-endian at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit in the view. Nothing is
    /// written in that case.
    pub fn write<T: PeIO>(&mut self, offset: usize, value: T) -> Result<()> {
        write_le(self.translate_mut(offset, std::mem::size_of::<T>())?, value)
    }
}
