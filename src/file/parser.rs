//! Cursor-based decoder for fixed-layout PE records.
//!
//! [`Parser`] walks a byte slice that has already been cut out of an image through a
//! bounds-checked view: a 40-byte section header, a data directory entry, or the body of a
//! relocation block. Each read is checked again against the slice, so a record shorter than
//! expected fails with [`crate::Error::OutOfBounds`] instead of reading into adjacent bytes.
//!
//! # Examples
//!
//! ```rust
//! use mokload::Parser;
//!
//! // VirtualSize, VirtualAddress of a section header after its 8-byte name
//! let data = [b'.', b't', b'e', b'x', b't', 0, 0, 0, 0x00, 0x02, 0, 0, 0x00, 0x10, 0, 0];
//! let mut parser = Parser::new(&data);
//!
//! let name = parser.read_bytes(8)?;
//! assert_eq!(&name[..5], b".text");
//! assert_eq!(parser.read_le::<u32>()?, 0x200);
//! assert_eq!(parser.read_le::<u32>()?, 0x1000);
//! assert!(!parser.has_more_data());
//! # Ok::<(), mokload::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, PeIO},
    Error::OutOfBounds,
    Result,
};

/// A little-endian binary cursor over a borrowed byte slice.
///
/// The parser keeps a position into its slice and never hands out bytes beyond the end of it.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to `pos`.
    ///
    /// Seeking to exactly the end of the data is allowed and leaves nothing to read.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        self.position = self.calc_end_position(step)?;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Read a `T` in little-endian byte order and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: PeIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Returns the number of bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Computes `position + length`, checking for overflow and the end of the data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the addition overflows or the end lies past the
    /// data.
    pub fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self.position.checked_add(length).ok_or(OutOfBounds)?;

        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(end)
    }

    /// Reads `length` raw bytes from the current position and advances past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `length` bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_sequential_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.len(), 8);
        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0201);
        assert_eq!(parser.read_le::<u32>().unwrap(), 0x06050403);
        assert_eq!(parser.pos(), 6);
        assert_eq!(parser.remaining(), 2);
        assert!(parser.has_more_data());
        assert_eq!(parser.read_bytes(2).unwrap(), &[0x07, 0x08]);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn test_parser_seek_bounds() {
        let data = [0xAA; 4];
        let mut parser = Parser::new(&data);

        assert!(parser.seek(4).is_ok());
        assert_eq!(parser.remaining(), 0);
        assert!(matches!(parser.seek(5), Err(OutOfBounds)));
        assert_eq!(parser.pos(), 4);
    }

    #[test]
    fn test_parser_advance_overflow() {
        let data = [0u8; 16];
        let mut parser = Parser::new(&data);

        parser.advance_by(8).unwrap();
        assert!(matches!(parser.advance_by(usize::MAX), Err(OutOfBounds)));
        assert!(matches!(parser.advance_by(9), Err(OutOfBounds)));
        assert_eq!(parser.pos(), 8);
        parser.advance_by(8).unwrap();
        assert_eq!(parser.remaining(), 0);
    }

    #[test]
    fn test_parser_truncated_record() {
        let data = [0x01, 0x02, 0x03];
        let mut parser = Parser::new(&data);

        assert!(matches!(parser.read_le::<u32>(), Err(OutOfBounds)));
        assert!(matches!(parser.read_bytes(4), Err(OutOfBounds)));
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn test_parser_empty() {
        let parser = Parser::new(&[]);
        assert!(parser.is_empty());
        assert!(!parser.has_more_data());
        assert_eq!(parser.calc_end_position(0).unwrap(), 0);
        assert!(parser.calc_end_position(1).is_err());
    }
}
