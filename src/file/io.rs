//! Little-endian primitive codec for PE structures.
//!
//! Every multi-byte field in a PE32+ image (headers, section table, relocation blocks and the
//! fixup targets themselves) is stored little-endian. This module provides the bounds-checked
//! read and write helpers the loader uses for all of them, so that no stage interprets bytes
//! at a computed offset without first proving the bytes exist.
//!
//! # Key Components
//!
//! - [`crate::file::io::PeIO`] - Trait implemented by the unsigned primitives a PE field can have
//! - [`crate::file::io::read_le`] / [`crate::file::io::read_le_at`] - Bounds-checked reads
//! - [`crate::file::io::write_le`] / [`crate::file::io::write_le_at`] - Bounds-checked writes
//!
//! # Usage Examples
//!
//! ```rust
//! use mokload::file::io::{read_le_at, write_le_at};
//!
//! // A relocation block header: page RVA followed by block size
//! let mut block = [0u8; 8];
//! let mut offset = 0;
//! write_le_at(&mut block, &mut offset, 0x1000u32)?;
//! write_le_at(&mut block, &mut offset, 0x0Cu32)?;
//!
//! let mut offset = 0;
//! let page: u32 = read_le_at(&block, &mut offset)?;
//! let size: u32 = read_le_at(&block, &mut offset)?;
//! assert_eq!((page, size, offset), (0x1000, 0x0C, 8));
//! # Ok::<(), mokload::Error>(())
//! ```
//!
//! All functions return [`crate::Error::OutOfBounds`] instead of panicking when the buffer is too
//! short, including when `offset + size_of::<T>()` would overflow.

use crate::{Error::OutOfBounds, Result};

/// Trait for primitives that can be decoded from and encoded to little-endian bytes.
///
/// Implemented for `u8`, `u16`, `u32` and `u64`, which covers every field width the loader
/// touches: byte flags, relocation entries and 16-bit fixups, 32-bit RVAs and fixups, and the
/// 64-bit image base and `DIR64` fixups.
pub trait PeIO: Sized + Copy {
    /// Fixed-size byte array representation of this type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encode to little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
}

impl PeIO for u64 {
    type Bytes = [u8; 8];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u64::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u64::to_le_bytes(self)
    }
}

impl PeIO for u32 {
    type Bytes = [u8; 4];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u32::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u32::to_le_bytes(self)
    }
}

impl PeIO for u16 {
    type Bytes = [u8; 2];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u16::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u16::to_le_bytes(self)
    }
}

impl PeIO for u8 {
    type Bytes = [u8; 1];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        bytes[0]
    }

    fn to_le_bytes(self) -> Self::Bytes {
        [self]
    }
}

/// Reads a value of type `T` from the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: PeIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Reads a value of type `T` at `offset` and advances `offset` past it.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Position to read at, advanced by `size_of::<T>()` on success
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the read would leave the buffer. The offset is left
/// unchanged in that case.
pub fn read_le_at<T: PeIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };

    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Writes `value` at the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn write_le<T: PeIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Writes `value` at `offset` and advances `offset` past it.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the write would leave the buffer. Nothing is written
/// and the offset is left unchanged in that case.
pub fn write_le_at<T: PeIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };

    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(value.to_le_bytes().as_ref());
    *offset = end;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x04030201);
    }

    #[test]
    fn read_le_u64() {
        let result = read_le::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807060504030201);
    }

    #[test]
    fn read_le_at_sequential() {
        let mut offset = 0;
        let first: u16 = read_le_at(&TEST_BUFFER, &mut offset).unwrap();
        let second: u32 = read_le_at(&TEST_BUFFER, &mut offset).unwrap();
        let third: u8 = read_le_at(&TEST_BUFFER, &mut offset).unwrap();

        assert_eq!(first, 0x0201);
        assert_eq!(second, 0x06050403);
        assert_eq!(third, 0x07);
        assert_eq!(offset, 7);
    }

    #[test]
    fn errors() {
        let buffer = [0xFF, 0xFF, 0xFF, 0xFF];

        let result = read_le::<u64>(&buffer);
        assert!(matches!(result, Err(OutOfBounds)));

        let mut offset = 2;
        let result = read_le_at::<u32>(&buffer, &mut offset);
        assert!(matches!(result, Err(OutOfBounds)));
        assert_eq!(offset, 2);

        let mut offset = usize::MAX - 1;
        let result = read_le_at::<u32>(&buffer, &mut offset);
        assert!(matches!(result, Err(OutOfBounds)));
    }

    #[test]
    fn write_le_u16() {
        let mut data = [0u8; 2];
        write_le(&mut data, 0xBEEFu16).unwrap();
        assert_eq!(data, [0xEF, 0xBE]);
    }

    #[test]
    fn write_le_u64() {
        let mut data = [0u8; 8];
        write_le(&mut data, 0x0000_7F00_1234_5678u64).unwrap();
        assert_eq!(data, [0x78, 0x56, 0x34, 0x12, 0x00, 0x7F, 0x00, 0x00]);
    }

    #[test]
    fn write_le_at_sequential() {
        let mut data = [0u8; 8];
        let mut offset = 0;

        write_le_at(&mut data, &mut offset, 0x1000u32).unwrap();
        write_le_at(&mut data, &mut offset, 0xA010u16).unwrap();
        write_le_at(&mut data, &mut offset, 0x00u8).unwrap();

        assert_eq!(data, [0x00, 0x10, 0x00, 0x00, 0x10, 0xA0, 0x00, 0x00]);
        assert_eq!(offset, 7);
    }

    #[test]
    fn write_errors() {
        let mut data = [0xAAu8; 4];

        let mut offset = 1;
        let result = write_le_at(&mut data, &mut offset, 0u32);
        assert!(matches!(result, Err(OutOfBounds)));
        assert_eq!(offset, 1);
        assert_eq!(data, [0xAA; 4]);

        let result = write_le(&mut data, 0u64);
        assert!(matches!(result, Err(OutOfBounds)));
    }
}
