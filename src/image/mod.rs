//! PE32+ image parsing, section loading and base relocation.
//!
//! This module implements the part of the boot path that runs before any foreign code does:
//! turning untrusted bytes into an [`ImageContext`], laying the image out in a freshly
//! allocated [`LoadedImageBuffer`], and rebasing it for the address it actually landed at.
//!
//! # Pipeline
//!
//! 1. [`parse`] - validates the DOS/PE headers and extracts an owned [`ImageContext`]
//! 2. [`load_sections`] - allocates `SizeOfImage` bytes and copies headers and sections
//! 3. [`relocate`] - applies base relocations for the buffer's address
//!
//! Every access to image bytes goes through [`view::ImageView`] or [`view::ImageViewMut`],
//! whose `translate(offset, len)` is the only way to turn an offset into a slice.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mokload::image::{load_sections, parse, relocate, PoolAllocator};
//!
//! let raw = std::fs::read("grubx64.efi")?;
//! let context = parse(&raw)?;
//!
//! let mut allocator = PoolAllocator::new();
//! let mut image = load_sections(&context, &raw, &mut allocator)?;
//! let address = image.address();
//! let summary = relocate(&context, image.as_mut_slice(), address)?;
//! println!("{} fixups applied", summary.fixups);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod buffer;
mod header;
mod reloc;
mod section;
pub mod view;

pub use buffer::{ImageAllocator, LoadedImageBuffer, PoolAllocator, IMAGE_ALIGNMENT};
pub use header::parse;
pub use reloc::{relocate, RelocationSummary, RelocationType};
pub use section::load_sections;

use bitflags::bitflags;

use crate::{file::parser::Parser, Result};

/// Index of the certificate table in the data directory array.
pub const SECURITY_DIRECTORY_INDEX: usize = 4;
/// Index of the base relocation table in the data directory array.
pub const BASE_RELOCATION_DIRECTORY_INDEX: usize = 5;
/// Size of one section table entry.
pub const SECTION_HEADER_SIZE: usize = 40;

bitflags! {
    /// COFF file header characteristics.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileCharacteristics: u16 {
        /// Base relocations have been removed from the file
        const RELOCS_STRIPPED = 0x0001;
        /// The image is valid and can be run
        const EXECUTABLE_IMAGE = 0x0002;
        /// The application can handle addresses above 2 GiB
        const LARGE_ADDRESS_AWARE = 0x0020;
        /// Debugging information is removed from the image
        const DEBUG_STRIPPED = 0x0200;
        /// The image is a system file
        const SYSTEM = 0x1000;
        /// The image is a dynamic-link library
        const DLL = 0x2000;
    }
}

/// A data directory entry: an RVA (or, for the certificate table, a file offset) and a size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    /// Address of the table
    pub virtual_address: u32,
    /// Size of the table in bytes
    pub size: u32,
}

impl DataDirectory {
    /// Decodes an entry at the parser's position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 8 bytes remain.
    pub fn read(parser: &mut Parser) -> Result<Self> {
        Ok(DataDirectory {
            virtual_address: parser.read_le()?,
            size: parser.read_le()?,
        })
    }

    /// Returns `true` if both address and size are zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.virtual_address == 0 && self.size == 0
    }
}

/// The fields of a section table entry the loader needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// Section name, NUL padded
    pub name: [u8; 8],
    /// Size of the section once loaded
    pub virtual_size: u32,
    /// RVA the section is loaded at
    pub virtual_address: u32,
    /// Size of the initialized data in the file
    pub size_of_raw_data: u32,
    /// File offset of the initialized data
    pub pointer_to_raw_data: u32,
    /// Section flags
    pub characteristics: u32,
}

impl SectionHeader {
    /// Decodes a 40-byte section table entry at the parser's position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 40 bytes remain.
    pub fn read(parser: &mut Parser) -> Result<Self> {
        let mut name = [0u8; 8];
        name.copy_from_slice(parser.read_bytes(8)?);

        let virtual_size = parser.read_le()?;
        let virtual_address = parser.read_le()?;
        let size_of_raw_data = parser.read_le()?;
        let pointer_to_raw_data = parser.read_le()?;
        // PointerToRelocations, PointerToLinenumbers, NumberOfRelocations, NumberOfLinenumbers
        parser.advance_by(12)?;
        let characteristics = parser.read_le()?;

        Ok(SectionHeader {
            name,
            virtual_size,
            virtual_address,
            size_of_raw_data,
            pointer_to_raw_data,
            characteristics,
        })
    }

    /// Returns the section name with trailing NUL padding removed.
    #[must_use]
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.name)
            .trim_end_matches('\0')
            .to_string()
    }
}

/// Validated header information of a PE32+ image.
///
/// Produced by [`parse`] and consumed by [`load_sections`], [`relocate`] and the launcher. The
/// context owns copies of every field it exposes and never refers back into the raw buffer.
///
/// Invariants established by [`parse`]:
/// - `image_size() >= size_of_headers()`
/// - the security directory lies entirely within the raw buffer
/// - relocations are not stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContext {
    pub(crate) pe_offset: usize,
    pub(crate) characteristics: FileCharacteristics,
    pub(crate) number_of_sections: u16,
    pub(crate) section_table_offset: usize,
    pub(crate) image_address: u64,
    pub(crate) image_size: u32,
    pub(crate) size_of_headers: u32,
    pub(crate) entry_point: u32,
    pub(crate) number_of_rva_and_sizes: u32,
    pub(crate) security: DataDirectory,
    pub(crate) base_relocation: DataDirectory,
}

impl ImageContext {
    /// File offset of the `PE\0\0` signature.
    #[must_use]
    pub fn pe_offset(&self) -> usize {
        self.pe_offset
    }

    /// COFF file header characteristics.
    #[must_use]
    pub fn characteristics(&self) -> FileCharacteristics {
        self.characteristics
    }

    /// Number of entries in the section table.
    #[must_use]
    pub fn number_of_sections(&self) -> u16 {
        self.number_of_sections
    }

    /// File offset of the first section table entry.
    #[must_use]
    pub fn section_table_offset(&self) -> usize {
        self.section_table_offset
    }

    /// Preferred load address (`ImageBase`).
    #[must_use]
    pub fn image_address(&self) -> u64 {
        self.image_address
    }

    /// Size of the loaded image (`SizeOfImage`).
    #[must_use]
    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Size of the DOS stub, PE headers and section table (`SizeOfHeaders`).
    #[must_use]
    pub fn size_of_headers(&self) -> u32 {
        self.size_of_headers
    }

    /// Entry point RVA (`AddressOfEntryPoint`).
    #[must_use]
    pub fn entry_point(&self) -> u32 {
        self.entry_point
    }

    /// Number of data directories the optional header declares.
    #[must_use]
    pub fn number_of_rva_and_sizes(&self) -> u32 {
        self.number_of_rva_and_sizes
    }

    /// Certificate table descriptor.
    #[must_use]
    pub fn security(&self) -> DataDirectory {
        self.security
    }

    /// Base relocation table descriptor.
    #[must_use]
    pub fn base_relocation(&self) -> DataDirectory {
        self.base_relocation
    }
}
