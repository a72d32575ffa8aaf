//! DOS/PE header validation and decoding.

use super::{
    view::ImageView, DataDirectory, FileCharacteristics, ImageContext,
    BASE_RELOCATION_DIRECTORY_INDEX, SECURITY_DIRECTORY_INDEX,
};
use crate::{Error, Result};

/// Size of the DOS header; nothing shorter can be an image.
pub const DOS_HEADER_SIZE: usize = 0x40;
/// `MZ`
pub const DOS_MAGIC: u16 = 0x5A4D;
/// `PE\0\0`
pub const PE_SIGNATURE: u32 = 0x0000_4550;
/// Optional header magic of a PE32+ image.
pub const PE32_PLUS_MAGIC: u16 = 0x020B;

const E_LFANEW_OFFSET: usize = 0x3C;
const COFF_HEADER_SIZE: usize = 20;
const OPTIONAL_HEADER_OFFSET: usize = 4 + COFF_HEADER_SIZE;
// Signature, COFF header and a PE32+ optional header with all 16 data directories
const NT_HEADERS64_SIZE: usize = OPTIONAL_HEADER_OFFSET + 240;

// Field offsets inside the PE32+ optional header
const OPT_ADDRESS_OF_ENTRY_POINT: usize = 16;
const OPT_IMAGE_BASE: usize = 24;
const OPT_SIZE_OF_IMAGE: usize = 56;
const OPT_NUMBER_OF_RVA_AND_SIZES: usize = 108;
const OPT_DATA_DIRECTORIES: usize = 112;

/// Validates the headers of a PE32+ image and extracts an [`ImageContext`].
///
/// The function is pure: it only reads `data`, and every read goes through a bounds-checked
/// [`ImageView`]. Checks are performed in this order, the first failing one deciding the error:
///
/// 1. `data` must hold a DOS header, else [`Error::InvalidImage`]
/// 2. the NT headers at `e_lfanew` (or offset 0 without an `MZ` stub) must fit in `data`, else
///    [`Error::InvalidImage`]
/// 3. the signature must be `PE\0\0`, else [`Error::UnsupportedImageType`]
/// 4. relocations must not be stripped, else [`Error::UnsupportedRelocationsStripped`]
/// 5. the optional header must be PE32+, else [`Error::UnsupportedArchitecture`]
/// 6. `SizeOfImage >= SizeOfHeaders`, else [`Error::InvalidImage`]
/// 7. the certificate table must lie within `data`, else [`Error::MalformedSecurityHeader`]
///
/// # Errors
///
/// Returns the error of the first failed check listed above.
///
/// # Examples
///
/// ```rust
/// use mokload::{image::parse, Error};
///
/// assert!(matches!(parse(&[0u8; 16]), Err(Error::InvalidImage(_))));
/// ```
pub fn parse(data: &[u8]) -> Result<ImageContext> {
    let view = ImageView::new(data);

    if data.len() < DOS_HEADER_SIZE {
        log::warn!("Invalid image - 0x{:x} bytes is smaller than a DOS header", data.len());
        return Err(Error::InvalidImage("buffer smaller than the DOS header"));
    }

    let pe_offset = if view.read::<u16>(0)? == DOS_MAGIC {
        view.read::<u32>(E_LFANEW_OFFSET)? as usize
    } else {
        0
    };

    let Ok(mut parser) = view.parser(pe_offset, NT_HEADERS64_SIZE) else {
        log::warn!(
            "Invalid image - PE header at 0x{:x} exceeds 0x{:x} bytes",
            pe_offset,
            data.len()
        );
        return Err(Error::InvalidImage("PE header offset beyond buffer"));
    };

    let signature: u32 = parser.read_le()?;
    if signature != PE_SIGNATURE {
        log::warn!("Unsupported image type - signature 0x{:08x}", signature);
        return Err(Error::UnsupportedImageType(signature));
    }

    // Machine
    parser.advance_by(2)?;
    let number_of_sections: u16 = parser.read_le()?;
    // TimeDateStamp, PointerToSymbolTable, NumberOfSymbols
    parser.advance_by(12)?;
    let size_of_optional_header: u16 = parser.read_le()?;
    let characteristics = FileCharacteristics::from_bits_retain(parser.read_le()?);

    if characteristics.contains(FileCharacteristics::RELOCS_STRIPPED) {
        log::warn!("Unsupported image - relocations have been stripped");
        return Err(Error::UnsupportedRelocationsStripped);
    }

    let magic: u16 = parser.read_le()?;
    if magic != PE32_PLUS_MAGIC {
        log::warn!("Unsupported architecture - optional header magic 0x{:04x}", magic);
        return Err(Error::UnsupportedArchitecture(magic));
    }

    parser.seek(OPTIONAL_HEADER_OFFSET + OPT_ADDRESS_OF_ENTRY_POINT)?;
    let entry_point: u32 = parser.read_le()?;

    parser.seek(OPTIONAL_HEADER_OFFSET + OPT_IMAGE_BASE)?;
    let image_address: u64 = parser.read_le()?;

    parser.seek(OPTIONAL_HEADER_OFFSET + OPT_SIZE_OF_IMAGE)?;
    let image_size: u32 = parser.read_le()?;
    let size_of_headers: u32 = parser.read_le()?;

    parser.seek(OPTIONAL_HEADER_OFFSET + OPT_NUMBER_OF_RVA_AND_SIZES)?;
    let number_of_rva_and_sizes: u32 = parser.read_le()?;

    // Both slots are decoded even when fewer directories are declared; the relocator enforces
    // the declared count.
    parser.seek(OPTIONAL_HEADER_OFFSET + OPT_DATA_DIRECTORIES + SECURITY_DIRECTORY_INDEX * 8)?;
    let security = DataDirectory::read(&mut parser)?;
    parser.seek(
        OPTIONAL_HEADER_OFFSET + OPT_DATA_DIRECTORIES + BASE_RELOCATION_DIRECTORY_INDEX * 8,
    )?;
    let base_relocation = DataDirectory::read(&mut parser)?;

    if image_size < size_of_headers {
        log::warn!(
            "Invalid image - SizeOfImage 0x{:x} < SizeOfHeaders 0x{:x}",
            image_size,
            size_of_headers
        );
        return Err(Error::InvalidImage("SizeOfImage smaller than SizeOfHeaders"));
    }

    let security_end = (security.virtual_address as usize).checked_add(security.size as usize);
    if !matches!(security_end, Some(end) if end <= data.len()) {
        log::warn!(
            "Malformed security header - 0x{:x}+0x{:x} in 0x{:x} bytes",
            security.virtual_address,
            security.size,
            data.len()
        );
        return Err(Error::MalformedSecurityHeader {
            address: security.virtual_address,
            size: security.size,
            len: data.len(),
        });
    }

    // An offset past the buffer is caught when the section loader reads the table
    let section_table_offset = pe_offset
        .saturating_add(OPTIONAL_HEADER_OFFSET)
        .saturating_add(size_of_optional_header as usize);

    let context = ImageContext {
        pe_offset,
        characteristics,
        number_of_sections,
        section_table_offset,
        image_address,
        image_size,
        size_of_headers,
        entry_point,
        number_of_rva_and_sizes,
        security,
        base_relocation,
    };

    log::debug!(
        "PE32+ image: base 0x{:x}, size 0x{:x}, entry 0x{:x}, {} sections",
        context.image_address,
        context.image_size,
        context.entry_point,
        context.number_of_sections
    );

    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::PeBuilder;

    #[test]
    fn test_parse_valid_image() {
        let data = PeBuilder::new().build();
        let context = parse(&data).unwrap();

        assert_eq!(context.pe_offset(), 0x80);
        assert_eq!(context.image_address(), PeBuilder::DEFAULT_IMAGE_BASE);
        assert_eq!(context.image_size(), 0x4000);
        assert_eq!(context.size_of_headers(), 0x400);
        assert_eq!(context.entry_point(), 0x1000);
        assert_eq!(context.number_of_sections(), 3);
        assert_eq!(context.number_of_rva_and_sizes(), 16);
        assert_eq!(context.section_table_offset(), 0x80 + 24 + 240);
        assert!(context.security().is_empty());
        assert_eq!(context.base_relocation().virtual_address, 0x3000);
        assert!(context
            .characteristics()
            .contains(FileCharacteristics::EXECUTABLE_IMAGE));
    }

    #[test]
    fn test_parse_too_small() {
        let data = PeBuilder::new().build();
        assert!(matches!(
            parse(&data[..DOS_HEADER_SIZE - 1]),
            Err(Error::InvalidImage(_))
        ));
        assert!(matches!(parse(&[]), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn test_parse_header_offset_beyond_buffer() {
        let data = PeBuilder::new().pe_offset(0xFFFF_FFF0).build();
        assert!(matches!(parse(&data), Err(Error::InvalidImage(_))));

        // NT headers start inside the buffer but end outside of it
        let data = PeBuilder::new().build();
        assert!(matches!(
            parse(&data[..0x80 + NT_HEADERS64_SIZE - 1]),
            Err(Error::InvalidImage(_))
        ));
    }

    #[test]
    fn test_parse_without_dos_stub() {
        let data = PeBuilder::new().build();
        // Without the MZ magic, the NT headers are expected at offset 0
        let context = parse(&data[0x80..]).unwrap();
        assert_eq!(context.pe_offset(), 0);
        assert_eq!(context.section_table_offset(), 24 + 240);

        let mut data = PeBuilder::new().build();
        data[0] = 0;
        assert!(matches!(
            parse(&data),
            Err(Error::UnsupportedImageType(0x0000_5A00))
        ));
    }

    #[test]
    fn test_parse_bad_signature() {
        let mut data = PeBuilder::new().build();
        data[0x80..0x84].copy_from_slice(b"NE\0\0");
        assert!(matches!(
            parse(&data),
            Err(Error::UnsupportedImageType(0x0000_454E))
        ));
    }

    #[test]
    fn test_parse_relocs_stripped() {
        let data = PeBuilder::new()
            .characteristics(0x0023)
            .build();
        assert!(matches!(
            parse(&data),
            Err(Error::UnsupportedRelocationsStripped)
        ));
    }

    #[test]
    fn test_parse_pe32_rejected() {
        let data = PeBuilder::new().magic(0x010B).build();
        assert!(matches!(
            parse(&data),
            Err(Error::UnsupportedArchitecture(0x010B))
        ));
    }

    #[test]
    fn test_parse_image_smaller_than_headers() {
        let data = PeBuilder::new().image_size(0x200).build();
        assert!(matches!(parse(&data), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn test_parse_security_directory_bounds() {
        let len = PeBuilder::new().build().len() as u32;

        let data = PeBuilder::new().security(len - 0x10, 0x10).build();
        let context = parse(&data).unwrap();
        assert_eq!(context.security().size, 0x10);

        let data = PeBuilder::new().security(len - 0x10, 0x11).build();
        assert!(matches!(
            parse(&data),
            Err(Error::MalformedSecurityHeader { size: 0x11, .. })
        ));

        let data = PeBuilder::new().security(u32::MAX, 0x10).build();
        assert!(matches!(
            parse(&data),
            Err(Error::MalformedSecurityHeader { .. })
        ));
    }

    #[test]
    fn test_parse_matches_goblin() {
        let data = PeBuilder::new().without_relocations().build();
        let context = parse(&data).unwrap();

        let pe = goblin::pe::PE::parse(&data).unwrap();
        let optional = pe.header.optional_header.unwrap();

        assert!(pe.is_64);
        assert_eq!(context.image_address(), pe.image_base as u64);
        assert_eq!(context.entry_point() as u64, pe.entry as u64);
        assert_eq!(context.number_of_sections() as usize, pe.sections.len());
        assert_eq!(
            context.image_size(),
            optional.windows_fields.size_of_image
        );
        assert_eq!(
            context.size_of_headers(),
            optional.windows_fields.size_of_headers
        );
    }
}
