//! Section layout: copying headers and sections from the raw file into the image buffer.

use super::{
    buffer::{ImageAllocator, LoadedImageBuffer},
    view::{ImageView, ImageViewMut},
    ImageContext, SectionHeader, SECTION_HEADER_SIZE,
};
use crate::{Error, Result};

/// Allocates the image buffer and lays the raw file out in it.
///
/// Allocates exactly `context.image_size()` zeroed bytes, copies `[0, SizeOfHeaders)` verbatim,
/// then for each section in file order copies `min(VirtualSize, SizeOfRawData)` bytes from
/// `PointerToRawData` to `VirtualAddress` and zero-fills the remainder up to `VirtualSize`.
///
/// On any failure the buffer is handed back to `allocator` before the error is returned.
///
/// # Errors
///
/// - [`Error::OutOfResources`] if the buffer cannot be allocated
/// - [`Error::SectionOverflow`] if a section's destination range leaves the image
/// - [`Error::InvalidSectionSize`] if the headers, the section table or a section's raw data lie
///   outside `raw`
pub fn load_sections<A: ImageAllocator + ?Sized>(
    context: &ImageContext,
    raw: &[u8],
    allocator: &mut A,
) -> Result<LoadedImageBuffer> {
    let mut image = allocator.allocate(context.image_size() as usize)?;

    match copy_sections(context, raw, image.as_mut_slice()) {
        Ok(()) => Ok(image),
        Err(error) => {
            allocator.release(image);
            Err(error)
        }
    }
}

fn copy_sections(context: &ImageContext, raw: &[u8], image: &mut [u8]) -> Result<()> {
    let source = ImageView::new(raw);
    let mut target = ImageViewMut::new(image);

    let headers_len = context.size_of_headers() as usize;
    let headers = source
        .translate(0, headers_len)
        .map_err(|_| Error::InvalidSectionSize("headers exceed the raw image"))?;
    target
        .translate_mut(0, headers_len)
        .map_err(|_| Error::InvalidSectionSize("headers exceed the image"))?
        .copy_from_slice(headers);

    let count = context.number_of_sections() as usize;
    let mut table = source
        .parser(context.section_table_offset(), count * SECTION_HEADER_SIZE)
        .map_err(|_| Error::InvalidSectionSize("section table outside the raw image"))?;

    for index in 0..count {
        let section = SectionHeader::read(&mut table)?;
        let address = section.virtual_address as usize;
        let copy_len = section.virtual_size.min(section.size_of_raw_data);

        log::trace!(
            "section {} '{}': RVA 0x{:x}, virtual 0x{:x}, raw 0x{:x} at 0x{:x}",
            index,
            section.name(),
            section.virtual_address,
            section.virtual_size,
            section.size_of_raw_data,
            section.pointer_to_raw_data
        );

        if copy_len > 0 {
            let Ok(destination) = target.translate_mut(address, copy_len as usize) else {
                log::warn!("Section {} overflows the image", index);
                return Err(Error::SectionOverflow {
                    index,
                    address: section.virtual_address,
                    size: copy_len,
                });
            };

            let Ok(data) = source.translate(section.pointer_to_raw_data as usize, copy_len as usize)
            else {
                log::warn!("Section {} raw data lies outside the file", index);
                return Err(Error::InvalidSectionSize("section data outside the raw image"));
            };

            destination.copy_from_slice(data);
        }

        let tail = section.virtual_size - copy_len;
        if tail > 0 {
            let tail_start = address + copy_len as usize;
            let Ok(padding) = target.translate_mut(tail_start, tail as usize) else {
                log::warn!("Section {} overflows the image", index);
                return Err(Error::SectionOverflow {
                    index,
                    address: section.virtual_address,
                    size: section.virtual_size,
                });
            };

            padding.fill(0);
        }
    }

    Ok(())
}
