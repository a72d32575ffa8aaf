//! Base relocation processing.
//!
//! The base relocation table is a sequence of blocks, each covering one 4 KiB page:
//!
//! ```text
//! +-------------------+-------------------+------------------------------+
//! | VirtualAddress u32| SizeOfBlock u32   | entries: u16 * (Size - 8) / 2 |
//! +-------------------+-------------------+------------------------------+
//! entry = type << 12 | offset within page
//! ```
//!
//! Each entry patches the field at `VirtualAddress + offset` by the difference between the
//! actual and the preferred load address, at the width its type names.

use strum::{Display, EnumCount, EnumIter, FromRepr};

use super::{
    view::ImageViewMut, FileCharacteristics, ImageContext, BASE_RELOCATION_DIRECTORY_INDEX,
};
use crate::{Error, Result};

const BLOCK_HEADER_SIZE: usize = 8;

/// Base relocation types the loader applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr, EnumIter, EnumCount)]
#[repr(u8)]
pub enum RelocationType {
    /// Padding, skipped
    #[strum(serialize = "ABSOLUTE")]
    Absolute = 0,
    /// Add the high 16 bits of the delta to a 16-bit field
    #[strum(serialize = "HIGH")]
    High = 1,
    /// Add the low 16 bits of the delta to a 16-bit field
    #[strum(serialize = "LOW")]
    Low = 2,
    /// Add the low 32 bits of the delta to a 32-bit field
    #[strum(serialize = "HIGHLOW")]
    HighLow = 3,
    /// Add the delta to a 64-bit field
    #[strum(serialize = "DIR64")]
    Dir64 = 10,
}

impl RelocationType {
    /// Width in bytes of the field this type patches.
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            RelocationType::Absolute => 0,
            RelocationType::High | RelocationType::Low => 2,
            RelocationType::HighLow => 4,
            RelocationType::Dir64 => 8,
        }
    }
}

/// What a call to [`relocate`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocationSummary {
    /// Relocation blocks walked
    pub blocks: usize,
    /// Fields patched, `ABSOLUTE` padding excluded
    pub fixups: usize,
    /// Delta added, `actual - preferred` modulo 2^64
    pub adjust: u64,
}

/// Rebases a loaded image for `actual_load_address`.
///
/// `image` is the buffer produced by [`super::load_sections`]; `actual_load_address` is where
/// that buffer lives. Blocks are walked in table order and entries in stored order. All
/// arithmetic wraps at the width of the patched field.
///
/// An empty relocation directory is a successful no-op. When an unknown relocation type is met
/// the walk stops with [`Error::UnknownRelocationType`]; fixups already applied by earlier
/// entries and blocks are left in place.
///
/// # Errors
///
/// - [`Error::NoRelocationEntry`] if the optional header declares no base relocation slot
/// - [`Error::RelocationOverflow`] if the table, a block or a fixup lies outside the image, or a
///   block is smaller than its header
/// - [`Error::UnknownRelocationType`] for any type other than those in [`RelocationType`]
///
/// # Examples
///
/// ```rust,no_run
/// use mokload::image::{load_sections, parse, relocate, PoolAllocator};
///
/// let raw = std::fs::read("grubx64.efi")?;
/// let context = parse(&raw)?;
/// let mut image = load_sections(&context, &raw, &mut PoolAllocator::new())?;
///
/// let address = image.address();
/// let summary = relocate(&context, image.as_mut_slice(), address)?;
/// assert_eq!(summary.adjust, address.wrapping_sub(context.image_address()));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn relocate(
    context: &ImageContext,
    image: &mut [u8],
    actual_load_address: u64,
) -> Result<RelocationSummary> {
    let adjust = actual_load_address.wrapping_sub(context.image_address());
    let mut summary = RelocationSummary {
        adjust,
        ..RelocationSummary::default()
    };

    let directory = context.base_relocation();
    if directory.is_empty()
        && !context
            .characteristics()
            .contains(FileCharacteristics::RELOCS_STRIPPED)
    {
        log::debug!("image carries no base relocations");
        return Ok(summary);
    }

    if context.number_of_rva_and_sizes() as usize <= BASE_RELOCATION_DIRECTORY_INDEX {
        log::warn!(
            "No relocation entry - {} data directories",
            context.number_of_rva_and_sizes()
        );
        return Err(Error::NoRelocationEntry(context.number_of_rva_and_sizes()));
    }

    let mut view = ImageViewMut::new(image);

    let table_start = directory.virtual_address as usize;
    if view.translate(table_start, directory.size as usize).is_err() {
        log::warn!(
            "Relocation table 0x{:x}+0x{:x} overflows the image",
            directory.virtual_address,
            directory.size
        );
        return Err(Error::RelocationOverflow("relocation table outside the image"));
    }
    let table_end = table_start + directory.size as usize;

    let mut block_start = table_start;
    while block_start < table_end {
        if table_end - block_start < BLOCK_HEADER_SIZE {
            return Err(Error::RelocationOverflow("truncated block header"));
        }

        let page: u32 = view.read(block_start)?;
        let size_of_block: u32 = view.read(block_start + 4)?;

        if (size_of_block as usize) < BLOCK_HEADER_SIZE {
            log::warn!(
                "Relocation block at 0x{:x} declares size 0x{:x}",
                block_start,
                size_of_block
            );
            return Err(Error::RelocationOverflow("block smaller than its header"));
        }

        let block_end = block_start + size_of_block as usize;
        if block_end > view.len() {
            log::warn!("Relocation block at 0x{:x} overflows the image", block_start);
            return Err(Error::RelocationOverflow("block extends past the image end"));
        }

        let mut entry_offset = block_start + BLOCK_HEADER_SIZE;
        while entry_offset + 2 <= block_end {
            // Read in place; a fixup may legitimately land inside the table itself
            let entry: u16 = view.read(entry_offset)?;
            let kind = (entry >> 12) as u8;
            let rva = page.wrapping_add(u32::from(entry & 0x0FFF));

            let Some(relocation) = RelocationType::from_repr(kind) else {
                log::warn!("Unknown relocation type {} at RVA 0x{:x}", kind, rva);
                return Err(Error::UnknownRelocationType { kind, rva });
            };

            if relocation != RelocationType::Absolute {
                let fixup = page as usize + usize::from(entry & 0x0FFF);
                apply(&mut view, relocation, fixup, adjust)
                    .map_err(|_| Error::RelocationOverflow("fixup outside the image"))?;
                summary.fixups += 1;
            }

            entry_offset += 2;
        }

        summary.blocks += 1;
        block_start = block_end;
    }

    log::debug!(
        "applied {} fixups in {} blocks, delta 0x{:x}",
        summary.fixups,
        summary.blocks,
        adjust
    );

    Ok(summary)
}

fn apply(
    view: &mut ImageViewMut,
    relocation: RelocationType,
    fixup: usize,
    adjust: u64,
) -> Result<()> {
    match relocation {
        RelocationType::Absolute => Ok(()),
        RelocationType::High => {
            let value: u16 = view.read(fixup)?;
            view.write(fixup, value.wrapping_add((adjust >> 16) as u16))
        }
        RelocationType::Low => {
            let value: u16 = view.read(fixup)?;
            view.write(fixup, value.wrapping_add(adjust as u16))
        }
        RelocationType::HighLow => {
            let value: u32 = view.read(fixup)?;
            view.write(fixup, value.wrapping_add(adjust as u32))
        }
        RelocationType::Dir64 => {
            let value: u64 = view.read(fixup)?;
            view.write(fixup, value.wrapping_add(adjust))
        }
    }
}
