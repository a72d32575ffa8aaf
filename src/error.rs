use thiserror::Error;

use crate::platform::Status;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant describes why a single load attempt was aborted. None of them are fatal to the
/// boot manager: the caller reports the failure and re-presents its selection menu. Each error
/// maps onto the firmware status code the boot manager hands back through [`Error::status`].
///
/// # Error Categories
///
/// ## Header validation
/// - [`Error::InvalidImage`] - Buffer too small or header fields inconsistent
/// - [`Error::UnsupportedImageType`] - PE signature missing
/// - [`Error::UnsupportedRelocationsStripped`] - Image cannot be rebased
/// - [`Error::UnsupportedArchitecture`] - Not a PE32+ image
/// - [`Error::MalformedSecurityHeader`] - Certificate table outside the buffer
///
/// ## Trust and resources
/// - [`Error::AccessDenied`] - Signature verification rejected the image
/// - [`Error::OutOfResources`] - The image buffer could not be allocated
///
/// ## Section and relocation processing
/// - [`Error::InvalidSectionSize`] - Section source data outside the raw buffer
/// - [`Error::SectionOverflow`] - Section destination outside the image
/// - [`Error::NoRelocationEntry`] - Base relocation directory slot absent
/// - [`Error::RelocationOverflow`] - Relocation block or fixup outside the image
/// - [`Error::UnknownRelocationType`] - Unsupported fixup kind
/// - [`Error::InvalidEntryPoint`] - Entry point outside the image
///
/// ## Input
/// - [`Error::Empty`] - No image bytes were provided
/// - [`Error::OutOfBounds`] - Raw bounds-checked access failed
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust,no_run
/// use mokload::{Error, image};
///
/// let data = std::fs::read("grubx64.efi")?;
/// match image::parse(&data) {
///     Ok(context) => println!("entry point at RVA 0x{:x}", context.entry_point()),
///     Err(Error::UnsupportedArchitecture(magic)) => eprintln!("not PE32+: 0x{magic:04x}"),
///     Err(error) => eprintln!("rejected: {error} ({})", error.status()),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Header validation
    /// The buffer does not hold a structurally valid image.
    ///
    /// Raised when the buffer is smaller than a DOS header, when the PE header offset plus the
    /// NT header size runs past the buffer, or when `SizeOfImage` is smaller than
    /// `SizeOfHeaders`. The message names the failed check.
    #[error("Invalid image - {0}")]
    InvalidImage(&'static str),

    /// The PE signature at the header offset is not `PE\0\0`.
    ///
    /// The associated value is the signature that was found instead.
    #[error("Unsupported image type - signature 0x{0:08x}")]
    UnsupportedImageType(u32),

    /// The COFF characteristics mark base relocations as stripped.
    ///
    /// Such images can only run at their preferred base, which the boot manager cannot
    /// guarantee, so they are refused outright.
    #[error("Unsupported image - relocations have been stripped")]
    UnsupportedRelocationsStripped,

    /// The optional header is not the PE32+ variant.
    ///
    /// The associated value is the optional header magic that was found.
    #[error("Unsupported architecture - optional header magic 0x{0:04x}")]
    UnsupportedArchitecture(u16),

    /// The security directory does not lie entirely within the buffer.
    #[error("Malformed security header - 0x{address:x}+0x{size:x} exceeds 0x{len:x} bytes")]
    MalformedSecurityHeader {
        /// File offset of the certificate table
        address: u32,
        /// Size of the certificate table
        size: u32,
        /// Length of the raw buffer
        len: usize,
    },

    // Trust and resources
    /// The signature validator did not trust the image.
    ///
    /// Returned before any memory has been committed for the image.
    #[error("Access denied - image signature was not accepted")]
    AccessDenied,

    /// The final image buffer could not be allocated.
    ///
    /// The associated value is the requested size in bytes.
    #[error("Out of resources - could not allocate 0x{0:x} bytes")]
    OutOfResources(usize),

    // Section and relocation processing
    /// A section's source data, the section table, or the header block lies outside the raw
    /// buffer.
    #[error("Invalid section size - {0}")]
    InvalidSectionSize(&'static str),

    /// A section's destination range lies outside the allocated image.
    #[error("Section {index} overflows the image - 0x{address:x}+0x{size:x}")]
    SectionOverflow {
        /// Index of the offending section
        index: usize,
        /// `VirtualAddress` of the section
        address: u32,
        /// Number of bytes that would have been written
        size: u32,
    },

    /// The image carries relocations but declares too few data directories to hold the base
    /// relocation slot.
    #[error("No relocation entry - only {0} data directories present")]
    NoRelocationEntry(u32),

    /// A relocation block or fixup target lies outside the image.
    #[error("Relocation overflow - {0}")]
    RelocationOverflow(&'static str),

    /// A relocation entry uses a fixup kind this loader does not implement.
    ///
    /// Fixups applied before the offending entry stay in the image.
    #[error("Unknown relocation type {kind} at RVA 0x{rva:x}")]
    UnknownRelocationType {
        /// Relocation type from the upper four bits of the entry
        kind: u8,
        /// RVA the entry would have patched
        rva: u32,
    },

    /// The entry point RVA does not resolve inside the loaded image.
    #[error("Invalid entry point - RVA 0x{0:x}")]
    InvalidEntryPoint(u32),

    // Input
    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// An out of bound access was attempted.
    ///
    /// Produced by the low-level view and codec helpers. The loader stages translate it into
    /// their specific error before it reaches the caller.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors raised while opening or mapping an image from disk.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

impl Error {
    /// Returns the firmware status code reported for this error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mokload::{platform::Status, Error};
    ///
    /// assert_eq!(Error::AccessDenied.status(), Status::ACCESS_DENIED);
    /// assert_eq!(Error::InvalidEntryPoint(0x1000).status(), Status::UNSUPPORTED);
    /// ```
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Error::Empty | Error::FileError(_) => Status::LOAD_ERROR,
            Error::MalformedSecurityHeader { .. } => Status::INVALID_PARAMETER,
            Error::AccessDenied => Status::ACCESS_DENIED,
            Error::OutOfResources(_) => Status::OUT_OF_RESOURCES,
            Error::InvalidImage(_)
            | Error::UnsupportedImageType(_)
            | Error::UnsupportedRelocationsStripped
            | Error::UnsupportedArchitecture(_)
            | Error::InvalidSectionSize(_)
            | Error::SectionOverflow { .. }
            | Error::NoRelocationEntry(_)
            | Error::RelocationOverflow(_)
            | Error::UnknownRelocationType { .. }
            | Error::InvalidEntryPoint(_)
            | Error::OutOfBounds => Status::UNSUPPORTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Empty.status(), Status::LOAD_ERROR);
        assert_eq!(
            Error::MalformedSecurityHeader {
                address: 0x1000,
                size: 0x10,
                len: 0x800
            }
            .status(),
            Status::INVALID_PARAMETER
        );
        assert_eq!(Error::AccessDenied.status(), Status::ACCESS_DENIED);
        assert_eq!(Error::OutOfResources(0x4000).status(), Status::OUT_OF_RESOURCES);
        assert_eq!(
            Error::InvalidImage("too small").status(),
            Status::UNSUPPORTED
        );
        assert_eq!(
            Error::UnknownRelocationType { kind: 5, rva: 0 }.status(),
            Status::UNSUPPORTED
        );
        assert!(Error::RelocationOverflow("block").status().is_error());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::UnsupportedArchitecture(0x10B).to_string(),
            "Unsupported architecture - optional header magic 0x010b"
        );
        assert_eq!(
            Error::UnknownRelocationType { kind: 4, rva: 0x1010 }.to_string(),
            "Unknown relocation type 4 at RVA 0x1010"
        );
        assert_eq!(
            Error::InvalidSectionSize("raw data outside buffer").to_string(),
            "Invalid section size - raw data outside buffer"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: Error = io.into();
        assert!(matches!(error, Error::FileError(_)));
        assert_eq!(error.status(), Status::LOAD_ERROR);
    }
}
