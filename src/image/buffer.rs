//! The final image buffer and the capability that allocates it.

use std::{
    alloc::{self, Layout},
    fmt,
    ptr::NonNull,
};

use crate::{Error, Result};

/// Alignment of every image buffer, one UEFI page.
pub const IMAGE_ALIGNMENT: usize = 0x1000;

/// Owned memory holding an image laid out at its section RVAs.
///
/// The buffer is exactly `SizeOfImage` bytes long, zero-initialised and starts on a
/// [`IMAGE_ALIGNMENT`] boundary. Its address is the actual load address the relocator rebases
/// the image for, so the buffer must not move between relocation and launch; it never
/// reallocates.
pub struct LoadedImageBuffer {
    data: NonNull<u8>,
    len: usize,
    layout: Layout,
}

impl LoadedImageBuffer {
    /// Allocates a zeroed, page-aligned buffer of `size` bytes from the global allocator.
    ///
    /// A `size` of zero is valid; the buffer is still backed by one aligned byte so its address
    /// is a real load address.
    ///
    /// # Errors
    /// Returns [`Error::OutOfResources`] if the memory cannot be reserved.
    pub fn zeroed(size: usize) -> Result<Self> {
        let layout = Layout::from_size_align(size.max(1), IMAGE_ALIGNMENT)
            .map_err(|_| Error::OutOfResources(size))?;

        // SAFETY: the layout has a non-zero size
        let data = unsafe { alloc::alloc_zeroed(layout) };
        let Some(data) = NonNull::new(data) else {
            return Err(Error::OutOfResources(size));
        };

        Ok(LoadedImageBuffer {
            data,
            len: size,
            layout,
        })
    }

    /// Address of the first byte of the image.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.data.as_ptr() as u64
    }

    /// Size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-sized image.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The image bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `data` points to `len` initialised bytes owned by this buffer
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// The image bytes, for section loading and relocation.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`, and `&mut self` makes the borrow unique
        unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }
}

impl Drop for LoadedImageBuffer {
    fn drop(&mut self) {
        // SAFETY: `data` was returned by `alloc_zeroed` with this exact layout
        unsafe { alloc::dealloc(self.data.as_ptr(), self.layout) };
    }
}

impl fmt::Debug for LoadedImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedImageBuffer")
            .field("address", &format_args!("0x{:x}", self.address()))
            .field("len", &self.len)
            .finish()
    }
}

impl PartialEq for LoadedImageBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for LoadedImageBuffer {}

/// Source of image buffers.
///
/// The section loader asks for exactly one buffer per load attempt and hands it back through
/// [`ImageAllocator::release`] on every failure path; the launcher releases it after the image
/// returns.
pub trait ImageAllocator {
    /// Allocates a zeroed buffer of `size` bytes.
    ///
    /// # Errors
    /// Returns [`Error::OutOfResources`] if the request cannot be satisfied.
    fn allocate(&mut self, size: usize) -> Result<LoadedImageBuffer>;

    /// Returns a buffer obtained from [`ImageAllocator::allocate`].
    fn release(&mut self, image: LoadedImageBuffer) {
        drop(image);
    }
}

/// Allocator backed by the global heap, which on firmware targets is the boot-services pool.
///
/// An optional limit rejects oversized images before any memory is reserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolAllocator {
    limit: Option<usize>,
}

impl PoolAllocator {
    /// Creates an allocator without a size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator that refuses requests larger than `limit` bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        PoolAllocator { limit: Some(limit) }
    }
}

impl ImageAllocator for PoolAllocator {
    fn allocate(&mut self, size: usize) -> Result<LoadedImageBuffer> {
        if matches!(self.limit, Some(limit) if size > limit) {
            log::warn!("Refusing to allocate 0x{:x} bytes for an image", size);
            return Err(Error::OutOfResources(size));
        }

        LoadedImageBuffer::zeroed(size)
    }
}
