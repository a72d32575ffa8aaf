use super::{Handle, LoadedImageRecord, Status, SystemTable};
use crate::{
    image::{ImageContext, LoadedImageBuffer},
    Error, Result,
};

/// Absolute entry address of a loaded, relocated image.
///
/// Resolved from the buffer the image lives in, so it is only meaningful while that buffer is
/// alive and unmoved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    address: u64,
    offset: u32,
}

impl EntryPoint {
    /// Resolves `AddressOfEntryPoint` against the buffer holding the image.
    ///
    /// # Errors
    /// Returns [`Error::InvalidEntryPoint`] unless the entry RVA lies strictly inside the image.
    pub fn resolve(context: &ImageContext, image: &LoadedImageBuffer) -> Result<Self> {
        let offset = context.entry_point();
        if offset as usize >= image.len() {
            log::warn!(
                "Entry point 0x{:x} outside image of 0x{:x} bytes",
                offset,
                image.len()
            );
            return Err(Error::InvalidEntryPoint(offset));
        }

        Ok(EntryPoint {
            address: image.address().wrapping_add(u64::from(offset)),
            offset,
        })
    }

    /// Absolute address of the first instruction.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.address
    }

    /// RVA of the first instruction.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }
}

/// Everything needed to transfer control to a loaded image.
#[derive(Debug, Clone, Copy)]
pub struct EntryCall<'a> {
    /// Where to jump
    pub entry: EntryPoint,
    /// Handle passed as the first argument, the launcher's own image handle
    pub image_handle: Handle,
    /// System table passed as the second argument
    pub system_table: SystemTable,
    /// The loaded-image record as rewritten for the child
    pub record: &'a LoadedImageRecord,
}

/// Transfers control to a loaded image and reports what it returned.
///
/// The call is synchronous and may never return if the child resets the platform or exits boot
/// services.
pub trait ImageStarter {
    /// Runs the image described by `call` to completion.
    fn start(&mut self, call: &EntryCall<'_>) -> Status;
}

/// Calls the entry point as a native UEFI image entry, `efiapi(ImageHandle, SystemTable)`.
#[cfg(target_arch = "x86_64")]
#[derive(Debug)]
pub struct NativeStarter {
    _private: (),
}

#[cfg(target_arch = "x86_64")]
impl NativeStarter {
    /// Creates the native starter.
    ///
    /// # Safety
    ///
    /// Every image this starter is given must sit in executable memory and contain code that
    /// follows the UEFI image entry ABI. On firmware, pool memory satisfies the first condition;
    /// in a hosted process it does not.
    #[must_use]
    pub unsafe fn new() -> Self {
        NativeStarter { _private: () }
    }
}

#[cfg(target_arch = "x86_64")]
impl ImageStarter for NativeStarter {
    fn start(&mut self, call: &EntryCall<'_>) -> Status {
        type ImageEntry = extern "efiapi" fn(Handle, SystemTable) -> Status;

        log::info!(
            "Transferring control to image entry at 0x{:x}",
            call.entry.address()
        );

        // SAFETY: guaranteed by the contract of `NativeStarter::new` and by the launcher, which
        // only starts fully loaded and relocated images whose buffer outlives this call
        let entry = unsafe { std::mem::transmute::<u64, ImageEntry>(call.entry.address()) };
        entry(call.image_handle, call.system_table)
    }
}

impl<S: ImageStarter + ?Sized> ImageStarter for &mut S {
    fn start(&mut self, call: &EntryCall<'_>) -> Status {
        (**self).start(call)
    }
}
