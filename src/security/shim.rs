//! Binding to the shim lock protocol.

use std::ffi::c_void;

use uguid::{guid, Guid};

use super::{Trust, Verifier};
use crate::platform::Status;

/// GUID under which shim installs [`ShimLock`].
pub const SHIM_LOCK_GUID: Guid = guid!("605dab50-e046-4300-abb6-3dd810dd8b23");

/// Layout of the shim lock protocol interface.
///
/// Shim is built with the System V calling convention even on firmware that uses the Microsoft
/// x64 convention, so the slots are `sysv64`. Only `verify` is called; `hash` and `context` are
/// carried for layout.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ShimLock {
    /// Checks a complete PE image against db, dbx and the MOK list
    pub verify: unsafe extern "sysv64" fn(buffer: *const c_void, size: u32) -> Status,
    /// Authenticode hash helper, unused
    pub hash: *const c_void,
    /// Image context helper, unused
    pub context: *const c_void,
}

/// [`Verifier`] backed by an installed shim lock protocol.
///
/// Fails closed: without a located protocol every image is [`Trust::Untrusted`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ShimVerifier<'a> {
    protocol: Option<&'a ShimLock>,
}

impl<'a> ShimVerifier<'a> {
    /// Wraps the result of a protocol lookup; `None` when the lookup failed.
    #[must_use]
    pub fn new(protocol: Option<&'a ShimLock>) -> Self {
        ShimVerifier { protocol }
    }

    /// Wraps the interface pointer returned by the firmware's `LocateProtocol`.
    ///
    /// A null pointer behaves like a failed lookup.
    ///
    /// # Safety
    ///
    /// A non-null `protocol` must point to a valid [`ShimLock`] whose `verify` slot is a
    /// callable function, and the interface must stay installed for `'a`.
    #[must_use]
    pub unsafe fn from_raw(protocol: *const ShimLock) -> Self {
        // SAFETY: the caller guarantees validity for 'a of any non-null pointer
        ShimVerifier {
            protocol: unsafe { protocol.as_ref() },
        }
    }

    /// Returns `true` if a protocol instance is present.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.protocol.is_some()
    }
}

impl Verifier for ShimVerifier<'_> {
    fn verify(&self, image: &[u8]) -> Trust {
        let Some(protocol) = self.protocol else {
            log::warn!("Shim lock protocol not found, refusing image");
            return Trust::Untrusted;
        };

        let Ok(size) = u32::try_from(image.len()) else {
            log::warn!("Image of 0x{:x} bytes is too large for shim", image.len());
            return Trust::Untrusted;
        };

        // SAFETY: the protocol was valid at construction; shim only reads `size` bytes
        let status = unsafe { (protocol.verify)(image.as_ptr().cast(), size) };
        if status.is_success() {
            Trust::Trusted
        } else {
            log::warn!("Shim rejected image: {}", status);
            Trust::Untrusted
        }
    }
}
