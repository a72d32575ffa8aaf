//! Firmware-facing value types.
//!
//! The loader runs inside a UEFI application but talks to the firmware only through the types in
//! this module:
//!
//! - [`Status`] - firmware status codes, the currency every launch ends in
//! - [`Handle`], [`SystemTable`], [`DevicePath`] - opaque firmware pointers passed through
//! - [`LoadedImageRecord`] - the loaded-image protocol record describing the running image
//! - [`RecordLease`] - scoped save/restore of that record while a child image runs
//! - [`EntryPoint`] and [`ImageStarter`] - the resolved entry address and the control transfer
//!
//! All pointer wrappers are `#[repr(transparent)]`, and [`LoadedImageRecord`] is `#[repr(C)]`,
//! so references to them may be shared with firmware directly.

mod entry;
mod lease;
mod record;
mod status;

#[cfg(target_arch = "x86_64")]
pub use entry::NativeStarter;
pub use entry::{EntryCall, EntryPoint, ImageStarter};
pub use lease::RecordLease;
pub use record::{
    DevicePath, Handle, LoadedImageRecord, SystemTable, LOADED_IMAGE_PROTOCOL_GUID,
    LOADED_IMAGE_REVISION,
};
pub use status::Status;
