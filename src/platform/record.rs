use std::ffi::c_void;

use uguid::{guid, Guid};

/// GUID of the loaded-image protocol whose interface is a [`LoadedImageRecord`].
pub const LOADED_IMAGE_PROTOCOL_GUID: Guid = guid!("5b1b31a1-9562-11d2-8e3f-00a0c969723b");

/// Current revision of [`LoadedImageRecord`].
pub const LOADED_IMAGE_REVISION: u32 = 0x1000;

/// Opaque firmware handle.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(*mut c_void);

impl Handle {
    /// Wraps a raw handle.
    #[must_use]
    pub const fn from_ptr(ptr: *mut c_void) -> Self {
        Handle(ptr)
    }

    /// The null handle.
    #[must_use]
    pub const fn null() -> Self {
        Handle(std::ptr::null_mut())
    }

    /// The raw handle.
    #[must_use]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }

    /// Returns `true` for the null handle.
    #[must_use]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for Handle {
    fn default() -> Self {
        Handle::null()
    }
}

/// Pointer to the firmware system table, handed unchanged to launched images.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemTable(*mut c_void);

impl SystemTable {
    /// Wraps a raw system table pointer.
    #[must_use]
    pub const fn from_ptr(ptr: *mut c_void) -> Self {
        SystemTable(ptr)
    }

    /// The raw pointer.
    #[must_use]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

impl Default for SystemTable {
    fn default() -> Self {
        SystemTable(std::ptr::null_mut())
    }
}

/// Pointer to a firmware device path naming an image file.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePath(*const c_void);

impl DevicePath {
    /// Wraps a raw device path pointer.
    #[must_use]
    pub const fn from_ptr(ptr: *const c_void) -> Self {
        DevicePath(ptr)
    }

    /// The raw pointer.
    #[must_use]
    pub const fn as_ptr(self) -> *const c_void {
        self.0
    }
}

impl Default for DevicePath {
    fn default() -> Self {
        DevicePath(std::ptr::null())
    }
}

/// The loaded-image protocol record of the running image.
///
/// Field order and widths follow the firmware's `EFI_LOADED_IMAGE_PROTOCOL`, so a reference
/// obtained from `HandleProtocol` can be used as `&mut LoadedImageRecord` directly. When the
/// boot manager starts a child image in its own context, it rewrites this record to describe the
/// child and restores it once the child returns; see [`crate::platform::RecordLease`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImageRecord {
    /// Structure revision
    pub revision: u32,
    /// Image that loaded this one
    pub parent_handle: Handle,
    /// System table of the running image
    pub system_table: SystemTable,
    /// Device the image was loaded from
    pub device_handle: Handle,
    /// File path of the image on `device_handle`
    pub file_path: DevicePath,
    /// Reserved, null
    pub reserved: *const c_void,
    /// Size of `load_options` in bytes
    pub load_options_size: u32,
    /// NUL-terminated UTF-16 command line
    pub load_options: *const c_void,
    /// First byte of the loaded image
    pub image_base: *mut c_void,
    /// Size of the loaded image in bytes
    pub image_size: u64,
    /// Memory type of the code sections
    pub image_code_type: u32,
    /// Memory type of the data sections
    pub image_data_type: u32,
    /// Unload hook, opaque here
    pub unload: *const c_void,
}

impl Default for LoadedImageRecord {
    fn default() -> Self {
        LoadedImageRecord {
            revision: LOADED_IMAGE_REVISION,
            parent_handle: Handle::null(),
            system_table: SystemTable::default(),
            device_handle: Handle::null(),
            file_path: DevicePath::default(),
            reserved: std::ptr::null(),
            load_options_size: 0,
            load_options: std::ptr::null(),
            image_base: std::ptr::null_mut(),
            image_size: 0,
            image_code_type: 0,
            image_data_type: 0,
            unload: std::ptr::null(),
        }
    }
}
