//! Verified loading and in-context start of a child image.
//!
//! [`Launcher::launch`] drives one load attempt through a fixed sequence of states:
//!
//! ```text
//! Idle -> HeaderParsed -> Validated -> Allocated -> Relocated -> Launched -> Returned
//!   ^          |              |            |            |
//!   +----------+--------------+------------+------------+   (any failure)
//! ```
//!
//! Every failure before `Launched` returns the launcher to `Idle`, hands the image buffer back
//! to its allocator and leaves the platform's [`LoadedImageRecord`] untouched. Once the image is
//! started, the record describes the child until it returns, then the previous contents are
//! restored and the child's status is passed up.
//!
//! # Example
//!
//! ```rust,no_run
//! use mokload::{
//!     platform::{DevicePath, Handle, LoadedImageRecord, SystemTable},
//!     security::Trust,
//!     BootTarget, Launcher, LoaderConfig, RawImage,
//! };
//! # use mokload::platform::{EntryCall, ImageStarter, Status};
//! # struct Firmware;
//! # impl ImageStarter for Firmware {
//! #     fn start(&mut self, _: &EntryCall<'_>) -> Status { Status::SUCCESS }
//! # }
//!
//! let image = RawImage::from_file(std::path::Path::new("grubx64.efi"))?;
//! let mut record = LoadedImageRecord::default();
//!
//! let verifier = |_: &[u8]| Trust::Trusted;
//! let mut launcher = Launcher::new(
//!     Handle::null(),
//!     SystemTable::default(),
//!     verifier,
//!     Firmware,
//!     LoaderConfig::new(),
//! );
//!
//! let target = BootTarget::new(Handle::null(), DevicePath::default());
//! let status = launcher.launch(image.data(), "root=/dev/sda2 ro", &target, &mut record)?;
//! println!("loader returned {status}");
//! # Ok::<(), mokload::Error>(())
//! ```

mod config;

pub use config::{LoaderConfig, VerifyPolicy};

use strum::{Display, EnumCount, EnumIter};
use widestring::U16CString;

use crate::{
    image::{
        load_sections, parse, relocate, ImageAllocator, ImageContext, LoadedImageBuffer,
        PoolAllocator,
    },
    platform::{
        DevicePath, EntryCall, EntryPoint, Handle, ImageStarter, LoadedImageRecord, RecordLease,
        Status, SystemTable,
    },
    security::{SecureBootState, Verifier},
    Error, Result,
};

/// Progress of the current or last load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumCount)]
pub enum LaunchState {
    /// No attempt in progress; also the state after an aborted attempt
    Idle,
    /// Headers decoded
    HeaderParsed,
    /// Trust check passed or skipped by policy
    Validated,
    /// Image buffer allocated and sections copied
    Allocated,
    /// Base relocations applied
    Relocated,
    /// Control handed to the child image
    Launched,
    /// The child returned and the record was restored
    Returned,
}

/// Device and file an image was read from, recorded in the child's loaded-image record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootTarget {
    /// Device holding the image file
    pub device_handle: Handle,
    /// Path of the image file on that device
    pub file_path: DevicePath,
}

impl BootTarget {
    /// Creates a boot target.
    #[must_use]
    pub fn new(device_handle: Handle, file_path: DevicePath) -> Self {
        BootTarget {
            device_handle,
            file_path,
        }
    }
}

/// Loads, verifies, relocates and starts images in the context of the running boot manager.
///
/// - `V` decides trust, see [`crate::security`]
/// - `S` transfers control, see [`ImageStarter`]
/// - `A` provides the image buffer, [`PoolAllocator`] unless replaced with
///   [`Launcher::with_allocator`]
#[derive(Debug)]
pub struct Launcher<V, S, A = PoolAllocator> {
    image_handle: Handle,
    system_table: SystemTable,
    verifier: V,
    starter: S,
    allocator: A,
    config: LoaderConfig,
    secure_boot: SecureBootState,
    state: LaunchState,
}

impl<V: Verifier, S: ImageStarter> Launcher<V, S> {
    /// Creates a launcher.
    ///
    /// `image_handle` and `system_table` are the boot manager's own entry arguments; they are
    /// passed on unchanged to every child image. Secure Boot is assumed enforcing until
    /// [`Launcher::with_secure_boot`] says otherwise.
    pub fn new(
        image_handle: Handle,
        system_table: SystemTable,
        verifier: V,
        starter: S,
        config: LoaderConfig,
    ) -> Self {
        Launcher {
            image_handle,
            system_table,
            verifier,
            starter,
            allocator: PoolAllocator::new(),
            config,
            secure_boot: SecureBootState::Enabled,
            state: LaunchState::Idle,
        }
    }
}

impl<V: Verifier, S: ImageStarter, A: ImageAllocator> Launcher<V, S, A> {
    /// Replaces the image allocator.
    pub fn with_allocator<B: ImageAllocator>(self, allocator: B) -> Launcher<V, S, B> {
        Launcher {
            image_handle: self.image_handle,
            system_table: self.system_table,
            verifier: self.verifier,
            starter: self.starter,
            allocator,
            config: self.config,
            secure_boot: self.secure_boot,
            state: self.state,
        }
    }

    /// Records the platform's Secure Boot state, usually from [`crate::security::secure_mode`].
    #[must_use]
    pub fn with_secure_boot(mut self, state: SecureBootState) -> Self {
        self.secure_boot = state;
        self
    }

    /// State reached by the current or last attempt.
    #[must_use]
    pub fn state(&self) -> LaunchState {
        self.state
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The image allocator.
    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// The trust verifier.
    #[must_use]
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// The control-transfer capability.
    #[must_use]
    pub fn starter(&self) -> &S {
        &self.starter
    }

    /// Loads `raw` and runs it as a child of the boot manager.
    ///
    /// `raw` is copied once up front. The verifier judges exactly the bytes that are laid out
    /// and started, even when `raw` is a mapping of a file that is modified mid-launch.
    ///
    /// `options` becomes the child's command line. `target` and the buffer's address and size
    /// are written into `record` for the duration of the child's execution only.
    ///
    /// # Errors
    ///
    /// Any [`Error`] from parsing, verification ([`Error::AccessDenied`]), allocation, section
    /// loading, relocation or entry-point resolution. In all of these cases `record` is left
    /// exactly as it was and no memory stays allocated.
    ///
    /// `Ok` carries the status the child returned, which may itself be an error.
    pub fn launch(
        &mut self,
        raw: &[u8],
        options: &str,
        target: &BootTarget,
        record: &mut LoadedImageRecord,
    ) -> Result<Status> {
        self.transition(LaunchState::Idle);

        let result = self.run(raw, options, target, record);
        if let Err(error) = &result {
            log::warn!("Image launch aborted: {} ({})", error, error.status());
            self.transition(LaunchState::Idle);
        }

        result
    }

    /// Like [`Launcher::launch`], folding an aborted attempt into its [`Status`].
    pub fn launch_status(
        &mut self,
        raw: &[u8],
        options: &str,
        target: &BootTarget,
        record: &mut LoadedImageRecord,
    ) -> Status {
        match self.launch(raw, options, target, record) {
            Ok(status) => status,
            Err(error) => error.status(),
        }
    }

    fn transition(&mut self, to: LaunchState) {
        if self.state != to {
            log::trace!("launcher {} -> {}", self.state, to);
        }
        self.state = to;
    }

    fn run(
        &mut self,
        raw: &[u8],
        options: &str,
        target: &BootTarget,
        record: &mut LoadedImageRecord,
    ) -> Result<Status> {
        if raw.is_empty() {
            return Err(Error::Empty);
        }

        // Parsing, verification and the section copy all read this one owned copy. `raw` may be
        // a file mapping that changes underneath the loader.
        let owned = snapshot(raw)?;
        let raw = owned.as_slice();

        let context = parse(raw)?;
        self.transition(LaunchState::HeaderParsed);

        self.validate(raw)?;
        self.transition(LaunchState::Validated);

        if let Some(max) = self.config.max_image_size {
            if context.image_size() > max {
                log::warn!(
                    "Image size 0x{:x} exceeds the configured limit 0x{:x}",
                    context.image_size(),
                    max
                );
                return Err(Error::OutOfResources(context.image_size() as usize));
            }
        }

        let mut image = load_sections(&context, raw, &mut self.allocator)?;
        self.transition(LaunchState::Allocated);

        let result = self.start(&context, &mut image, options, target, record);
        self.allocator.release(image);

        result
    }

    fn validate(&self, raw: &[u8]) -> Result<()> {
        let enforced = match self.config.verify_policy {
            VerifyPolicy::Always => true,
            VerifyPolicy::WhenSecureBoot => self.secure_boot.is_enforcing(),
        };

        if !enforced {
            log::warn!(
                "Secure Boot is {}, skipping signature verification",
                self.secure_boot
            );
            return Ok(());
        }

        if self.verifier.verify(raw).is_trusted() {
            Ok(())
        } else {
            log::error!("Image failed signature verification");
            Err(Error::AccessDenied)
        }
    }

    fn start(
        &mut self,
        context: &ImageContext,
        image: &mut LoadedImageBuffer,
        options: &str,
        target: &BootTarget,
        record: &mut LoadedImageRecord,
    ) -> Result<Status> {
        let address = image.address();
        let summary = relocate(context, image.as_mut_slice(), address)?;
        log::debug!(
            "image at 0x{:x}, {} fixups applied",
            address,
            summary.fixups
        );
        self.transition(LaunchState::Relocated);

        let entry = EntryPoint::resolve(context, image)?;

        let options = U16CString::from_str_truncate(options);
        let options_size = (options.len() + 1) * 2;
        let load_options_size =
            u32::try_from(options_size).map_err(|_| Error::OutOfResources(options_size))?;

        let status = {
            let mut lease = RecordLease::take(record);
            lease.device_handle = target.device_handle;
            lease.file_path = target.file_path;
            lease.load_options = options.as_ptr().cast();
            lease.load_options_size = load_options_size;
            lease.image_base = image.as_mut_slice().as_mut_ptr().cast();
            lease.image_size = image.len() as u64;
            self.transition(LaunchState::Launched);

            log::info!(
                "Starting image: entry 0x{:x}, size 0x{:x}",
                entry.address(),
                image.len()
            );

            let call = EntryCall {
                entry,
                image_handle: self.image_handle,
                system_table: self.system_table,
                record: &lease,
            };
            self.starter.start(&call)
        };

        self.transition(LaunchState::Returned);
        if status.is_error() {
            log::warn!("Image returned {}", status);
        } else {
            log::info!("Image returned {}", status);
        }

        Ok(status)
    }
}

fn snapshot(raw: &[u8]) -> Result<Vec<u8>> {
    let mut copy = Vec::new();
    copy.try_reserve_exact(raw.len())
        .map_err(|_| Error::OutOfResources(raw.len()))?;
    copy.extend_from_slice(raw);

    Ok(copy)
}
