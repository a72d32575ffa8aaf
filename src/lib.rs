// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
// - 'file/physical.rs' uses mmap to map a file into memory
// - 'image/buffer.rs' allocates page-aligned image memory
// - 'platform/entry.rs' transmutes the entry address into a function pointer
// - 'security/shim.rs' calls through the shim lock protocol

//! # mokload
//!
//! [![Crates.io](https://img.shields.io/crates/v/mokload.svg)](https://crates.io/crates/mokload)
//! [![Documentation](https://docs.rs/mokload/badge.svg)](https://docs.rs/mokload)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/mokload/blob/main/LICENSE-APACHE)
//!
//! A secure-validated PE32+ image loader for UEFI boot managers. `mokload` takes an untrusted
//! loader binary that has already been read from disk, asks the platform's trust verifier
//! (shim/MOK under Secure Boot) whether it may run, lays it out in freshly allocated memory,
//! applies its base relocations and starts it in the boot manager's own context, restoring the
//! loaded-image record once it returns.
//!
//! ## Features
//!
//! - **🛡️ Verify before commit** - The trust check runs before a single byte is allocated
//! - **📏 Bounds-checked decoding** - Every header-derived offset is translated through a checked view
//! - **🔧 Full relocation support** - `ABSOLUTE`, `HIGH`, `LOW`, `HIGHLOW` and `DIR64` fixups
//! - **♻️ Guaranteed restore** - The loaded-image record is leased and restored on every exit path
//! - **🧩 Injectable platform** - Verifier, allocator and control transfer are traits
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! mokload = "0.1"
//! ```
//!
//! ### Loading an image step by step
//!
//! ```rust,no_run
//! use mokload::prelude::*;
//!
//! let raw = RawImage::from_file("EFI/ubuntu/grubx64.efi".as_ref())?;
//! let context = image::parse(raw.data())?;
//!
//! let mut buffer = image::load_sections(&context, raw.data(), &mut PoolAllocator::new())?;
//! let address = buffer.address();
//! let summary = image::relocate(&context, buffer.as_mut_slice(), address)?;
//!
//! println!(
//!     "{} fixups, entry at 0x{:x}",
//!     summary.fixups,
//!     address + u64::from(context.entry_point())
//! );
//! # Ok::<(), mokload::Error>(())
//! ```
//!
//! ### Launching
//!
//! [`Launcher`] runs the whole pipeline; see [`launcher`] for a complete example.
//!
//! ## Architecture
//!
//! - [`file`] - Raw image sources and the little-endian decoding primitives
//! - [`image`] - Header parsing, section loading and relocation
//! - [`security`] - Trust verification and Secure Boot state
//! - [`platform`] - Firmware status codes, handles and the loaded-image record
//! - [`launcher`] - The load-and-start state machine
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Each [`Error`] maps onto a firmware status
//! with [`Error::status`], which is what a boot manager reports back to its menu.
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo install cargo-fuzz
//! cargo +nightly fuzz run image --release
//! cargo +nightly fuzz run image --release -- -jobs=4 -fork=1
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use mokload::prelude::*;
///
/// assert!(matches!(image::parse(&[0u8; 4]), Err(Error::InvalidImage(_))));
/// ```
pub mod prelude;

pub mod file;
pub mod image;
pub mod launcher;
pub mod platform;
pub mod security;

/// `mokload` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use mokload::{image::{parse, ImageContext}, Result};
///
/// fn context_of(path: &str) -> Result<ImageContext> {
///     let data = std::fs::read(path)?;
///     parse(&data)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;

/// Raw image sources.
///
/// ```rust
/// use mokload::{Error, RawImage};
///
/// assert!(matches!(RawImage::from_mem(Vec::new()), Err(Error::Empty)));
/// ```
pub use file::{parser::Parser, RawImage};

pub use launcher::{BootTarget, LaunchState, Launcher, LoaderConfig, VerifyPolicy};
