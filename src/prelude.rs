//! # mokload Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the mokload library. Import this module to get quick access to everything needed to
//! load and start an image.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all mokload operations
pub use crate::Error;

/// The result type used throughout mokload
pub use crate::Result;

// ================================================================================================
// Raw Input
// ================================================================================================

/// Untrusted image bytes, owned or memory-mapped
pub use crate::RawImage;

/// Low-level decoding cursor
pub use crate::Parser;

// ================================================================================================
// Image Pipeline
// ================================================================================================

/// The image stages as a module, for `image::parse` and friends
pub use crate::image;

/// Types produced and consumed by the image stages
pub use crate::image::{
    ImageAllocator, ImageContext, LoadedImageBuffer, PoolAllocator, RelocationSummary,
    RelocationType,
};

// ================================================================================================
// Trust
// ================================================================================================

/// Verification capability and its answers
pub use crate::security::{secure_mode, SecureBootState, Trust, VariableStore, Verifier};

// ================================================================================================
// Platform and Launch
// ================================================================================================

/// Firmware-facing values
pub use crate::platform::{
    DevicePath, EntryPoint, Handle, ImageStarter, LoadedImageRecord, Status, SystemTable,
};

/// The launcher and its configuration
pub use crate::{BootTarget, LaunchState, Launcher, LoaderConfig, VerifyPolicy};
