//! Shared fixtures for unit tests.
//!
//! - [`PeBuilder`] assembles small but well-formed PE32+ images byte by byte
//! - [`CountingAllocator`], [`CountingVerifier`] and [`RecordingStarter`] stand in for the
//!   firmware capabilities the launcher is generic over

mod platform;

pub use builder::{reloc_entry, PeBuilder, TestSection};
pub use platform::{CountingAllocator, CountingVerifier, RecordingStarter};
