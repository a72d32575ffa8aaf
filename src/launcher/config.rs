//! Launcher configuration.

use strum::Display;

/// When the launcher consults its [`crate::security::Verifier`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum VerifyPolicy {
    /// Verify every image, whatever the platform state
    #[default]
    Always,
    /// Verify only while Secure Boot is enforcing
    WhenSecureBoot,
}

/// Configuration for a [`crate::Launcher`].
///
/// # Example
///
/// ```rust
/// use mokload::launcher::{LoaderConfig, VerifyPolicy};
///
/// let config = LoaderConfig::new()
///     .with_verify_policy(VerifyPolicy::WhenSecureBoot)
///     .with_max_image_size(64 * 1024 * 1024);
/// assert_eq!(config.max_image_size, Some(0x400_0000));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Whether signature verification may be skipped when Secure Boot is off.
    ///
    /// Defaults to [`VerifyPolicy::Always`].
    pub verify_policy: VerifyPolicy,

    /// Upper bound on `SizeOfImage`.
    ///
    /// Images declaring a larger size are refused with [`crate::Error::OutOfResources`] before
    /// any memory is requested. `None` (default) leaves the decision to the allocator.
    pub max_image_size: Option<u32>,
}

impl LoaderConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the verification policy.
    #[must_use]
    pub fn with_verify_policy(mut self, policy: VerifyPolicy) -> Self {
        self.verify_policy = policy;
        self
    }

    /// Refuses images whose `SizeOfImage` exceeds `max` bytes.
    #[must_use]
    pub fn with_max_image_size(mut self, max: u32) -> Self {
        self.max_image_size = Some(max);
        self
    }

    /// Removes the image size bound.
    #[must_use]
    pub fn without_max_image_size(mut self) -> Self {
        self.max_image_size = None;
        self
    }
}
