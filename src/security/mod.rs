//! Trust decisions for images about to be loaded.
//!
//! The launcher never inspects signatures itself. It asks a [`Verifier`] once per load attempt,
//! before any memory is committed, and aborts with [`crate::Error::AccessDenied`] on anything
//! but [`Trust::Trusted`].
//!
//! Two bindings to the platform are provided:
//!
//! - [`ShimVerifier`] forwards to the shim lock protocol installed by a MOK-aware first-stage
//!   loader (x86-64 only)
//! - [`secure_mode`] reads the firmware's `SecureBoot`/`SetupMode` variables through a
//!   [`VariableStore`], which decides whether verification is enforced at all
//!
//! Any `Fn(&[u8]) -> Trust` closure is a [`Verifier`] as well:
//!
//! ```rust
//! use mokload::security::{Trust, Verifier};
//!
//! let deny_all = |_: &[u8]| Trust::Untrusted;
//! assert_eq!(deny_all.verify(b"MZ"), Trust::Untrusted);
//! ```

#[cfg(target_arch = "x86_64")]
mod shim;
mod variables;

#[cfg(target_arch = "x86_64")]
pub use shim::{ShimLock, ShimVerifier, SHIM_LOCK_GUID};
pub use variables::{secure_mode, SecureBootState, VariableStore, GLOBAL_VARIABLE_GUID};

use strum::Display;

/// Outcome of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Trust {
    /// The image may be started
    Trusted,
    /// The image must not be started
    Untrusted,
}

impl Trust {
    /// Returns `true` for [`Trust::Trusted`].
    #[must_use]
    pub fn is_trusted(self) -> bool {
        self == Trust::Trusted
    }
}

/// Decides whether a raw image may be loaded.
///
/// Implementations see the untouched file bytes, exactly as read from disk. They must be
/// fail-closed: a verifier that cannot reach its backing service answers
/// [`Trust::Untrusted`].
pub trait Verifier {
    /// Checks `image` against the platform trust database.
    fn verify(&self, image: &[u8]) -> Trust;
}

impl<F> Verifier for F
where
    F: Fn(&[u8]) -> Trust,
{
    fn verify(&self, image: &[u8]) -> Trust {
        self(image)
    }
}
