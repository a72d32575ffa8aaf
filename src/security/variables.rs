//! Secure Boot mode detection from firmware variables.

use strum::Display;
use uguid::{guid, Guid};
use widestring::{u16cstr, U16CStr};

/// Vendor GUID of the architectural firmware variables.
pub const GLOBAL_VARIABLE_GUID: Guid = guid!("8be4df61-93ca-11d2-aa0d-00e098032b8c");

const SECURE_BOOT: &U16CStr = u16cstr!("SecureBoot");
const SETUP_MODE: &U16CStr = u16cstr!("SetupMode");

/// Read access to firmware variables, the runtime-services `GetVariable` call.
pub trait VariableStore {
    /// Returns the contents of variable `name` under `vendor`, or `None` if it does not exist
    /// or cannot be read.
    fn get_variable(&self, name: &U16CStr, vendor: &Guid) -> Option<Vec<u8>>;
}

/// Secure Boot enforcement state of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SecureBootState {
    /// Secure Boot is on and the platform is in user mode
    Enabled,
    /// Secure Boot is off or its variable is missing
    Disabled,
    /// Secure Boot is on but the platform key is not enrolled yet
    SetupMode,
}

impl SecureBootState {
    /// Returns `true` if unsigned images must be refused.
    #[must_use]
    pub fn is_enforcing(self) -> bool {
        self == SecureBootState::Enabled
    }
}

/// A flag variable is set only if it holds exactly the single byte `1`.
fn flag_set(value: Option<Vec<u8>>) -> bool {
    matches!(value.as_deref(), Some([1]))
}

/// Determines whether the platform enforces Secure Boot.
///
/// Both variables are one-byte flags. `SecureBoot` must hold exactly the byte `1`; a
/// `SetupMode` holding exactly `1` then downgrades the result to [`SecureBootState::SetupMode`].
/// A value of any other length does not count as set, the same as a firmware `GetVariable`
/// into a one-byte buffer failing with `BUFFER_TOO_SMALL`.
pub fn secure_mode<S: VariableStore + ?Sized>(store: &S) -> SecureBootState {
    if !flag_set(store.get_variable(SECURE_BOOT, &GLOBAL_VARIABLE_GUID)) {
        log::debug!("Secure Boot disabled");
        return SecureBootState::Disabled;
    }

    if flag_set(store.get_variable(SETUP_MODE, &GLOBAL_VARIABLE_GUID)) {
        log::debug!("Secure Boot enabled, platform in setup mode");
        return SecureBootState::SetupMode;
    }

    SecureBootState::Enabled
}
