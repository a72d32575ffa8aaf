use std::fmt;

const ERROR_BIT: usize = 1 << (usize::BITS - 1);

/// A firmware status code.
///
/// Errors have the most significant bit set; warnings and success do not.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Status(pub usize);

impl Status {
    /// The operation completed
    pub const SUCCESS: Status = Status(0);
    /// The image failed to load
    pub const LOAD_ERROR: Status = Status(ERROR_BIT | 1);
    /// A parameter was incorrect
    pub const INVALID_PARAMETER: Status = Status(ERROR_BIT | 2);
    /// The operation is not supported
    pub const UNSUPPORTED: Status = Status(ERROR_BIT | 3);
    /// A buffer was too small
    pub const BUFFER_TOO_SMALL: Status = Status(ERROR_BIT | 5);
    /// A resource ran out
    pub const OUT_OF_RESOURCES: Status = Status(ERROR_BIT | 9);
    /// The item was not found
    pub const NOT_FOUND: Status = Status(ERROR_BIT | 14);
    /// Access was denied
    pub const ACCESS_DENIED: Status = Status(ERROR_BIT | 15);
    /// The operation was aborted
    pub const ABORTED: Status = Status(ERROR_BIT | 21);
    /// A security policy was violated
    pub const SECURITY_VIOLATION: Status = Status(ERROR_BIT | 26);

    /// Returns `true` if the error bit is set.
    #[must_use]
    pub fn is_error(self) -> bool {
        self.0 & ERROR_BIT != 0
    }

    /// Returns `true` for [`Status::SUCCESS`].
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Status::SUCCESS
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Status::SUCCESS => "Success",
            Status::LOAD_ERROR => "Load Error",
            Status::INVALID_PARAMETER => "Invalid Parameter",
            Status::UNSUPPORTED => "Unsupported",
            Status::BUFFER_TOO_SMALL => "Buffer Too Small",
            Status::OUT_OF_RESOURCES => "Out of Resources",
            Status::NOT_FOUND => "Not Found",
            Status::ACCESS_DENIED => "Access Denied",
            Status::ABORTED => "Aborted",
            Status::SECURITY_VIOLATION => "Security Violation",
            _ => return None,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None if self.is_error() => write!(f, "Error {}", self.0 & !ERROR_BIT),
            None => write!(f, "Warning {}", self.0),
        }
    }
}
