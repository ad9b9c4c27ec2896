//! Result for thread manager calls.
//!
//! The thread manager reports success with a non-negative return value and
//! failure with a negative one. Seen as unsigned, a failure code always has the
//! top bit set (`0x8xxx_xxxx`). The raw layer ([`crate::raw`]) hands failures
//! up as [`Error`], which keeps the code verbatim so that the typed wrappers can
//! classify it.

use core::fmt;

use crate::error::KernelError;

/// Type alias for Result with [`Error`] as the error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The raw representation of a thread manager error code.
pub type ResultCode = u32;

/// A thread manager error code.
///
/// # Formatting
///
/// The code is displayed in the usual `0x8002xxxx` form:
///
/// ```rust
/// use vita_svc::{error::KernelError, result::Error};
///
/// let err = Error::from(KernelError::WaitTimeout);
/// assert_eq!(format!("{}", err), "0x80028007");
/// ```
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct Error(ResultCode);

impl Error {
    /// Wraps a raw error code.
    #[inline]
    pub const fn from_raw(rc: ResultCode) -> Self {
        Self(rc)
    }

    /// Returns the raw code, used by the typed wrappers to classify the error.
    #[inline]
    pub const fn description(&self) -> ResultCode {
        self.0
    }

    /// Returns the raw value of this error code.
    #[inline]
    pub const fn to_raw(self) -> ResultCode {
        self.0
    }

    /// Returns the known kernel error this code corresponds to, if any.
    #[inline]
    pub fn kind(&self) -> Option<KernelError> {
        KernelError::try_from(self.0).ok()
    }

    /// Returns `true` if the code is the kernel's wait-timeout code.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        KernelError::WaitTimeout == self.0
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Error");
        d.field("code", &format_args!("{}", self));
        match self.kind() {
            Some(kind) => d.field("kind", &kind),
            None => d.field("kind", &format_args!("<unknown>")),
        };
        d.finish()
    }
}

impl core::error::Error for Error {}

impl From<KernelError> for Error {
    fn from(value: KernelError) -> Self {
        Self(value.to_rc())
    }
}
