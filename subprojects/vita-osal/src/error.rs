//! The closed result taxonomy of the OS abstraction layer.
//!
//! Every fallible operation of [`Osal`](crate::Osal) fails with an [`Error`].
//! The typed errors of the lower layers are folded into it by the `From`
//! impls below; [`Error::to_raw`] and [`OsResult`] give the numeric codes the
//! pthread layer expects.

use core::fmt;

use static_assertions::const_assert_eq;
use vita_svc::{
    sync::{
        CreateObjectError, DeleteObjectError, LockMutexError, SignalSemaError, UnlockMutexError,
        WaitSemaError,
    },
    thread::{StartThreadError, ThreadAffinityError, ThreadPriorityError},
};
use vita_sys_thread::{
    CancelError, CreateError, DeleteError, InitError, LookupError, PriorityAccessError,
    RegistryError, cancel::CancellableWaitError, priority::PriorityError,
};
use vita_sys_thread_tls::TlsError;

/// Error type of the OS abstraction layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A fixed-size table or a kernel allocation is exhausted.
    #[error("No resources left")]
    NoResources,
    /// The kernel reported an unexpected failure.
    #[error("General failure")]
    GeneralFailure,
    /// A bounded wait expired.
    #[error("Operation timed out")]
    Timeout,
    /// A cancellable wait observed a cancellation request.
    #[error("Operation interrupted by a cancellation request")]
    Interrupted,
    /// An argument is out of range or names an unknown object.
    #[error("Invalid parameter")]
    InvalidParam,
    /// The layer was used before [`Osal::init`](crate::Osal::init).
    #[error("OS abstraction layer not initialized")]
    NotInitialized,
}

impl Error {
    /// Returns the raw result code.
    ///
    /// `NotInitialized` has no code of its own and reports as a general
    /// failure.
    pub const fn to_raw(self) -> i32 {
        self.to_result() as i32
    }

    /// Returns the matching [`OsResult`].
    pub const fn to_result(self) -> OsResult {
        match self {
            Self::NoResources => OsResult::NoResources,
            Self::GeneralFailure | Self::NotInitialized => OsResult::GeneralFailure,
            Self::Timeout => OsResult::Timeout,
            Self::Interrupted => OsResult::Interrupted,
            Self::InvalidParam => OsResult::InvalidParam,
        }
    }

    /// Logs a lower-layer failure and folds it into `self`.
    fn logged(self, err: impl fmt::Display) -> Self {
        log::warn!("{self}: {err}");
        self
    }
}

/// Raw result codes, as returned across the C boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OsResult {
    Ok = 0,
    NoResources = 1,
    GeneralFailure = 2,
    Timeout = 3,
    Interrupted = 4,
    InvalidParam = 5,
}

const_assert_eq!(OsResult::Ok as i32, 0);
const_assert_eq!(OsResult::InvalidParam as i32, 5);

impl<T> From<&Result<T, Error>> for OsResult {
    fn from(result: &Result<T, Error>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(err) => err.to_result(),
        }
    }
}

impl<T> From<Result<T, Error>> for OsResult {
    fn from(result: Result<T, Error>) -> Self {
        Self::from(&result)
    }
}

impl From<OsResult> for i32 {
    fn from(result: OsResult) -> Self {
        result as i32
    }
}

impl From<PriorityError> for Error {
    fn from(_: PriorityError) -> Self {
        Self::InvalidParam
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Full => Self::NoResources,
            RegistryError::Reserved(_) => Self::InvalidParam,
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<LookupError> for Error {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotInitialized => Self::NotInitialized,
            LookupError::UnknownThread(_) => Self::InvalidParam,
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<InitError> for Error {
    fn from(err: InitError) -> Self {
        match err {
            InitError::Signal(err) => err.into(),
            InitError::Registry(err) => err.into(),
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<CreateError> for Error {
    fn from(err: CreateError) -> Self {
        match err {
            CreateError::InvalidPriority(err) => err.into(),
            CreateError::Init(err) => err.into(),
            CreateError::Registry(err) => err.into(),
            CreateError::Signal(err) => err.into(),
            CreateError::OutOfMemory => Self::NoResources.logged("kernel out of memory"),
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<DeleteError> for Error {
    fn from(err: DeleteError) -> Self {
        match err {
            DeleteError::Lookup(err) => err.into(),
            DeleteError::Registry(err) => err.into(),
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<CancelError> for Error {
    fn from(err: CancelError) -> Self {
        match err {
            CancelError::Lookup(err) => err.into(),
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl<E: fmt::Display> From<CancellableWaitError<E>> for Error {
    fn from(err: CancellableWaitError<E>) -> Self {
        match err {
            CancellableWaitError::Interrupted => Self::Interrupted,
            CancellableWaitError::TimedOut => Self::Timeout,
            CancellableWaitError::Lookup(err) => err.into(),
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<StartThreadError> for Error {
    fn from(err: StartThreadError) -> Self {
        match err {
            StartThreadError::InvalidId => Self::InvalidParam,
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<PriorityAccessError> for Error {
    fn from(err: PriorityAccessError) -> Self {
        match err {
            PriorityAccessError::Translate(err) => err.into(),
            PriorityAccessError::Native(err) => err.into(),
        }
    }
}

impl From<ThreadPriorityError> for Error {
    fn from(err: ThreadPriorityError) -> Self {
        match err {
            ThreadPriorityError::InvalidPriority | ThreadPriorityError::InvalidId => {
                Self::InvalidParam
            }
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<ThreadAffinityError> for Error {
    fn from(err: ThreadAffinityError) -> Self {
        match err {
            ThreadAffinityError::InvalidMask | ThreadAffinityError::InvalidId => {
                Self::InvalidParam
            }
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<CreateObjectError> for Error {
    fn from(err: CreateObjectError) -> Self {
        Self::GeneralFailure.logged(err)
    }
}

impl From<DeleteObjectError> for Error {
    fn from(err: DeleteObjectError) -> Self {
        Self::GeneralFailure.logged(err)
    }
}

impl From<LockMutexError> for Error {
    fn from(err: LockMutexError) -> Self {
        match err {
            LockMutexError::TimedOut => Self::Timeout,
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<UnlockMutexError> for Error {
    fn from(err: UnlockMutexError) -> Self {
        Self::GeneralFailure.logged(err)
    }
}

impl From<SignalSemaError> for Error {
    fn from(err: SignalSemaError) -> Self {
        Self::GeneralFailure.logged(err)
    }
}

impl From<WaitSemaError> for Error {
    fn from(err: WaitSemaError) -> Self {
        match err {
            WaitSemaError::TimedOut => Self::Timeout,
            err => Self::GeneralFailure.logged(err),
        }
    }
}

impl From<TlsError> for Error {
    fn from(err: TlsError) -> Self {
        match err {
            TlsError::Exhausted => Self::NoResources,
            err => Self::GeneralFailure.logged(err),
        }
    }
}
