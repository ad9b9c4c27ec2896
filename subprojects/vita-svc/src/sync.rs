//! Synchronization primitives of the thread manager.
//!
//! Safe wrappers around kernel mutexes, counting semaphores and event flags.
//! Raw error codes are translated into one typed error enum per operation.

use core::time::Duration;

use crate::{
    error::KernelError as KError,
    handle::{EventFlagId, MutexId, SemaId},
    misc::timeout_us,
    raw::{EventWaitMode, Kernel, MutexAttr},
    result::Error,
};

/// Error returned when a kernel object cannot be created.
#[derive(Debug, thiserror::Error)]
pub enum CreateObjectError {
    /// The kernel ran out of memory or object slots.
    #[error("Out of memory")]
    OutOfMemory,
    /// An initial value or attribute was rejected.
    #[error("Invalid argument")]
    InvalidArgument,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

impl CreateObjectError {
    fn from_kernel(err: Error) -> Self {
        match err.description() {
            desc if KError::NoMemory == desc => Self::OutOfMemory,
            desc if KError::InvalidArgument == desc => Self::InvalidArgument,
            _ => Self::Unknown(err),
        }
    }
}

/// Error returned when a kernel object cannot be deleted.
#[derive(Debug, thiserror::Error)]
pub enum DeleteObjectError {
    /// The id does not name a live object of the expected kind.
    #[error("Invalid object id")]
    InvalidId,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

impl DeleteObjectError {
    fn from_kernel(err: Error) -> Self {
        match err.description() {
            desc if KError::UnknownUid == desc => Self::InvalidId,
            _ => Self::Unknown(err),
        }
    }
}

/// Creates a mutex.
///
/// With [`MutexAttr::RECURSIVE`], the owner may lock the mutex again as long as
/// every lock is matched by an unlock.
pub fn create_mutex<K: Kernel + ?Sized>(
    kernel: &K,
    name: &str,
    attr: MutexAttr,
) -> Result<MutexId, CreateObjectError> {
    kernel
        .create_mutex(name, attr, 0)
        .map(MutexId)
        .map_err(CreateObjectError::from_kernel)
}

/// Deletes a mutex. Threads blocked on it are woken with an error.
pub fn delete_mutex<K: Kernel + ?Sized>(
    kernel: &K,
    mutex: MutexId,
) -> Result<(), DeleteObjectError> {
    kernel
        .delete_mutex(mutex.to_raw())
        .map_err(DeleteObjectError::from_kernel)
}

/// Locks a mutex once.
///
/// `timeout` bounds the wait; `None` blocks until the mutex is acquired.
pub fn lock_mutex<K: Kernel + ?Sized>(
    kernel: &K,
    mutex: MutexId,
    timeout: Option<Duration>,
) -> Result<(), LockMutexError> {
    kernel
        .lock_mutex(mutex.to_raw(), 1, timeout.map(timeout_us))
        .map_err(|err| match err.description() {
            desc if KError::WaitTimeout == desc => LockMutexError::TimedOut,
            desc if KError::UnknownUid == desc => LockMutexError::InvalidId,
            desc if KError::WaitDelete == desc => LockMutexError::Deleted,
            desc if KError::MutexRecursive == desc => LockMutexError::Recursive,
            _ => LockMutexError::Unknown(err),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum LockMutexError {
    /// The mutex was still owned by another thread when the timeout expired.
    #[error("Operation timed out")]
    TimedOut,
    /// The id does not name a mutex.
    #[error("Invalid mutex id")]
    InvalidId,
    /// The mutex was deleted while the caller was waiting.
    #[error("Mutex deleted while waiting")]
    Deleted,
    /// The owner locked a non-recursive mutex again.
    #[error("Mutex is not recursive")]
    Recursive,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

/// Unlocks a mutex once.
pub fn unlock_mutex<K: Kernel + ?Sized>(
    kernel: &K,
    mutex: MutexId,
) -> Result<(), UnlockMutexError> {
    kernel
        .unlock_mutex(mutex.to_raw(), 1)
        .map_err(|err| match err.description() {
            desc if KError::UnknownUid == desc => UnlockMutexError::InvalidId,
            desc if KError::MutexUnlockUdf == desc => UnlockMutexError::NotOwner,
            _ => UnlockMutexError::Unknown(err),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum UnlockMutexError {
    /// The id does not name a mutex.
    #[error("Invalid mutex id")]
    InvalidId,
    /// The calling thread does not own the mutex.
    #[error("Mutex not owned by the calling thread")]
    NotOwner,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

/// Creates a counting semaphore holding `initial` units, capped at `max`.
pub fn create_sema<K: Kernel + ?Sized>(
    kernel: &K,
    name: &str,
    initial: i32,
    max: i32,
) -> Result<SemaId, CreateObjectError> {
    kernel
        .create_sema(name, initial, max)
        .map(SemaId)
        .map_err(CreateObjectError::from_kernel)
}

/// Deletes a semaphore. Threads blocked on it are woken with an error.
pub fn delete_sema<K: Kernel + ?Sized>(kernel: &K, sema: SemaId) -> Result<(), DeleteObjectError> {
    kernel
        .delete_sema(sema.to_raw())
        .map_err(DeleteObjectError::from_kernel)
}

/// Adds `count` units to the semaphore.
pub fn signal_sema<K: Kernel + ?Sized>(
    kernel: &K,
    sema: SemaId,
    count: i32,
) -> Result<(), SignalSemaError> {
    kernel
        .signal_sema(sema.to_raw(), count)
        .map_err(|err| match err.description() {
            desc if KError::UnknownUid == desc => SignalSemaError::InvalidId,
            desc if KError::SemaOvf == desc => SignalSemaError::Overflow,
            _ => SignalSemaError::Unknown(err),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum SignalSemaError {
    /// The id does not name a semaphore.
    #[error("Invalid semaphore id")]
    InvalidId,
    /// The count would exceed the semaphore maximum.
    #[error("Semaphore count overflow")]
    Overflow,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

/// Takes one unit from the semaphore, blocking while none is available.
///
/// `timeout` bounds the wait; `None` waits forever.
pub fn wait_sema<K: Kernel + ?Sized>(
    kernel: &K,
    sema: SemaId,
    timeout: Option<Duration>,
) -> Result<(), WaitSemaError> {
    kernel
        .wait_sema(sema.to_raw(), 1, timeout.map(timeout_us))
        .map_err(|err| match err.description() {
            desc if KError::WaitTimeout == desc => WaitSemaError::TimedOut,
            desc if KError::UnknownUid == desc => WaitSemaError::InvalidId,
            desc if KError::WaitDelete == desc => WaitSemaError::Deleted,
            _ => WaitSemaError::Unknown(err),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum WaitSemaError {
    /// No unit became available before the timeout expired.
    #[error("Operation timed out")]
    TimedOut,
    /// The id does not name a semaphore.
    #[error("Invalid semaphore id")]
    InvalidId,
    /// The semaphore was deleted while the caller was waiting.
    #[error("Semaphore deleted while waiting")]
    Deleted,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

/// Creates an event flag with every bit cleared.
pub fn create_event_flag<K: Kernel + ?Sized>(
    kernel: &K,
    name: &str,
) -> Result<EventFlagId, CreateObjectError> {
    kernel
        .create_event_flag(name, 0)
        .map(EventFlagId)
        .map_err(CreateObjectError::from_kernel)
}

/// Deletes an event flag.
pub fn delete_event_flag<K: Kernel + ?Sized>(
    kernel: &K,
    flag: EventFlagId,
) -> Result<(), DeleteObjectError> {
    kernel
        .delete_event_flag(flag.to_raw())
        .map_err(DeleteObjectError::from_kernel)
}

/// Sets `bits` in the event flag pattern.
pub fn set_event_flag<K: Kernel + ?Sized>(
    kernel: &K,
    flag: EventFlagId,
    bits: u32,
) -> Result<(), SetEventFlagError> {
    kernel
        .set_event_flag(flag.to_raw(), bits)
        .map_err(|err| match err.description() {
            desc if KError::UnknownUid == desc => SetEventFlagError::InvalidId,
            _ => SetEventFlagError::Unknown(err),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum SetEventFlagError {
    /// The id does not name an event flag.
    #[error("Invalid event flag id")]
    InvalidId,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

/// Checks the event flag against `bits` without blocking.
///
/// Returns the pattern observed before any clear requested by `mode`.
pub fn poll_event_flag<K: Kernel + ?Sized>(
    kernel: &K,
    flag: EventFlagId,
    bits: u32,
    mode: EventWaitMode,
) -> Result<u32, PollEventFlagError> {
    kernel
        .poll_event_flag(flag.to_raw(), bits, mode)
        .map_err(|err| match err.description() {
            desc if KError::EventCond == desc => PollEventFlagError::NotSatisfied,
            desc if KError::UnknownUid == desc => PollEventFlagError::InvalidId,
            desc if KError::IllegalPattern == desc => PollEventFlagError::EmptyPattern,
            _ => PollEventFlagError::Unknown(err),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum PollEventFlagError {
    /// The pattern does not satisfy the requested condition.
    #[error("Event flag condition not satisfied")]
    NotSatisfied,
    /// The id does not name an event flag.
    #[error("Invalid event flag id")]
    InvalidId,
    /// `bits` was zero.
    #[error("Empty bit pattern")]
    EmptyPattern,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}
