//! Thread management for the PS Vita thread manager.
//!
//! This module provides a thin wrapper around the kernel's thread-related
//! calls. Each safe wrapper maps almost one-to-one to its underlying call while
//! translating raw [`Error`] codes into strongly typed Rust error enums.

use core::time::Duration;

use crate::{
    error::KernelError as KError,
    handle::ThreadId,
    misc::timeout_us,
    raw::{Kernel, RawThreadEntry},
    result::Error,
};

/// Creates a new thread in the *dormant* state.
///
/// * `name` – debug name of the thread.
/// * `entry` – code run once the thread is started.
/// * `priority` – native priority (lower values indicate higher priority).
/// * `stack_size` – size of the thread stack, in bytes.
///
/// The thread must subsequently be moved to the runnable state with [`start`]
/// before it executes.
pub fn create<K: Kernel + ?Sized>(
    kernel: &K,
    name: &str,
    entry: RawThreadEntry,
    priority: i32,
    stack_size: usize,
) -> Result<ThreadId, CreateThreadError> {
    kernel
        .create_thread(name, entry, priority, stack_size)
        .map(ThreadId)
        .map_err(|err| match err.description() {
            desc if KError::NoMemory == desc => CreateThreadError::OutOfMemory,
            desc if KError::IllegalPriority == desc => CreateThreadError::InvalidPriority,
            desc if KError::IllegalStackSize == desc => CreateThreadError::InvalidStackSize,
            _ => CreateThreadError::Unknown(err),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum CreateThreadError {
    /// The kernel could not allocate the thread object or its stack.
    #[error("Out of memory")]
    OutOfMemory,
    /// The priority is outside the range allowed for user threads.
    #[error("Invalid priority")]
    InvalidPriority,
    /// The stack size was rejected.
    #[error("Invalid stack size")]
    InvalidStackSize,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

/// Transitions a thread from the *dormant* state to *runnable*.
pub fn start<K: Kernel + ?Sized>(kernel: &K, thread: ThreadId) -> Result<(), StartThreadError> {
    kernel
        .start_thread(thread.to_raw())
        .map_err(|err| match err.description() {
            desc if KError::UnknownUid == desc => StartThreadError::InvalidId,
            desc if KError::NotDormant == desc => StartThreadError::AlreadyRunning,
            _ => StartThreadError::Unknown(err),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum StartThreadError {
    /// The id does not name a thread.
    #[error("Invalid thread id")]
    InvalidId,
    /// The thread has already been started and is still running.
    #[error("Thread already running")]
    AlreadyRunning,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

/// Exits the calling thread and never returns.
///
/// The thread object is left dormant; it must be deleted with [`delete`].
pub fn exit<K: Kernel + ?Sized>(kernel: &K, status: i32) -> ! {
    kernel.exit_thread(status)
}

/// Exits the calling thread, deletes its thread object and never returns.
pub fn exit_delete<K: Kernel + ?Sized>(kernel: &K, status: i32) -> ! {
    kernel.exit_delete_thread(status)
}

/// Deletes a dormant thread object.
pub fn delete<K: Kernel + ?Sized>(kernel: &K, thread: ThreadId) -> Result<(), DeleteThreadError> {
    kernel
        .delete_thread(thread.to_raw())
        .map_err(|err| match err.description() {
            desc if KError::UnknownUid == desc => DeleteThreadError::InvalidId,
            desc if KError::NotDormant == desc => DeleteThreadError::NotDormant,
            _ => DeleteThreadError::Unknown(err),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteThreadError {
    /// The id does not name a thread.
    #[error("Invalid thread id")]
    InvalidId,
    /// The thread is still running.
    #[error("Thread is not dormant")]
    NotDormant,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

/// Returns the id of the calling thread.
#[inline]
pub fn current<K: Kernel + ?Sized>(kernel: &K) -> ThreadId {
    ThreadId(kernel.get_thread_id())
}

/// Blocks until `thread` terminates, returning its exit status.
///
/// `timeout` bounds the wait; `None` waits forever.
pub fn wait_end<K: Kernel + ?Sized>(
    kernel: &K,
    thread: ThreadId,
    timeout: Option<Duration>,
) -> Result<i32, WaitThreadEndError> {
    kernel
        .wait_thread_end(thread.to_raw(), timeout.map(timeout_us))
        .map_err(|err| match err.description() {
            desc if KError::WaitTimeout == desc => WaitThreadEndError::TimedOut,
            desc if KError::UnknownUid == desc => WaitThreadEndError::InvalidId,
            desc if KError::CanNotWaitSelf == desc => WaitThreadEndError::WaitSelf,
            _ => WaitThreadEndError::Unknown(err),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum WaitThreadEndError {
    /// The thread was still running when the timeout expired.
    #[error("Operation timed out")]
    TimedOut,
    /// The id does not name a thread.
    #[error("Invalid thread id")]
    InvalidId,
    /// The calling thread tried to wait for itself.
    #[error("Thread cannot wait for itself")]
    WaitSelf,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

/// Returns the native priority of `thread`.
pub fn get_priority<K: Kernel + ?Sized>(
    kernel: &K,
    thread: ThreadId,
) -> Result<i32, ThreadPriorityError> {
    kernel
        .get_thread_priority(thread.to_raw())
        .map_err(ThreadPriorityError::from_kernel)
}

/// Changes the native priority of `thread`.
pub fn change_priority<K: Kernel + ?Sized>(
    kernel: &K,
    thread: ThreadId,
    priority: i32,
) -> Result<(), ThreadPriorityError> {
    kernel
        .change_thread_priority(thread.to_raw(), priority)
        .map_err(ThreadPriorityError::from_kernel)
}

#[derive(Debug, thiserror::Error)]
pub enum ThreadPriorityError {
    /// The priority is outside the range allowed for user threads.
    #[error("Invalid priority")]
    InvalidPriority,
    /// The id does not name a thread.
    #[error("Invalid thread id")]
    InvalidId,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

impl ThreadPriorityError {
    fn from_kernel(err: Error) -> Self {
        match err.description() {
            desc if KError::IllegalPriority == desc => Self::InvalidPriority,
            desc if KError::UnknownUid == desc => Self::InvalidId,
            _ => Self::Unknown(err),
        }
    }
}

/// Returns the raw CPU affinity mask of `thread`. `0` means the mask was never
/// set.
pub fn get_affinity<K: Kernel + ?Sized>(
    kernel: &K,
    thread: ThreadId,
) -> Result<u32, ThreadAffinityError> {
    kernel
        .get_thread_cpu_affinity_mask(thread.to_raw())
        .map_err(ThreadAffinityError::from_kernel)
}

/// Changes the raw CPU affinity mask of `thread`.
pub fn change_affinity<K: Kernel + ?Sized>(
    kernel: &K,
    thread: ThreadId,
    mask: u32,
) -> Result<(), ThreadAffinityError> {
    kernel
        .change_thread_cpu_affinity_mask(thread.to_raw(), mask)
        .map_err(ThreadAffinityError::from_kernel)
}

#[derive(Debug, thiserror::Error)]
pub enum ThreadAffinityError {
    /// The mask selects cores that are not available to user threads.
    #[error("Invalid CPU affinity mask")]
    InvalidMask,
    /// The id does not name a thread.
    #[error("Invalid thread id")]
    InvalidId,
    /// Any unforeseen kernel error.
    #[error("Unknown error: {0}")]
    Unknown(Error),
}

impl ThreadAffinityError {
    fn from_kernel(err: Error) -> Self {
        match err.description() {
            desc if KError::IllegalCpuAffinityMask == desc => Self::InvalidMask,
            desc if KError::UnknownUid == desc => Self::InvalidId,
            _ => Self::Unknown(err),
        }
    }
}

/// Suspends the calling thread for *at least* `duration`.
///
/// Durations longer than the kernel can express in one call are split.
pub fn delay<K: Kernel + ?Sized>(kernel: &K, duration: Duration) {
    let mut remaining = duration.as_micros();
    while remaining > 0 {
        let chunk = u32::try_from(remaining).unwrap_or(u32::MAX);
        kernel.delay_thread(chunk);
        remaining -= u128::from(chunk);
    }
}
