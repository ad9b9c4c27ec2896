//! Raw thread manager interface.
//!
//! [`Kernel`] lists the thread manager calls the OS abstraction layer relies
//! on. Implementations forward each method to the corresponding kernel call and
//! must not add behaviour of their own: retries, cancellation and error
//! classification all live in the layers above.
//!
//! Timeouts are expressed in microseconds, like the kernel does. `None` means
//! "wait forever".

use core::{ffi::c_void, ptr::NonNull};

use alloc::boxed::Box;

use crate::result::Result;

/// Raw kernel object id (`SceUID`).
pub type Uid = i32;

/// The "no object" sentinel. The kernel never hands out `0` as an id.
pub const INVALID_UID: Uid = 0;

/// Code run by a newly started kernel thread. Its return value becomes the
/// thread's exit status.
pub type RawThreadEntry = Box<dyn FnOnce() -> i32 + Send + 'static>;

/// Lowest (numerically largest) priority a user thread may run at.
pub const LOWEST_PRIORITY_USER: i32 = 191;

/// Highest (numerically smallest) priority a user thread may run at.
pub const HIGHEST_PRIORITY_USER: i32 = 64;

/// Shift applied to a core mask in the thread affinity encoding.
pub const CPU_MASK_SHIFT: u32 = 16;

/// Affinity mask selecting every core available to user threads.
pub const CPU_MASK_USER_ALL: u32 = 0x7 << CPU_MASK_SHIFT;

/// Number of pointer-sized words in the reserved per-thread TLS region.
pub const RESERVED_TLS_WORDS: u32 = 0x200;

bitflags::bitflags! {
    /// Mutex creation attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MutexAttr: u32 {
        /// The owner may lock the mutex again, each lock must be matched by an
        /// unlock.
        const RECURSIVE = 0x02;
    }
}

bitflags::bitflags! {
    /// Event flag wait/poll modes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventWaitMode: u32 {
        /// Every bit of the requested pattern must be set.
        const AND = 0x0000;
        /// At least one bit of the requested pattern must be set.
        const OR = 0x0001;
        /// Clear the whole pattern once the condition is satisfied.
        const CLEAR_ALL = 0x0002;
        /// Clear the requested bits once the condition is satisfied.
        const CLEAR_PAT = 0x0004;
    }
}

/// The thread manager.
///
/// Every layer above takes the kernel as a generic parameter, so the same code
/// runs on the console and on [`HostKernel`](crate::host::HostKernel).
pub trait Kernel: Send + Sync + 'static {
    /// Creates a thread in the dormant state. `entry` runs once the thread is
    /// started with [`Kernel::start_thread`].
    fn create_thread(
        &self,
        name: &str,
        entry: RawThreadEntry,
        init_priority: i32,
        stack_size: usize,
    ) -> Result<Uid>;

    /// Moves a dormant thread to the runnable state.
    fn start_thread(&self, thid: Uid) -> Result<()>;

    /// Terminates the calling thread. The thread object stays around, dormant,
    /// until deleted.
    fn exit_thread(&self, status: i32) -> !;

    /// Terminates the calling thread and deletes its thread object.
    fn exit_delete_thread(&self, status: i32) -> !;

    /// Deletes a dormant thread object.
    fn delete_thread(&self, thid: Uid) -> Result<()>;

    /// Returns the id of the calling thread.
    fn get_thread_id(&self) -> Uid;

    /// Blocks until the thread terminates and returns its exit status.
    fn wait_thread_end(&self, thid: Uid, timeout_us: Option<u32>) -> Result<i32>;

    /// Returns the current (native) priority of a thread.
    fn get_thread_priority(&self, thid: Uid) -> Result<i32>;

    /// Changes the (native) priority of a thread.
    fn change_thread_priority(&self, thid: Uid, priority: i32) -> Result<()>;

    /// Returns the CPU affinity mask of a thread. `0` means "not set".
    fn get_thread_cpu_affinity_mask(&self, thid: Uid) -> Result<u32>;

    /// Changes the CPU affinity mask of a thread.
    fn change_thread_cpu_affinity_mask(&self, thid: Uid, mask: u32) -> Result<()>;

    /// Suspends the calling thread for `usecs` microseconds.
    fn delay_thread(&self, usecs: u32);

    /// Creates a mutex. A non-zero `init_count` creates it already locked by
    /// the caller.
    fn create_mutex(&self, name: &str, attr: MutexAttr, init_count: i32) -> Result<Uid>;

    /// Deletes a mutex, waking its waiters with a wait-delete error.
    fn delete_mutex(&self, mutex_id: Uid) -> Result<()>;

    /// Locks a mutex `count` times.
    fn lock_mutex(&self, mutex_id: Uid, count: i32, timeout_us: Option<u32>) -> Result<()>;

    /// Unlocks a mutex `count` times.
    fn unlock_mutex(&self, mutex_id: Uid, count: i32) -> Result<()>;

    /// Creates a counting semaphore.
    fn create_sema(&self, name: &str, init_count: i32, max_count: i32) -> Result<Uid>;

    /// Deletes a semaphore, waking its waiters with a wait-delete error.
    fn delete_sema(&self, sema_id: Uid) -> Result<()>;

    /// Adds `count` to the semaphore.
    fn signal_sema(&self, sema_id: Uid, count: i32) -> Result<()>;

    /// Waits until `count` can be taken from the semaphore.
    fn wait_sema(&self, sema_id: Uid, count: i32, timeout_us: Option<u32>) -> Result<()>;

    /// Creates an event flag holding `init_pattern`.
    fn create_event_flag(&self, name: &str, init_pattern: u32) -> Result<Uid>;

    /// Deletes an event flag.
    fn delete_event_flag(&self, evf_id: Uid) -> Result<()>;

    /// Sets `bits` in the event flag pattern.
    fn set_event_flag(&self, evf_id: Uid, bits: u32) -> Result<()>;

    /// Checks the event flag pattern against `bits` without blocking. On
    /// success returns the pattern as it was before any clear requested by
    /// `mode`.
    fn poll_event_flag(&self, evf_id: Uid, bits: u32, mode: EventWaitMode) -> Result<u32>;

    /// Monotonic process time, in microseconds.
    fn get_process_time_us(&self) -> u64;

    /// Wall-clock time, in microseconds since the Unix epoch.
    fn get_rtc_time_us(&self) -> u64;

    /// Returns the address of word `key` of the calling thread's reserved TLS
    /// region, or `None` if `key` lies outside the region.
    fn get_reserved_tls_addr(&self, key: u32) -> Option<NonNull<*mut c_void>>;
}
