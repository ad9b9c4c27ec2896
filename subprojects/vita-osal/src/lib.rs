//! # vita-osal
//!
//! The operating-system abstraction layer of the pthreads-embedded library on
//! the PS Vita.
//!
//! The pthread layer is written against a small set of OS services: threads
//! with cancellable waits, mutexes, counting semaphores, TLS keys and atomic
//! words. [`Osal`] provides them on top of the Vita thread manager. The
//! services the kernel lacks (a thread registry, cancellation of blocking
//! waits, the POSIX priority scale) come from `vita-sys-thread`.
//!
//! Every fallible operation returns a [`Result`] with the closed [`Error`]
//! taxonomy. [`OsResult`] carries the matching raw codes.
//!
//! ## Features
//!
//! - `host`: re-exports [`HostKernel`], the thread manager emulation on top of
//!   `std` threads.
//! - `ffi`: on the console, exports the `pte_os*` functions of `pte_osal.h`,
//!   running on a process-wide `Osal<VitaKernel>`. The adapters they forward
//!   to, in [`ffi`], are available on every target.
//! - `runtime`: on the console, adds the allocator and panic handler needed to
//!   link the crate as a static library (`cargo rustc --crate-type
//!   staticlib`).

#![no_std]

extern crate alloc;

mod config;
mod error;
#[cfg(any(test, feature = "ffi"))]
pub mod ffi;
mod mutex;
mod osal;
mod semaphore;
mod thread;
mod time;
mod tls;

pub use self::{
    config::{DEFAULT_SEMA_POLL_INTERVAL, OsalConfig},
    error::{Error, OsResult},
    osal::Osal,
    semaphore::SEM_VALUE_MAX,
    time::TimeB,
};

/// Atomic operations on machine words.
pub mod atomic {
    pub use vita_sys_sync::atomic::*;
}

pub use vita_svc::{MutexId, SemaId, ThreadId, raw::Kernel};
pub use vita_sys_thread::{ThreadArg, ThreadEntry};
pub use vita_sys_thread_tls::TlsKey;

#[cfg(feature = "host")]
pub use vita_svc::host::HostKernel;
#[cfg(target_os = "vita")]
pub use vita_svc::vita::VitaKernel;
