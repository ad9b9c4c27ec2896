//! # vita-svc
//!
//! A Rust library for interacting with the PS Vita *thread manager*: kernel
//! threads, mutexes, counting semaphores, event flags and the reserved
//! per-thread TLS region.
//!
//! The crate is split in two layers, the same way the kernel is usually
//! wrapped:
//!
//! - [`raw`] defines the [`Kernel`](raw::Kernel) trait. Every method maps
//!   one-to-one to a thread manager call and reports failures as a raw
//!   [`Error`](result::Error) code.
//! - [`thread`], [`sync`] and [`misc`] are thin, safe wrappers around the raw
//!   calls that translate the raw codes into strongly typed error enums.
//!
//! On the console, `vita::VitaKernel` binds the trait to the `sceKernel*`
//! imports. With the `host` feature enabled, [`host::HostKernel`] provides an
//! emulation of the thread manager on top of `std` threads. It is the backend
//! used by the test-suites of the dependent crates.
//!
//! ## References:
//! - [vitasdk: `psp2/kernel/threadmgr.h`](https://docs.vitasdk.org/group__SceThreadMgrUser.html)

#![no_std]

#[cfg(any(test, feature = "host"))]
extern crate std;

extern crate alloc;

mod handle;

pub mod error;
pub mod misc;
pub mod raw;
pub mod result;
pub mod sync;
pub mod thread;

#[cfg(any(test, feature = "host"))]
pub mod host;

#[cfg(target_os = "vita")]
pub mod vita;

pub use handle::{EventFlagId, MutexId, SemaId, ThreadId};
