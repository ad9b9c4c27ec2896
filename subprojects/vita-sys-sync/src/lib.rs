//! # vita-sys-sync
//!
//! Low-level synchronization for the Vita OS abstraction layer.
//!
//! - [`ReentrantMutex`] guards shared data with a native *recursive* kernel
//!   mutex. The owning thread may lock it again without deadlocking.
//! - [`atomic`] exposes the machine-word atomic operations the POSIX thread
//!   layer relies on.
//!
//! # References
//!
//! - [vitasdk: `psp2/kernel/threadmgr.h`](https://docs.vitasdk.org/group__SceThreadMgrUser.html)

#![no_std]

extern crate alloc;

pub mod atomic;
mod remutex;

#[doc(inline)]
pub use self::remutex::{ReentrantMutex, ReentrantMutexGuard};
