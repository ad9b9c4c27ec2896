//! # vita-sys-thread
//!
//! POSIX thread support on top of the PS Vita thread manager.
//!
//! The kernel only knows about bare threads. This crate adds what a POSIX
//! thread layer needs on top of them:
//!
//! - a [`Registry`] of every thread created through a [`ThreadManager`], holding
//!   its entry point, argument and cancellation signal;
//! - cooperative cancellation of blocking waits ([`cancel`]);
//! - translation between the POSIX and native priority scales ([`priority`]).
//!
//! All state lives in a [`ThreadManager`] instance rather than in globals, so
//! independent managers can coexist.

#![no_std]

extern crate alloc;

pub mod cancel;
mod config;
pub mod priority;
mod registry;
mod thread_impl;

pub use config::*;
pub use registry::*;
pub use thread_impl::*;
