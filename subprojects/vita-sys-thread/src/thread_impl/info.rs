//! Priority and CPU affinity of threads.
//!
//! Both go straight to the kernel and work for any thread, registered or not.
//!
//! Affinity masks are exchanged with the caller in *portable* form: bit `n`
//! selects core `n`. The kernel keeps them shifted by
//! [`CPU_MASK_SHIFT`](vita_svc::raw::CPU_MASK_SHIFT) and reports a thread whose
//! mask was never set as having mask `0`, which means every user core.

use vita_svc::{
    ThreadId,
    raw::{CPU_MASK_SHIFT, CPU_MASK_USER_ALL, Kernel},
    thread::{self as svc, ThreadAffinityError, ThreadPriorityError},
};

use super::ThreadManager;
use crate::priority::{self, PriorityError};

impl<K: Kernel> ThreadManager<K> {
    /// Returns the POSIX priority of `thread`.
    pub fn get_priority(&self, thread: ThreadId) -> Result<i32, PriorityAccessError> {
        let native = svc::get_priority(&*self.shared.kernel, thread)?;
        Ok(priority::from_native(native)?)
    }

    /// Sets the POSIX priority of `thread`.
    pub fn set_priority(&self, thread: ThreadId, priority: i32) -> Result<(), PriorityAccessError> {
        let native = priority::to_native(priority)?;
        Ok(svc::change_priority(&*self.shared.kernel, thread, native)?)
    }

    /// Returns the portable CPU affinity mask of `thread`.
    pub fn get_affinity(&self, thread: ThreadId) -> Result<u32, ThreadAffinityError> {
        let mask = match svc::get_affinity(&*self.shared.kernel, thread)? {
            0 => CPU_MASK_USER_ALL,
            mask => mask,
        };

        Ok(mask >> CPU_MASK_SHIFT)
    }

    /// Sets the CPU affinity of `thread` from a portable mask.
    pub fn set_affinity(&self, thread: ThreadId, affinity: u32) -> Result<(), ThreadAffinityError> {
        let mask = affinity
            .checked_shl(CPU_MASK_SHIFT)
            .filter(|mask| mask >> CPU_MASK_SHIFT == affinity)
            .ok_or(ThreadAffinityError::InvalidMask)?;

        svc::change_affinity(&*self.shared.kernel, thread, mask)
    }
}

/// Error type for the priority accessors.
#[derive(Debug, thiserror::Error)]
pub enum PriorityAccessError {
    /// The priority has no counterpart on the other scale.
    #[error(transparent)]
    Translate(#[from] PriorityError),
    /// The kernel call failed.
    #[error(transparent)]
    Native(#[from] ThreadPriorityError),
}
