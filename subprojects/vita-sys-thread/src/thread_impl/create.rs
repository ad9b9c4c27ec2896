//! Thread creation and start.
//!
//! Every thread created here runs the same native entry, a *trampoline* that
//! looks up the calling thread in the registry and calls the entry point and
//! argument stored there. A thread missing from the registry is a broken
//! invariant: it is logged and the thread ends with status `-1` without running
//! any user code.

use alloc::{
    boxed::Box,
    sync::{Arc, Weak},
};

use vita_svc::{
    ThreadId,
    raw::{Kernel, RawThreadEntry},
    sync::{CreateObjectError, LockMutexError},
    thread::{self as svc, CreateThreadError, StartThreadError},
};

use super::{InitError, Shared, ThreadManager};
use crate::{
    cancel::CancelSignal,
    priority::{self, PriorityError},
    registry::{RegistryError, ThreadArg, ThreadEntry},
};

/// Name given to every native thread created by the manager.
pub const THREAD_NAME: &str = "pthread";

/// Exit status of a thread whose trampoline found no registry entry.
pub const TRAMPOLINE_FAILURE_STATUS: i32 = -1;

impl<K: Kernel> ThreadManager<K> {
    /// Creates a dormant thread that runs `entry(arg)` once started.
    ///
    /// * `stack_size` is raised to the configured minimum if smaller.
    /// * `priority` is a POSIX priority, see [`priority`](crate::priority).
    ///
    /// The registry is initialized first if needed, with the caller as the
    /// bootstrap thread.
    pub fn create(
        &self,
        entry: ThreadEntry,
        stack_size: usize,
        priority: i32,
        arg: ThreadArg,
    ) -> Result<ThreadId, CreateError> {
        let native_priority = priority::to_native(priority)?;
        let stack_size = stack_size.max(self.shared.config.min_stack_size);

        let guard = self.shared.registry.lock().map_err(CreateError::Lock)?;
        if !self.is_initialized() {
            // Re-enters the registry lock held above.
            self.init()?;
        }

        let kernel = &*self.shared.kernel;
        let mut registry = guard.borrow_mut();
        let index = registry.find_free_slot()?;

        let thread = svc::create(
            kernel,
            THREAD_NAME,
            trampoline(Arc::downgrade(&self.shared)),
            native_priority,
            stack_size,
        )
        .map_err(|err| match err {
            CreateThreadError::OutOfMemory => CreateError::OutOfMemory,
            err => CreateError::Native(err),
        })?;

        let signal = match CancelSignal::create(kernel) {
            Ok(signal) => signal,
            Err(err) => {
                discard_thread(kernel, thread);
                return Err(CreateError::Signal(err));
            }
        };

        if let Err(err) = registry.reserve(index, thread, Some(entry), arg, signal) {
            if let Err(err) = signal.destroy(kernel) {
                log::warn!("failed to destroy cancellation signal: {err}");
            }
            discard_thread(kernel, thread);
            return Err(err.into());
        }

        log::debug!("created thread {thread} in slot {index}");

        Ok(thread)
    }

    /// Starts a thread created with [`ThreadManager::create`].
    pub fn start(&self, thread: ThreadId) -> Result<(), StartThreadError> {
        svc::start(&*self.shared.kernel, thread)
    }
}

/// Native entry of every thread created by the manager.
fn trampoline<K: Kernel>(shared: Weak<Shared<K>>) -> RawThreadEntry {
    Box::new(move || {
        let Some(shared) = shared.upgrade() else {
            log::error!("thread started after its manager was dropped");
            return TRAMPOLINE_FAILURE_STATUS;
        };

        let Some((entry, arg)) = shared.entry_of_current() else {
            return TRAMPOLINE_FAILURE_STATUS;
        };
        drop(shared);

        entry(arg)
    })
}

impl<K: Kernel> Shared<K> {
    /// Returns the entry point and argument registered for the calling thread.
    fn entry_of_current(&self) -> Option<(ThreadEntry, ThreadArg)> {
        let me = svc::current(&*self.kernel);

        let guard = match self.registry.lock() {
            Ok(guard) => guard,
            Err(err) => {
                log::error!("thread {me}: failed to lock the thread registry: {err}");
                return None;
            }
        };
        let registry = guard.borrow();

        let found = registry
            .find_by_native_id(me)
            .ok()
            .and_then(|index| registry.entry(index))
            .and_then(|slot| slot.entry().map(|entry| (entry, slot.arg())));
        if found.is_none() {
            log::error!("thread {me} has no entry point in the thread registry");
        }

        found
    }
}

/// Deletes a thread that never made it into the registry.
fn discard_thread<K: Kernel + ?Sized>(kernel: &K, thread: ThreadId) {
    if let Err(err) = svc::delete(kernel, thread) {
        log::warn!("failed to delete thread {thread}: {err}");
    }
}

/// Error type for [`ThreadManager::create`].
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    /// The priority is outside the POSIX range.
    #[error(transparent)]
    InvalidPriority(#[from] PriorityError),
    /// The registry had to be initialized and that failed.
    #[error(transparent)]
    Init(#[from] InitError),
    /// The registry lock could not be taken.
    #[error("Failed to lock the thread registry: {0}")]
    Lock(LockMutexError),
    /// No free slot, or the new id is already registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The kernel ran out of memory for the thread.
    #[error("Out of memory")]
    OutOfMemory,
    /// The kernel refused to create the thread.
    #[error("Failed to create the thread: {0}")]
    Native(CreateThreadError),
    /// The cancellation signal could not be created.
    #[error("Failed to create the cancellation signal: {0}")]
    Signal(CreateObjectError),
}
