//! Thread lifecycle management.
//!
//! [`ThreadManager`] owns the [`Registry`] of a process and implements the
//! POSIX thread operations on top of it. The manager is cheap to clone; every
//! clone refers to the same registry.
//!
//! The registry lives behind a [`ReentrantMutex`] over a native recursive
//! mutex. The lock is held for slot scans and updates only, never across a
//! blocking wait.

use alloc::sync::Arc;
use core::{
    cell::RefCell,
    sync::atomic::{AtomicBool, Ordering},
};

use vita_svc::{
    ThreadId,
    raw::Kernel,
    sync::{CreateObjectError, LockMutexError},
    thread as svc,
};
use vita_sys_sync::{ReentrantMutex, ReentrantMutexGuard};

use crate::{cancel::CancelSignal, config::ThreadConfig, registry::Registry};

mod create;
mod delete;
mod info;
mod init;
mod signal;
mod sleep;
mod wait;

pub use create::*;
pub use delete::*;
pub use info::*;
pub use init::*;
pub use signal::*;

const REGISTRY_LOCK_NAME: &str = "pthread_registry";

/// Owner of a thread registry.
pub struct ThreadManager<K: Kernel> {
    shared: Arc<Shared<K>>,
}

pub(crate) struct Shared<K: Kernel> {
    kernel: Arc<K>,
    registry: ReentrantMutex<K, RefCell<Registry>>,
    config: ThreadConfig,
    initialized: AtomicBool,
}

type RegistryGuard<'a, K> = ReentrantMutexGuard<'a, K, RefCell<Registry>>;

impl<K: Kernel> ThreadManager<K> {
    /// Creates a manager with an empty registry.
    ///
    /// The manager must be initialized with [`ThreadManager::init`] before
    /// threads can be looked up. [`ThreadManager::create`] does it on first use.
    pub fn new(kernel: Arc<K>, config: ThreadConfig) -> Result<Self, CreateObjectError> {
        let registry = ReentrantMutex::new(
            Arc::clone(&kernel),
            REGISTRY_LOCK_NAME,
            RefCell::new(Registry::new()),
        )?;

        Ok(Self {
            shared: Arc::new(Shared {
                kernel,
                registry,
                config,
                initialized: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the kernel the manager runs on.
    pub fn kernel(&self) -> &Arc<K> {
        &self.shared.kernel
    }

    /// Returns the configuration of the manager.
    pub fn config(&self) -> &ThreadConfig {
        &self.shared.config
    }

    /// Returns `true` once [`ThreadManager::init`] has completed.
    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::SeqCst)
    }

    /// Returns the id of the calling thread.
    #[inline]
    pub fn current(&self) -> ThreadId {
        svc::current(&*self.shared.kernel)
    }

    /// Runs `f` on the registry, with the registry lock held.
    pub fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> Result<R, LookupError> {
        let guard = self.registry()?;
        let registry = guard.borrow();
        Ok(f(&registry))
    }

    /// Locks the registry of an initialized manager.
    fn registry(&self) -> Result<RegistryGuard<'_, K>, LookupError> {
        if !self.is_initialized() {
            return Err(LookupError::NotInitialized);
        }

        Ok(self.shared.registry.lock()?)
    }

    /// Returns the cancellation signal of `thread`.
    fn signal_of(&self, thread: ThreadId) -> Result<CancelSignal, LookupError> {
        let guard = self.registry()?;
        let registry = guard.borrow();
        let signal = registry
            .find_by_native_id(thread)
            .ok()
            .and_then(|index| registry.entry(index))
            .and_then(|slot| slot.signal())
            .ok_or(LookupError::UnknownThread(thread));
        signal
    }

    /// Returns the cancellation signal of the calling thread.
    fn current_signal(&self) -> Result<CancelSignal, LookupError> {
        let me = self.current();
        self.signal_of(me).map_err(|err| match err {
            LookupError::UnknownThread(_) => {
                log::warn!("thread {me} is not registered, it has no cancellation signal");
                LookupError::CallerNotRegistered(me)
            }
            err => err,
        })
    }
}

impl<K: Kernel> Clone for ThreadManager<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: Kernel> core::fmt::Debug for ThreadManager<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThreadManager")
            .field("config", &self.shared.config)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl<K: Kernel> Drop for Shared<K> {
    fn drop(&mut self) {
        let kernel = Arc::clone(&self.kernel);
        self.registry.get_mut().get_mut().clear(&*kernel);
    }
}

/// Error returned when a registry lookup fails.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The manager has not been initialized.
    #[error("Thread manager not initialized")]
    NotInitialized,
    /// The registry lock could not be taken.
    #[error("Failed to lock the thread registry: {0}")]
    Lock(#[from] LockMutexError),
    /// The thread was not created through this manager.
    #[error("Thread {0} is not registered")]
    UnknownThread(ThreadId),
    /// The calling thread was not created through this manager.
    #[error("Calling thread {0} is not registered")]
    CallerNotRegistered(ThreadId),
}
