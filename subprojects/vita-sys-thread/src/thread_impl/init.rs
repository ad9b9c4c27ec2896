//! Registry initialization.

use core::sync::atomic::Ordering;

use vita_svc::{
    raw::Kernel,
    sync::{CreateObjectError, LockMutexError},
};

use super::ThreadManager;
use crate::{
    cancel::CancelSignal,
    registry::{BOOTSTRAP_SLOT, RegistryError, ThreadArg},
};

impl<K: Kernel> ThreadManager<K> {
    /// Initializes the registry, registering the calling thread as the
    /// bootstrap thread in slot 0.
    ///
    /// Calling `init` again once it has succeeded does nothing.
    pub fn init(&self) -> Result<(), InitError> {
        let guard = self.shared.registry.lock()?;
        if self.is_initialized() {
            return Ok(());
        }

        let kernel = &*self.shared.kernel;
        let me = self.current();
        let signal = CancelSignal::create(kernel)?;

        let mut registry = guard.borrow_mut();
        if let Err(err) = registry.reserve(BOOTSTRAP_SLOT, me, None, ThreadArg::null(), signal) {
            if let Err(err) = signal.destroy(kernel) {
                log::warn!("failed to destroy cancellation signal: {err}");
            }
            return Err(err.into());
        }

        self.shared.initialized.store(true, Ordering::SeqCst);
        log::debug!("thread registry initialized, bootstrap thread {me}");

        Ok(())
    }
}

/// Error type for [`ThreadManager::init`].
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The registry lock could not be taken.
    #[error("Failed to lock the thread registry: {0}")]
    Lock(#[from] LockMutexError),
    /// The cancellation signal of the bootstrap thread could not be created.
    #[error("Failed to create the cancellation signal: {0}")]
    Signal(#[from] CreateObjectError),
    /// The bootstrap slot could not be filled.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
