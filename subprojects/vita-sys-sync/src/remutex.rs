//! # Reentrant Mutex
//!
//! A reentrant mutex backed by a native kernel mutex created with the
//! [`MutexAttr::RECURSIVE`] attribute. The kernel tracks the owner and the lock
//! count, so a thread may acquire the lock several times. The mutex is only
//! released once every acquisition has been matched by a release.
//!
//! As with any reentrant lock, the guard only hands out shared references to
//! the protected data. Use a [`RefCell`](core::cell::RefCell) or
//! [`Cell`](core::cell::Cell) inside the mutex when mutation is needed.
//!
//! ## Ownership of the kernel object
//!
//! The mutex owns its kernel object: it is created by [`ReentrantMutex::new`]
//! and deleted when the `ReentrantMutex` is dropped.

use alloc::sync::Arc;
use core::{fmt, marker::PhantomData, ops::Deref};

use vita_svc::{
    MutexId,
    raw::{Kernel, MutexAttr},
    sync::{self as svc, CreateObjectError, LockMutexError},
};

/// A reentrant mutual exclusion primitive useful for protecting shared data.
pub struct ReentrantMutex<K: Kernel, T: ?Sized> {
    kernel: Arc<K>,
    id: MutexId,
    data: T,
}

unsafe impl<K: Kernel, T: ?Sized + Send> Send for ReentrantMutex<K, T> {}
unsafe impl<K: Kernel, T: ?Sized + Send> Sync for ReentrantMutex<K, T> {}

impl<K: Kernel, T> ReentrantMutex<K, T> {
    /// Creates a new `ReentrantMutex` protecting `data`.
    ///
    /// `name` is the debug name given to the kernel object.
    pub fn new(kernel: Arc<K>, name: &str, data: T) -> Result<Self, CreateObjectError> {
        let id = svc::create_mutex(&*kernel, name, MutexAttr::RECURSIVE)?;
        Ok(Self { kernel, id, data })
    }
}

impl<K: Kernel, T: ?Sized> ReentrantMutex<K, T> {
    /// Locks the reentrant mutex.
    ///
    /// If the mutex is already locked by the current thread, the kernel
    /// increments its lock count. If it is locked by another thread, this
    /// function blocks until the mutex is released.
    pub fn lock(&self) -> Result<ReentrantMutexGuard<'_, K, T>, LockMutexError> {
        svc::lock_mutex(&*self.kernel, self.id, None)?;
        Ok(ReentrantMutexGuard {
            lock: self,
            _marker: PhantomData,
        })
    }

    /// Returns the id of the underlying kernel mutex.
    pub fn id(&self) -> MutexId {
        self.id
    }

    /// Returns a mutable reference to the underlying data.
    ///
    /// Since this call borrows the `ReentrantMutex` mutably, no actual locking
    /// needs to take place.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<K: Kernel, T: ?Sized> Drop for ReentrantMutex<K, T> {
    fn drop(&mut self) {
        if let Err(err) = svc::delete_mutex(&*self.kernel, self.id) {
            log::warn!("failed to delete mutex {}: {err}", self.id);
        }
    }
}

impl<K: Kernel, T: ?Sized> fmt::Debug for ReentrantMutex<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantMutex")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// An RAII guard of a [`ReentrantMutex`]. The lock is released once when the
/// guard is dropped.
///
/// The guard is tied to the thread that acquired it and cannot be sent to
/// another one.
#[must_use = "if unused the ReentrantMutex will immediately unlock"]
#[clippy::has_significant_drop]
pub struct ReentrantMutexGuard<'a, K: Kernel, T: ?Sized + 'a> {
    lock: &'a ReentrantMutex<K, T>,
    _marker: PhantomData<*const ()>,
}

unsafe impl<K: Kernel, T: ?Sized + Sync> Sync for ReentrantMutexGuard<'_, K, T> {}

impl<K: Kernel, T: ?Sized> Deref for ReentrantMutexGuard<'_, K, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.lock.data
    }
}

impl<K: Kernel, T: ?Sized> Drop for ReentrantMutexGuard<'_, K, T> {
    #[inline]
    fn drop(&mut self) {
        // Only fails if the kernel object is gone or not owned by this thread,
        // neither of which the guard allows.
        if let Err(err) = svc::unlock_mutex(&*self.lock.kernel, self.lock.id) {
            log::error!("failed to unlock mutex {}: {err}", self.lock.id);
        }
    }
}

impl<K: Kernel, T: ?Sized + fmt::Debug> fmt::Debug for ReentrantMutexGuard<'_, K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
