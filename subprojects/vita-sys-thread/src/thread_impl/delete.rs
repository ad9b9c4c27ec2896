//! Thread deletion and exit.

use vita_svc::{
    ThreadId,
    raw::Kernel,
    thread::{self as svc, DeleteThreadError},
};

use super::{LookupError, ThreadManager};
use crate::registry::RegistryError;

impl<K: Kernel> ThreadManager<K> {
    /// Removes `thread` from the registry, destroying its cancellation signal,
    /// then deletes the native thread.
    ///
    /// A thread deleting itself is only removed from the registry; its native
    /// thread is left to [`ThreadManager::exit_and_delete`].
    ///
    /// The target is expected to have ended. A thread that is still running
    /// is unregistered all the same, then the kernel refuses to delete it and
    /// [`DeleteError::Native`] is returned. It keeps running without a slot,
    /// so its cancellable waits fail from then on.
    pub fn delete(&self, thread: ThreadId) -> Result<(), DeleteError> {
        {
            let guard = self.registry()?;
            let mut registry = guard.borrow_mut();
            let index = registry
                .find_by_native_id(thread)
                .map_err(|_| LookupError::UnknownThread(thread))?;
            registry.release(&*self.shared.kernel, index)?;
        }

        log::debug!("released thread {thread}");

        if thread == self.current() {
            return Ok(());
        }

        svc::delete(&*self.shared.kernel, thread).map_err(DeleteError::Native)
    }

    /// Removes `thread` from the registry, then ends and deletes the calling
    /// thread with status 0.
    ///
    /// Failing to release the slot is logged; the thread exits anyway.
    pub fn exit_and_delete(&self, thread: ThreadId) -> ! {
        if let Err(err) = self.delete(thread) {
            log::warn!("failed to release thread {thread} before exiting: {err}");
        }

        svc::exit_delete(&*self.shared.kernel, 0)
    }

    /// Ends the calling thread with status 0. The thread stays registered
    /// until it is deleted.
    pub fn exit(&self) -> ! {
        svc::exit(&*self.shared.kernel, 0)
    }
}

/// Error type for [`ThreadManager::delete`].
#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    /// The thread is not registered, or the registry is not available.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The slot of the thread could not be released.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The kernel refused to delete the thread.
    #[error("Failed to delete the thread: {0}")]
    Native(DeleteThreadError),
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::sync::Arc;
    use core::{
        ffi::c_void,
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use vita_svc::{ThreadId, host::HostKernel, raw::Kernel, thread::DeleteThreadError};

    use super::DeleteError;
    use crate::{
        LookupError, ThreadManager,
        priority::DEFAULT_PRIORITY,
        registry::{RegistryError, ThreadArg},
        thread_impl::tests::manager,
    };

    extern "C-unwind" fn idle(_: ThreadArg) -> i32 {
        0
    }

    /// Borrows the manager passed as the thread argument.
    fn manager_of<'a>(arg: ThreadArg) -> &'a ThreadManager<HostKernel> {
        unsafe { &*(arg.as_ptr() as *const ThreadManager<HostKernel>) }
    }

    extern "C-unwind" fn delete_self_and_exit(arg: ThreadArg) -> i32 {
        let manager = manager_of(arg);
        manager.exit_and_delete(manager.current())
    }

    extern "C-unwind" fn exit_with_zero(arg: ThreadArg) -> i32 {
        manager_of(arg).exit()
    }

    extern "C-unwind" fn run_until_released(arg: ThreadArg) -> i32 {
        let released = unsafe { &*(arg.as_ptr() as *const AtomicBool) };
        while !released.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        0
    }

    fn arg_of(manager: &ThreadManager<HostKernel>) -> ThreadArg {
        ThreadArg::new(manager as *const ThreadManager<HostKernel> as *mut c_void)
    }

    #[test]
    fn delete_frees_the_slot_and_the_native_thread() {
        let manager = manager();
        let kernel = Arc::clone(manager.kernel());
        let thread = manager
            .create(idle, 0, DEFAULT_PRIORITY, ThreadArg::null())
            .unwrap();
        let flags = kernel.live_event_flags();

        manager.delete(thread).unwrap();

        assert!(!kernel.thread_exists(thread.to_raw()));
        assert_eq!(kernel.live_event_flags(), flags - 1);
        assert_eq!(manager.with_registry(|r| r.occupied()).unwrap(), 1);
    }

    #[test]
    fn unknown_thread_cannot_be_deleted() {
        let manager = manager();
        manager.init().unwrap();
        let stranger = unsafe { ThreadId::from_raw(0x4242) };

        let err = manager.delete(stranger).unwrap_err();

        assert!(matches!(
            err,
            DeleteError::Lookup(LookupError::UnknownThread(id)) if id == stranger
        ));
    }

    #[test]
    fn bootstrap_thread_cannot_be_deleted() {
        let manager = manager();
        manager.init().unwrap();

        let err = manager.delete(manager.current()).unwrap_err();

        assert!(matches!(
            err,
            DeleteError::Registry(RegistryError::Reserved(0))
        ));
    }

    #[test]
    fn delete_requires_an_initialized_manager() {
        let manager = manager();
        let me = manager.current();

        assert!(matches!(
            manager.delete(me),
            Err(DeleteError::Lookup(LookupError::NotInitialized))
        ));
    }

    #[test]
    fn exit_and_delete_releases_the_caller() {
        let manager = manager();
        let kernel = Arc::clone(manager.kernel());
        let thread = manager
            .create(delete_self_and_exit, 0, DEFAULT_PRIORITY, arg_of(&manager))
            .unwrap();
        manager.start(thread).unwrap();

        for _ in 0..500 {
            if !kernel.thread_exists(thread.to_raw()) {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }

        assert!(!kernel.thread_exists(thread.to_raw()));
        assert_eq!(manager.with_registry(|r| r.occupied()).unwrap(), 1);
    }

    #[test]
    fn exit_keeps_the_thread_registered() {
        let manager = manager();
        let kernel = Arc::clone(manager.kernel());
        let thread = manager
            .create(exit_with_zero, 0, DEFAULT_PRIORITY, arg_of(&manager))
            .unwrap();
        manager.start(thread).unwrap();

        assert_eq!(kernel.wait_thread_end(thread.to_raw(), None), Ok(0));
        assert_eq!(manager.with_registry(|r| r.occupied()).unwrap(), 2);

        manager.delete(thread).unwrap();
        assert!(!kernel.thread_exists(thread.to_raw()));
    }

    #[test]
    fn running_thread_is_unregistered_but_not_deleted() {
        let manager = manager();
        let kernel = Arc::clone(manager.kernel());
        let released = AtomicBool::new(false);
        let arg = ThreadArg::new(&released as *const AtomicBool as *mut c_void);
        let thread = manager
            .create(run_until_released, 0, DEFAULT_PRIORITY, arg)
            .unwrap();
        manager.start(thread).unwrap();

        let err = manager.delete(thread).unwrap_err();

        assert!(matches!(
            err,
            DeleteError::Native(DeleteThreadError::NotDormant)
        ));
        assert!(kernel.thread_exists(thread.to_raw()));
        assert_eq!(manager.with_registry(|r| r.occupied()).unwrap(), 1);

        released.store(true, Ordering::SeqCst);
        assert_eq!(kernel.wait_thread_end(thread.to_raw(), None), Ok(0));
        assert_eq!(kernel.delete_thread(thread.to_raw()), Ok(()));
    }
}
