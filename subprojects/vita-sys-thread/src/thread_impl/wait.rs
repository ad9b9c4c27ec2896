//! Cancellable waits of registered threads.

use core::time::Duration;

use vita_svc::{
    ThreadId,
    raw::Kernel,
    thread::{self as svc, WaitThreadEndError},
};

use super::ThreadManager;
use crate::cancel::{self, CancellableWaitError, TimeoutError};

impl<K: Kernel> ThreadManager<K> {
    /// Waits for `thread` to end.
    ///
    /// The wait is cancellable: it ends with
    /// [`CancellableWaitError::Interrupted`] once cancellation of the *calling*
    /// thread is requested.
    pub fn wait_for_end(
        &self,
        thread: ThreadId,
    ) -> Result<(), CancellableWaitError<WaitThreadEndError>> {
        let kernel = &*self.shared.kernel;
        self.wait_cancellable(None, self.shared.config.poll_interval, |slice| {
            svc::wait_end(kernel, thread, Some(slice)).map(drop)
        })
    }

    /// Runs `wait` in slices of at most `interval`, polling the cancellation
    /// signal of the calling thread in between.
    ///
    /// See [`cancel::wait_cancellable`]. The calling thread must be registered.
    pub fn wait_cancellable<T, E: TimeoutError>(
        &self,
        timeout: Option<Duration>,
        interval: Duration,
        wait: impl FnMut(Duration) -> Result<T, E>,
    ) -> Result<T, CancellableWaitError<E>> {
        let signal = self.current_signal()?;
        cancel::wait_cancellable(&*self.shared.kernel, signal, timeout, interval, wait)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::sync::Arc;
    use core::{ffi::c_void, time::Duration};
    use std::{thread, time::Instant};

    use vita_svc::{
        host::HostKernel,
        raw::Kernel,
        sync::{self, WaitSemaError},
        thread::WaitThreadEndError,
    };

    use crate::{
        LookupError, ThreadManager,
        cancel::CancellableWaitError,
        priority::DEFAULT_PRIORITY,
        registry::ThreadArg,
        thread_impl::tests::manager,
    };

    fn manager_of<'a>(arg: ThreadArg) -> &'a ThreadManager<HostKernel> {
        unsafe { &*(arg.as_ptr() as *const ThreadManager<HostKernel>) }
    }

    fn arg_of(manager: &ThreadManager<HostKernel>) -> ThreadArg {
        ThreadArg::new(manager as *const ThreadManager<HostKernel> as *mut c_void)
    }

    /// Waits on a semaphore nobody signals, returning 1 once interrupted.
    extern "C-unwind" fn wait_forever(arg: ThreadArg) -> i32 {
        let manager = manager_of(arg);
        let kernel = manager.kernel();
        let sema = sync::create_sema(&**kernel, "never", 0, 1).unwrap();

        let result = manager.wait_cancellable(None, Duration::from_millis(2), |slice| {
            sync::wait_sema(&**kernel, sema, Some(slice))
        });
        sync::delete_sema(&**kernel, sema).unwrap();

        match result {
            Err(CancellableWaitError::Interrupted) => 1,
            _ => 0,
        }
    }

    extern "C-unwind" fn sleep_briefly(_: ThreadArg) -> i32 {
        thread::sleep(Duration::from_millis(20));
        0
    }

    #[test]
    fn cancelled_thread_leaves_its_wait_and_can_be_joined() {
        let manager = manager();
        let kernel = Arc::clone(manager.kernel());
        let thread = manager
            .create(wait_forever, 0, DEFAULT_PRIORITY, arg_of(&manager))
            .unwrap();
        manager.start(thread).unwrap();

        thread::sleep(Duration::from_millis(20));
        manager.cancel(thread).unwrap();
        manager.wait_for_end(thread).unwrap();

        assert_eq!(kernel.wait_thread_end(thread.to_raw(), None), Ok(1));
        manager.delete(thread).unwrap();
        assert_eq!(manager.with_registry(|r| r.occupied()).unwrap(), 1);
    }

    #[test]
    fn wait_for_end_returns_once_the_thread_ends() {
        let manager = manager();
        let thread = manager
            .create(sleep_briefly, 0, DEFAULT_PRIORITY, ThreadArg::null())
            .unwrap();
        let started = Instant::now();
        manager.start(thread).unwrap();

        manager.wait_for_end(thread).unwrap();

        assert!(started.elapsed() >= Duration::from_millis(20));
        manager.delete(thread).unwrap();
    }

    #[test]
    fn cancelled_caller_is_interrupted_while_joining() {
        let manager = manager();
        let thread = manager
            .create(sleep_briefly, 0, DEFAULT_PRIORITY, ThreadArg::null())
            .unwrap();
        manager.cancel(manager.current()).unwrap();

        assert!(matches!(
            manager.wait_for_end(thread),
            Err(CancellableWaitError::Interrupted)
        ));
    }

    #[test]
    fn joining_itself_is_an_error() {
        let manager = manager();
        manager.init().unwrap();

        assert!(matches!(
            manager.wait_for_end(manager.current()),
            Err(CancellableWaitError::Wait(WaitThreadEndError::WaitSelf))
        ));
    }

    #[test]
    fn unregistered_caller_cannot_wait_cancellably() {
        let manager = manager();
        manager.init().unwrap();

        let result = thread::scope(|scope| {
            scope
                .spawn(|| {
                    manager.wait_cancellable(None, Duration::from_millis(1), |_| {
                        Err::<(), _>(WaitSemaError::TimedOut)
                    })
                })
                .join()
                .unwrap()
        });

        assert!(matches!(
            result,
            Err(CancellableWaitError::Lookup(LookupError::CallerNotRegistered(_)))
        ));
    }

    #[test]
    fn bounded_wait_times_out() {
        let manager = manager();
        manager.init().unwrap();
        let kernel = manager.kernel();
        let sema = sync::create_sema(&**kernel, "never", 0, 1).unwrap();

        let result = manager.wait_cancellable(
            Some(Duration::from_millis(10)),
            Duration::from_millis(4),
            |slice| sync::wait_sema(&**kernel, sema, Some(slice)),
        );

        assert!(matches!(result, Err(CancellableWaitError::TimedOut)));
        sync::delete_sema(&**kernel, sema).unwrap();
    }
}
