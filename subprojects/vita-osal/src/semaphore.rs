//! Counting semaphores.

use core::time::Duration;

use vita_svc::{SemaId, raw::Kernel, sync as svc};

use crate::{Error, Osal};

const SEMA_NAME: &str = "pte_sema";

/// Largest count a semaphore can hold.
pub const SEM_VALUE_MAX: i32 = i32::MAX;

impl<K: Kernel> Osal<K> {
    /// Creates a semaphore holding `initial` units.
    pub fn semaphore_create(&self, initial: i32) -> Result<SemaId, Error> {
        Ok(svc::create_sema(&**self.kernel(), SEMA_NAME, initial, SEM_VALUE_MAX)?)
    }

    pub fn semaphore_delete(&self, sema: SemaId) -> Result<(), Error> {
        Ok(svc::delete_sema(&**self.kernel(), sema)?)
    }

    /// Adds `count` units to `sema`.
    pub fn semaphore_post(&self, sema: SemaId, count: i32) -> Result<(), Error> {
        Ok(svc::signal_sema(&**self.kernel(), sema, count)?)
    }

    /// Takes one unit from `sema`.
    ///
    /// With a timeout, gives up with [`Error::Timeout`] after `timeout_ms`.
    pub fn semaphore_pend(&self, sema: SemaId, timeout_ms: Option<u32>) -> Result<(), Error> {
        Ok(svc::wait_sema(&**self.kernel(), sema, timeout_ms.map(millis))?)
    }

    /// Takes one unit from `sema`, giving up with [`Error::Interrupted`] once
    /// cancellation of the calling thread is requested.
    ///
    /// The semaphore is waited on in slices of
    /// [`sema_poll_interval`](crate::OsalConfig::sema_poll_interval), so a
    /// cancellation is observed within one slice. The calling thread must have
    /// been created through this layer, or be its bootstrap thread.
    pub fn semaphore_cancellable_pend(
        &self,
        sema: SemaId,
        timeout_ms: Option<u32>,
    ) -> Result<(), Error> {
        let kernel = &**self.kernel();
        let interval = self.config.sema_poll_interval;

        Ok(self
            .threads
            .wait_cancellable(timeout_ms.map(millis), interval, |slice| {
                svc::wait_sema(kernel, sema, Some(slice))
            })?)
    }
}

fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::sync::Arc;
    use core::time::Duration;
    use std::{thread, time::Instant};

    use vita_svc::host::HostKernel;

    use crate::{Error, Osal, OsalConfig};

    fn osal() -> Arc<Osal<HostKernel>> {
        let config = OsalConfig {
            sema_poll_interval: Duration::from_millis(5),
            ..OsalConfig::default()
        };
        let osal = Osal::with_config(Arc::new(HostKernel::new()), config).unwrap();
        osal.init().unwrap();
        Arc::new(osal)
    }

    #[test]
    fn post_then_pend() {
        let osal = osal();
        let sema = osal.semaphore_create(0).unwrap();

        osal.semaphore_post(sema, 2).unwrap();

        assert_eq!(osal.semaphore_pend(sema, None), Ok(()));
        assert_eq!(osal.semaphore_pend(sema, Some(0)), Ok(()));
        assert_eq!(osal.semaphore_pend(sema, Some(5)), Err(Error::Timeout));
        osal.semaphore_delete(sema).unwrap();
    }

    #[test]
    fn pend_on_a_deleted_semaphore_fails() {
        let osal = osal();
        let sema = osal.semaphore_create(1).unwrap();
        osal.semaphore_delete(sema).unwrap();

        assert_eq!(osal.semaphore_pend(sema, None), Err(Error::GeneralFailure));
        assert_eq!(osal.semaphore_post(sema, 1), Err(Error::GeneralFailure));
    }

    #[test]
    fn cancellable_pend_returns_once_posted() {
        let osal = osal();
        let sema = osal.semaphore_create(0).unwrap();

        let poster = {
            let osal = Arc::clone(&osal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                osal.semaphore_post(sema, 1).unwrap();
            })
        };

        assert_eq!(osal.semaphore_cancellable_pend(sema, None), Ok(()));
        poster.join().unwrap();
    }

    #[test]
    fn cancellable_pend_times_out() {
        let osal = osal();
        let sema = osal.semaphore_create(0).unwrap();

        let started = Instant::now();
        assert_eq!(
            osal.semaphore_cancellable_pend(sema, Some(30)),
            Err(Error::Timeout)
        );
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancellable_pend_of_a_cancelled_thread_is_interrupted() {
        let osal = osal();
        let sema = osal.semaphore_create(1).unwrap();
        osal.thread_cancel(osal.thread_get_handle()).unwrap();

        assert_eq!(
            osal.semaphore_cancellable_pend(sema, None),
            Err(Error::Interrupted)
        );
        assert_eq!(osal.semaphore_pend(sema, Some(0)), Ok(()));
    }

    #[test]
    fn cancellable_pend_needs_a_registered_caller() {
        let osal = osal();
        let sema = osal.semaphore_create(1).unwrap();

        let result = {
            let osal = Arc::clone(&osal);
            thread::spawn(move || osal.semaphore_cancellable_pend(sema, None))
                .join()
                .unwrap()
        };

        assert_eq!(result, Err(Error::GeneralFailure));
    }
}
