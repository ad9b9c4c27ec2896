//! Mutexes.
//!
//! Plain, non-recursive kernel mutexes. The pthread layer builds its own
//! mutex flavours on top of them.

use core::time::Duration;

use vita_svc::{
    MutexId,
    raw::{Kernel, MutexAttr},
    sync as svc,
};

use crate::{Error, Osal};

const MUTEX_NAME: &str = "pte_mutex";

impl<K: Kernel> Osal<K> {
    pub fn mutex_create(&self) -> Result<MutexId, Error> {
        Ok(svc::create_mutex(&**self.kernel(), MUTEX_NAME, MutexAttr::empty())?)
    }

    pub fn mutex_delete(&self, mutex: MutexId) -> Result<(), Error> {
        Ok(svc::delete_mutex(&**self.kernel(), mutex)?)
    }

    /// Locks `mutex`, blocking until it is available.
    pub fn mutex_lock(&self, mutex: MutexId) -> Result<(), Error> {
        Ok(svc::lock_mutex(&**self.kernel(), mutex, None)?)
    }

    /// Locks `mutex`, giving up with [`Error::Timeout`] after `timeout_ms`.
    pub fn mutex_timed_lock(&self, mutex: MutexId, timeout_ms: u32) -> Result<(), Error> {
        let timeout = Duration::from_millis(u64::from(timeout_ms));
        Ok(svc::lock_mutex(&**self.kernel(), mutex, Some(timeout))?)
    }

    pub fn mutex_unlock(&self, mutex: MutexId) -> Result<(), Error> {
        Ok(svc::unlock_mutex(&**self.kernel(), mutex)?)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::sync::Arc;
    use std::{sync::mpsc, thread};

    use vita_svc::host::HostKernel;

    use crate::{Error, Osal};

    fn osal() -> Arc<Osal<HostKernel>> {
        Arc::new(Osal::new(Arc::new(HostKernel::new())).unwrap())
    }

    #[test]
    fn lock_and_unlock() {
        let osal = osal();
        let mutex = osal.mutex_create().unwrap();

        osal.mutex_lock(mutex).unwrap();
        osal.mutex_unlock(mutex).unwrap();
        osal.mutex_timed_lock(mutex, 10).unwrap();
        osal.mutex_unlock(mutex).unwrap();

        osal.mutex_delete(mutex).unwrap();
        assert_eq!(osal.kernel().live_mutexes(), 1);
    }

    #[test]
    fn timed_lock_of_a_held_mutex_times_out() {
        let osal = osal();
        let mutex = osal.mutex_create().unwrap();
        let (locked, wait_locked) = mpsc::channel();
        let (release, wait_release) = mpsc::channel::<()>();

        let holder = {
            let osal = Arc::clone(&osal);
            thread::spawn(move || {
                osal.mutex_lock(mutex).unwrap();
                locked.send(()).unwrap();
                wait_release.recv().unwrap();
                osal.mutex_unlock(mutex).unwrap();
            })
        };
        wait_locked.recv().unwrap();

        assert_eq!(osal.mutex_timed_lock(mutex, 10), Err(Error::Timeout));

        release.send(()).unwrap();
        holder.join().unwrap();
        assert_eq!(osal.mutex_timed_lock(mutex, 1000), Ok(()));
    }

    #[test]
    fn failures_are_general_failures() {
        let osal = osal();
        let mutex = osal.mutex_create().unwrap();

        assert_eq!(osal.mutex_unlock(mutex), Err(Error::GeneralFailure));
        osal.mutex_lock(mutex).unwrap();
        assert_eq!(osal.mutex_lock(mutex), Err(Error::GeneralFailure));

        osal.mutex_unlock(mutex).unwrap();
        osal.mutex_delete(mutex).unwrap();
        assert_eq!(osal.mutex_lock(mutex), Err(Error::GeneralFailure));
        assert_eq!(osal.mutex_delete(mutex), Err(Error::GeneralFailure));
    }
}
