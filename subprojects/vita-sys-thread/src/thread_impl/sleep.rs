//! Sleeping.

use core::time::Duration;

use vita_svc::{raw::Kernel, thread as svc};

use super::ThreadManager;

impl<K: Kernel> ThreadManager<K> {
    /// Suspends the calling thread for at least `ms` milliseconds.
    pub fn sleep(&self, ms: u32) {
        svc::delay(&*self.shared.kernel, Duration::from_millis(u64::from(ms)));
    }
}
