//! Thread-local storage keys.
//!
//! Keys index words of the kernel's reserved per-thread region. They are
//! handed out once and never reused: [`Osal::tls_free`] accepts a key and does
//! nothing with it.

use core::ffi::c_void;

use vita_svc::raw::Kernel;
use vita_sys_thread_tls::{self as tls, TlsKey};

use crate::{Error, Osal};

impl<K: Kernel> Osal<K> {
    /// Allocates a key, failing with [`Error::NoResources`] once the key range
    /// is used up.
    pub fn tls_alloc(&self) -> Result<TlsKey, Error> {
        let key = self.tls.alloc()?;
        log::trace!("allocated TLS key {key}");
        Ok(key)
    }

    pub fn tls_free(&self, key: TlsKey) -> Result<(), Error> {
        self.tls.free(key);
        Ok(())
    }

    /// Returns the calling thread's value for `key`, null if never set.
    pub fn tls_get(&self, key: TlsKey) -> Result<*mut c_void, Error> {
        Ok(tls::get(&**self.kernel(), key)?)
    }

    /// Sets the calling thread's value for `key`.
    pub fn tls_set(&self, key: TlsKey, value: *mut c_void) -> Result<(), Error> {
        Ok(tls::set(&**self.kernel(), key, value)?)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::{sync::Arc, vec::Vec};
    use core::ffi::c_void;
    use std::{collections::HashSet, thread};

    use vita_svc::host::HostKernel;
    use vita_sys_thread_tls::TlsKey;

    use crate::{Error, Osal, OsalConfig};

    fn osal() -> Arc<Osal<HostKernel>> {
        Arc::new(Osal::new(Arc::new(HostKernel::new())).unwrap())
    }

    #[test]
    fn range_is_exhausted_after_256_keys() {
        let osal = osal();

        let keys: HashSet<_> = (0..256).map(|_| osal.tls_alloc().unwrap()).collect();

        assert_eq!(keys.len(), 256);
        assert!(keys.iter().all(|key| (0x100..0x200).contains(&key.to_raw())));
        assert_eq!(osal.tls_alloc(), Err(Error::NoResources));
    }

    #[test]
    fn freed_keys_are_not_reused() {
        let config = OsalConfig {
            tls_keys: 0x100..0x102,
            ..OsalConfig::default()
        };
        let osal = Osal::with_config(Arc::new(HostKernel::new()), config).unwrap();

        let first = osal.tls_alloc().unwrap();
        osal.tls_free(first).unwrap();
        let second = osal.tls_alloc().unwrap();

        assert_ne!(first, second);
        assert_eq!(osal.tls_alloc(), Err(Error::NoResources));
    }

    #[test]
    fn concurrent_allocations_are_unique() {
        let osal = osal();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let osal = Arc::clone(&osal);
                thread::spawn(move || {
                    (0..64)
                        .map(|_| osal.tls_alloc().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let keys: HashSet<TlsKey> = workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect();

        assert_eq!(keys.len(), 256);
    }

    #[test]
    fn values_are_per_thread() {
        let osal = osal();
        let key = osal.tls_alloc().unwrap();
        let mut local = 7_u32;
        let value = &mut local as *mut u32 as *mut c_void;

        osal.tls_set(key, value).unwrap();

        assert_eq!(osal.tls_get(key), Ok(value));
        let other = {
            let osal = Arc::clone(&osal);
            thread::spawn(move || osal.tls_get(key).map(|ptr| ptr.is_null()))
                .join()
                .unwrap()
        };
        assert_eq!(other, Ok(true));
    }

    #[test]
    fn key_outside_the_region_is_a_general_failure() {
        let osal = osal();
        let key = unsafe { TlsKey::from_raw(0x200) };

        assert_eq!(osal.tls_get(key), Err(Error::GeneralFailure));
        assert_eq!(
            osal.tls_set(key, core::ptr::null_mut()),
            Err(Error::GeneralFailure)
        );
    }
}
