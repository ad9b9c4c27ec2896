use alloc::sync::Arc;

use vita_svc::raw::Kernel;
use vita_sys_thread::ThreadManager;
use vita_sys_thread_tls::SlotAllocator;

use crate::{Error, OsalConfig};

/// The OS abstraction layer of one process.
///
/// Owns the thread registry and the TLS key allocator. Threads created
/// through an `Osal` are only known to that instance.
pub struct Osal<K: Kernel> {
    pub(crate) threads: ThreadManager<K>,
    pub(crate) tls: SlotAllocator,
    pub(crate) config: OsalConfig,
}

impl<K: Kernel> Osal<K> {
    /// Creates a layer with the default configuration.
    pub fn new(kernel: Arc<K>) -> Result<Self, Error> {
        Self::with_config(kernel, OsalConfig::default())
    }

    /// Creates a layer with the given configuration.
    pub fn with_config(kernel: Arc<K>, config: OsalConfig) -> Result<Self, Error> {
        let threads = ThreadManager::new(kernel, config.thread_config())?;
        let tls = SlotAllocator::with_range(config.tls_keys.clone());

        Ok(Self {
            threads,
            tls,
            config,
        })
    }

    /// Registers the calling thread as the bootstrap thread.
    ///
    /// Must run before any thread operation other than
    /// [`thread_create`](Osal::thread_create), which initializes the layer on
    /// first use. Calling it again does nothing.
    pub fn init(&self) -> Result<(), Error> {
        self.threads.init()?;
        log::debug!("OS abstraction layer initialized");
        Ok(())
    }

    /// Returns `true` once the layer is initialized.
    pub fn is_initialized(&self) -> bool {
        self.threads.is_initialized()
    }

    /// Returns the kernel the layer runs on.
    pub fn kernel(&self) -> &Arc<K> {
        self.threads.kernel()
    }

    /// Returns the thread manager of the layer.
    pub fn threads(&self) -> &ThreadManager<K> {
        &self.threads
    }

    /// Returns the configuration of the layer.
    pub fn config(&self) -> &OsalConfig {
        &self.config
    }
}

impl<K: Kernel> core::fmt::Debug for Osal<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Osal")
            .field("threads", &self.threads)
            .field("tls", &self.tls)
            .field("config", &self.config)
            .finish()
    }
}
