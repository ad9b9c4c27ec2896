//! Runtime configuration of the OS abstraction layer.

use core::{ops::Range, time::Duration};

use vita_sys_thread::{DEFAULT_POLL_INTERVAL, MIN_STACK_SIZE, ThreadConfig};
use vita_sys_thread_tls::{TLS_SLOT_END, TLS_SLOT_START};

/// Default per-iteration wait of a cancellable semaphore pend.
pub const DEFAULT_SEMA_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tunables of an [`Osal`](crate::Osal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsalConfig {
    /// Longest single kernel wait of a cancellable thread join. Bounds the
    /// latency between a cancellation request and its observation.
    pub poll_interval: Duration,
    /// Longest single kernel wait of a cancellable semaphore pend.
    pub sema_poll_interval: Duration,
    /// Requested stack sizes below this value are raised to it.
    pub min_stack_size: usize,
    /// Range of the reserved TLS words handed out as keys.
    pub tls_keys: Range<u32>,
}

impl OsalConfig {
    /// Returns the part of the configuration used by the thread manager.
    pub fn thread_config(&self) -> ThreadConfig {
        ThreadConfig {
            poll_interval: self.poll_interval,
            min_stack_size: self.min_stack_size,
        }
    }
}

impl Default for OsalConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            sema_poll_interval: DEFAULT_SEMA_POLL_INTERVAL,
            min_stack_size: MIN_STACK_SIZE,
            tls_keys: TLS_SLOT_START..TLS_SLOT_END,
        }
    }
}
