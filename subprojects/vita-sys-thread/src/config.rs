//! Thread manager configuration.

use core::time::Duration;

/// Default interval between two checks of the cancellation signal.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Smallest stack given to a new thread, in bytes.
pub const MIN_STACK_SIZE: usize = 0x1000;

/// Tunables of a [`ThreadManager`](crate::ThreadManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadConfig {
    /// Longest single kernel wait inside a cancellable wait.
    ///
    /// This bounds the delay between a cancellation request and the waiter
    /// observing it. Shorter intervals react faster at the cost of more kernel
    /// calls.
    pub poll_interval: Duration,

    /// Requested stack sizes below this value are raised to it.
    pub min_stack_size: usize,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_stack_size: MIN_STACK_SIZE,
        }
    }
}
