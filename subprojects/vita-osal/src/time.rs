//! Wall-clock time.

use vita_svc::{misc, raw::Kernel};

use crate::Osal;

/// A wall-clock timestamp split the way `ftime` reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeB {
    /// Whole seconds since the Unix epoch.
    pub time: u64,
    /// Milliseconds within the second.
    pub millitm: u16,
}

impl<K: Kernel> Osal<K> {
    /// Reads the real-time clock.
    pub fn ftime(&self) -> TimeB {
        let now = misc::rtc_time(&**self.kernel());

        TimeB {
            time: now.as_secs(),
            // Always below 1000.
            millitm: now.subsec_millis() as u16,
        }
    }
}
