//! Clocks, delays and the reserved TLS region.

use core::{ffi::c_void, ptr::NonNull, time::Duration};

use crate::raw::{Kernel, RESERVED_TLS_WORDS};

/// Converts a timeout to the kernel's microsecond representation.
///
/// Durations that do not fit in a `u32` saturate to `u32::MAX` (a little over
/// 71 minutes), which the kernel treats as a finite wait.
#[inline]
pub fn timeout_us(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_micros()).unwrap_or(u32::MAX)
}

/// Returns the monotonic process time.
pub fn process_time<K: Kernel + ?Sized>(kernel: &K) -> Duration {
    Duration::from_micros(kernel.get_process_time_us())
}

/// Returns the wall-clock time as an offset from the Unix epoch.
pub fn rtc_time<K: Kernel + ?Sized>(kernel: &K) -> Duration {
    Duration::from_micros(kernel.get_rtc_time_us())
}

/// Real-time clock tick of the Unix epoch. Ticks count microseconds since
/// 0001-01-01T00:00:00Z.
pub const RTC_UNIX_EPOCH_TICK: u64 = 62_135_596_800_000_000;

/// Converts a real-time clock tick to microseconds since the Unix epoch.
///
/// Ticks before the epoch read as the epoch itself.
#[inline]
pub const fn rtc_tick_to_unix_us(tick: u64) -> u64 {
    tick.saturating_sub(RTC_UNIX_EPOCH_TICK)
}

/// Returns the address of word `key` of the calling thread's reserved TLS
/// region.
///
/// Keys past the end of the region are rejected here, before the kernel is
/// asked.
pub fn reserved_tls_addr<K: Kernel + ?Sized>(
    kernel: &K,
    key: u32,
) -> Option<NonNull<*mut c_void>> {
    if key >= RESERVED_TLS_WORDS {
        return None;
    }

    kernel.get_reserved_tls_addr(key)
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::{RTC_UNIX_EPOCH_TICK, rtc_tick_to_unix_us, timeout_us};

    #[test]
    fn timeout_is_converted_to_micros() {
        assert_eq!(timeout_us(Duration::from_millis(40)), 40_000);
        assert_eq!(timeout_us(Duration::ZERO), 0);
    }

    #[test]
    fn long_timeouts_saturate() {
        assert_eq!(timeout_us(Duration::from_secs(u64::MAX)), u32::MAX);
    }

    #[test]
    fn rtc_ticks_are_rebased_on_the_unix_epoch() {
        // 2024-01-01T00:00:00.250Z
        let tick = RTC_UNIX_EPOCH_TICK + 1_704_067_200_250_000;

        assert_eq!(rtc_tick_to_unix_us(tick), 1_704_067_200_250_000);
        assert_eq!(rtc_tick_to_unix_us(RTC_UNIX_EPOCH_TICK), 0);
        assert_eq!(rtc_tick_to_unix_us(1), 0);
    }
}
