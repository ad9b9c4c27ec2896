//! Priority translation.
//!
//! POSIX threads use "higher number, higher priority". The Vita kernel uses
//! the opposite: lower numbers are scheduled first. The POSIX range is the 64
//! values around [`DEFAULT_PRIORITY`]:
//!
//! ```text
//! POSIX   MIN_PRIORITY (128) ........ DEFAULT (160) ........ MAX_PRIORITY (191)
//! native               191 ........            159 ........               128
//! ```
//!
//! The mapping reflects a value across the range, `(MIN - p) + MAX`. A
//! reflection is its own inverse, so the same formula converts in both
//! directions and round-trips are exact.

use static_assertions::const_assert;
use vita_svc::raw::{HIGHEST_PRIORITY_USER, LOWEST_PRIORITY_USER};

/// Default POSIX priority.
pub const DEFAULT_PRIORITY: i32 = 160;

/// Lowest POSIX priority.
pub const MIN_PRIORITY: i32 = DEFAULT_PRIORITY - 32;

/// Highest POSIX priority.
pub const MAX_PRIORITY: i32 = DEFAULT_PRIORITY + 31;

// Every translated value must be a valid user thread priority.
const_assert!(reflect(MIN_PRIORITY) <= LOWEST_PRIORITY_USER);
const_assert!(reflect(MAX_PRIORITY) >= HIGHEST_PRIORITY_USER);

/// Converts a POSIX priority to the native scale.
pub const fn to_native(priority: i32) -> Result<i32, PriorityError> {
    if priority < MIN_PRIORITY || priority > MAX_PRIORITY {
        return Err(PriorityError::OutOfRange(priority));
    }

    Ok(reflect(priority))
}

/// Converts a native priority to the POSIX scale.
///
/// Native priorities that do not correspond to a POSIX priority are rejected.
pub const fn from_native(native: i32) -> Result<i32, PriorityError> {
    // The native image of the POSIX range is the range itself, reflected.
    if native < MIN_PRIORITY || native > MAX_PRIORITY {
        return Err(PriorityError::NotRepresentable(native));
    }

    Ok(reflect(native))
}

/// Returns [`MIN_PRIORITY`].
#[inline]
pub const fn min_priority() -> i32 {
    MIN_PRIORITY
}

/// Returns [`MAX_PRIORITY`].
#[inline]
pub const fn max_priority() -> i32 {
    MAX_PRIORITY
}

/// Returns [`DEFAULT_PRIORITY`].
#[inline]
pub const fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

const fn reflect(value: i32) -> i32 {
    (MIN_PRIORITY - value) + MAX_PRIORITY
}

/// Error returned by the priority conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PriorityError {
    /// The POSIX priority is outside `MIN_PRIORITY..=MAX_PRIORITY`.
    #[error("Priority {0} is out of range")]
    OutOfRange(i32),
    /// The native priority has no POSIX counterpart.
    #[error("Native priority {0} has no POSIX equivalent")]
    NotRepresentable(i32),
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY, PriorityError, from_native, to_native,
    };

    #[test]
    fn range_spans_64_levels_around_the_default() {
        assert_eq!(MIN_PRIORITY, 128);
        assert_eq!(MAX_PRIORITY, 191);
        assert_eq!(MAX_PRIORITY - MIN_PRIORITY + 1, 64);
    }

    #[test]
    fn higher_posix_priority_means_lower_native_value() {
        assert_eq!(to_native(MIN_PRIORITY), Ok(191));
        assert_eq!(to_native(MAX_PRIORITY), Ok(128));
        assert_eq!(to_native(DEFAULT_PRIORITY), Ok(159));
        assert!(to_native(150).unwrap() > to_native(151).unwrap());
    }

    #[test]
    fn every_priority_round_trips() {
        for priority in MIN_PRIORITY..=MAX_PRIORITY {
            let native = to_native(priority).unwrap();
            assert_eq!(from_native(native), Ok(priority));
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert_eq!(
            to_native(MIN_PRIORITY - 1),
            Err(PriorityError::OutOfRange(127))
        );
        assert_eq!(
            to_native(MAX_PRIORITY + 1),
            Err(PriorityError::OutOfRange(192))
        );
        assert_eq!(from_native(64), Err(PriorityError::NotRepresentable(64)));
        assert_eq!(
            from_native(i32::MIN),
            Err(PriorityError::NotRepresentable(i32::MIN))
        );
        assert_eq!(
            from_native(i32::MAX),
            Err(PriorityError::NotRepresentable(i32::MAX))
        );
    }
}
