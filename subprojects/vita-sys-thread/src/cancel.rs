//! # Cooperative cancellation
//!
//! The Vita kernel cannot interrupt a thread blocked in a wait from the
//! outside. Cancellation is therefore cooperative: every thread owns a
//! [`CancelSignal`], an event flag whose [`CANCEL_BIT`] is set to request
//! cancellation, and every wait that must be cancellable is split into short
//! kernel waits with a poll of the signal in between ([`wait_cancellable`]).
//!
//! ## Semantics
//!
//! - The cancellation bit is *sticky*: it is never cleared once raised, and
//!   raising it again has no further effect.
//! - The signal is polled *before* each kernel wait, so a cancellation raised
//!   before the wait started is honoured without waiting at all.
//! - A cancellation raised while a kernel wait is in progress is observed once
//!   that wait returns, i.e. after at most one polling interval.
//! - With an overall timeout, the remaining time bounds every kernel wait and
//!   [`CancellableWaitError::TimedOut`] is returned once it is used up, even if
//!   a cancellation arrived in the meantime.

use core::time::Duration;

use vita_svc::{
    EventFlagId, misc,
    raw::{EventWaitMode, Kernel},
    sync::{
        self as svc, CreateObjectError, DeleteObjectError, PollEventFlagError, SetEventFlagError,
        WaitSemaError,
    },
    thread::WaitThreadEndError,
};

use crate::LookupError;

/// Event flag bit carrying a cancellation request.
pub const CANCEL_BIT: u32 = 0x1;

const SIGNAL_NAME: &str = "pthread_cancel";

/// A thread's cancellation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelSignal(EventFlagId);

impl CancelSignal {
    /// Creates a signal with no cancellation pending.
    pub fn create<K: Kernel + ?Sized>(kernel: &K) -> Result<Self, CreateObjectError> {
        svc::create_event_flag(kernel, SIGNAL_NAME).map(Self)
    }

    /// Destroys the signal.
    pub fn destroy<K: Kernel + ?Sized>(self, kernel: &K) -> Result<(), DeleteObjectError> {
        svc::delete_event_flag(kernel, self.0)
    }

    /// Requests cancellation.
    pub fn raise<K: Kernel + ?Sized>(&self, kernel: &K) -> Result<(), SetEventFlagError> {
        svc::set_event_flag(kernel, self.0, CANCEL_BIT)
    }

    /// Returns `true` if cancellation was requested. The request stays pending.
    pub fn is_raised<K: Kernel + ?Sized>(&self, kernel: &K) -> Result<bool, PollEventFlagError> {
        match svc::poll_event_flag(kernel, self.0, CANCEL_BIT, EventWaitMode::AND) {
            Ok(pattern) => Ok(pattern & CANCEL_BIT != 0),
            Err(PollEventFlagError::NotSatisfied) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Returns the id of the underlying event flag.
    pub fn id(&self) -> EventFlagId {
        self.0
    }
}

/// Errors that tell whether a bounded kernel wait simply ran out of time.
///
/// [`wait_cancellable`] retries the kernel wait on timeouts and gives up on
/// every other error.
pub trait TimeoutError {
    /// Returns `true` if the wait expired without the awaited condition.
    fn is_timeout(&self) -> bool;
}

impl TimeoutError for WaitSemaError {
    fn is_timeout(&self) -> bool {
        matches!(self, WaitSemaError::TimedOut)
    }
}

impl TimeoutError for WaitThreadEndError {
    fn is_timeout(&self) -> bool {
        matches!(self, WaitThreadEndError::TimedOut)
    }
}

/// Runs `wait` in slices of at most `interval` until it succeeds, polling
/// `signal` before every slice.
///
/// `wait` receives the timeout of the slice and must block for at most that
/// long. `timeout` bounds the whole operation; `None` waits until `wait`
/// succeeds or a cancellation is observed.
pub fn wait_cancellable<K, T, E>(
    kernel: &K,
    signal: CancelSignal,
    timeout: Option<Duration>,
    interval: Duration,
    mut wait: impl FnMut(Duration) -> Result<T, E>,
) -> Result<T, CancellableWaitError<E>>
where
    K: Kernel + ?Sized,
    E: TimeoutError,
{
    let start = misc::process_time(kernel);

    loop {
        if signal
            .is_raised(kernel)
            .map_err(CancellableWaitError::Poll)?
        {
            return Err(CancellableWaitError::Interrupted);
        }

        let slice = match timeout {
            Some(timeout) => {
                let elapsed = misc::process_time(kernel).saturating_sub(start);
                interval.min(timeout.saturating_sub(elapsed))
            }
            None => interval,
        };

        match wait(slice) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_timeout() => {}
            Err(err) => return Err(CancellableWaitError::Wait(err)),
        }

        if let Some(timeout) = timeout {
            if misc::process_time(kernel).saturating_sub(start) >= timeout {
                return Err(CancellableWaitError::TimedOut);
            }
        }
    }
}

/// Error type of the cancellable waits.
#[derive(Debug, thiserror::Error)]
pub enum CancellableWaitError<E> {
    /// Cancellation of the waiting thread was requested.
    #[error("Wait interrupted by a cancellation request")]
    Interrupted,
    /// The overall timeout expired.
    #[error("Operation timed out")]
    TimedOut,
    /// The cancellation signal of the waiting thread could not be found.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// Polling the cancellation signal failed.
    #[error("Failed to poll the cancellation signal: {0}")]
    Poll(PollEventFlagError),
    /// The kernel wait failed for a reason other than a timeout.
    #[error("Wait failed: {0}")]
    Wait(E),
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::{sync::Arc, vec::Vec};
    use core::{cell::RefCell, time::Duration};
    use std::{thread, time::Instant};

    use vita_svc::host::HostKernel;

    use super::{CancelSignal, CancellableWaitError, TimeoutError, wait_cancellable};

    #[derive(Debug, PartialEq, Eq)]
    enum SliceError {
        TimedOut,
        Broken,
    }

    impl TimeoutError for SliceError {
        fn is_timeout(&self) -> bool {
            *self == SliceError::TimedOut
        }
    }

    /// A wait that never succeeds and blocks for the whole slice.
    fn never(slice: Duration) -> Result<(), SliceError> {
        thread::sleep(slice);
        Err(SliceError::TimedOut)
    }

    #[test]
    fn raised_signal_stays_raised() {
        let kernel = HostKernel::new();
        let signal = CancelSignal::create(&kernel).unwrap();
        assert!(!signal.is_raised(&kernel).unwrap());

        signal.raise(&kernel).unwrap();
        signal.raise(&kernel).unwrap();

        assert!(signal.is_raised(&kernel).unwrap());
        assert!(signal.is_raised(&kernel).unwrap());
    }

    #[test]
    fn pending_cancellation_is_honoured_before_waiting() {
        let kernel = HostKernel::new();
        let signal = CancelSignal::create(&kernel).unwrap();
        signal.raise(&kernel).unwrap();

        let mut calls = 0;
        let result = wait_cancellable(&kernel, signal, None, Duration::from_millis(5), |_| {
            calls += 1;
            Ok::<_, SliceError>(())
        });

        assert!(matches!(result, Err(CancellableWaitError::Interrupted)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn success_is_returned_as_is() {
        let kernel = HostKernel::new();
        let signal = CancelSignal::create(&kernel).unwrap();

        let mut remaining = 3;
        let result = wait_cancellable(&kernel, signal, None, Duration::from_millis(1), |_| {
            remaining -= 1;
            if remaining == 0 {
                Ok(42)
            } else {
                Err(SliceError::TimedOut)
            }
        });

        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn other_failures_end_the_wait() {
        let kernel = HostKernel::new();
        let signal = CancelSignal::create(&kernel).unwrap();

        let result = wait_cancellable(&kernel, signal, None, Duration::from_millis(1), |_| {
            Err::<(), _>(SliceError::Broken)
        });

        assert!(matches!(
            result,
            Err(CancellableWaitError::Wait(SliceError::Broken))
        ));
    }

    #[test]
    fn overall_timeout_wins_when_no_cancellation_arrives() {
        let kernel = HostKernel::new();
        let signal = CancelSignal::create(&kernel).unwrap();

        let started = Instant::now();
        let result = wait_cancellable(
            &kernel,
            signal,
            Some(Duration::from_millis(30)),
            Duration::from_millis(10),
            never,
        );

        assert!(matches!(result, Err(CancellableWaitError::TimedOut)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn slices_never_exceed_the_interval_or_the_remaining_time() {
        let kernel = HostKernel::new();
        let signal = CancelSignal::create(&kernel).unwrap();
        let timeout = Duration::from_millis(25);
        let interval = Duration::from_millis(10);

        let slices = RefCell::new(Vec::new());
        let result = wait_cancellable(&kernel, signal, Some(timeout), interval, |slice| {
            slices.borrow_mut().push(slice);
            never(slice.min(Duration::from_millis(1)))
        });

        assert!(matches!(result, Err(CancellableWaitError::TimedOut)));
        let slices = slices.into_inner();
        assert!(slices.iter().all(|slice| *slice <= interval));
        assert!(slices.iter().any(|slice| *slice < interval));
    }

    #[test]
    fn zero_timeout_still_tries_once() {
        let kernel = HostKernel::new();
        let signal = CancelSignal::create(&kernel).unwrap();

        let mut slices = Vec::new();
        let result = wait_cancellable(
            &kernel,
            signal,
            Some(Duration::ZERO),
            Duration::from_millis(10),
            |slice| {
                slices.push(slice);
                Err::<(), _>(SliceError::TimedOut)
            },
        );

        assert!(matches!(result, Err(CancellableWaitError::TimedOut)));
        assert_eq!(slices, [Duration::ZERO]);
    }

    #[test]
    fn cancellation_during_the_wait_is_observed_within_one_interval() {
        let kernel = Arc::new(HostKernel::new());
        let signal = CancelSignal::create(&*kernel).unwrap();
        let interval = Duration::from_millis(10);

        let canceller = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                signal.raise(&*kernel).unwrap();
                Instant::now()
            })
        };

        let result = wait_cancellable(&*kernel, signal, None, interval, never);
        let observed = Instant::now();
        let raised = canceller.join().unwrap();

        assert!(matches!(result, Err(CancellableWaitError::Interrupted)));
        // One interval plus scheduling slack.
        assert!(observed.duration_since(raised) < interval * 5);
    }
}
