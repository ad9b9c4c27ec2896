//! Machine-word atomic operations.
//!
//! The POSIX thread layer needs a handful of read-modify-write primitives on
//! word-sized integers. All of them use sequentially consistent ordering.
//!
//! [`exchange`], [`compare_and_swap`] and [`fetch_add`] return the value held
//! *before* the operation; [`increment`] and [`decrement`] return the value
//! held *after* it. Arithmetic wraps on overflow.

use core::sync::atomic::{AtomicI32, AtomicIsize, AtomicU32, AtomicUsize, Ordering};

use static_assertions::const_assert_eq;

const_assert_eq!(size_of::<AtomicIsize>(), size_of::<usize>());
const_assert_eq!(size_of::<AtomicI32>(), size_of::<i32>());

mod sealed {
    pub trait Sealed {}
}

/// An atomic integer usable with the functions of this module.
///
/// This trait is sealed and implemented for [`AtomicI32`], [`AtomicIsize`],
/// [`AtomicU32`] and [`AtomicUsize`].
pub trait AtomicWord: sealed::Sealed {
    /// The plain integer type stored in the atomic.
    type Value: Copy + Eq;

    #[doc(hidden)]
    fn swap_value(&self, value: Self::Value) -> Self::Value;

    #[doc(hidden)]
    fn cas_value(&self, current: Self::Value, new: Self::Value) -> Self::Value;

    #[doc(hidden)]
    fn add_value(&self, delta: Self::Value) -> Self::Value;

    #[doc(hidden)]
    fn add_one(&self) -> Self::Value;

    #[doc(hidden)]
    fn sub_one(&self) -> Self::Value;
}

macro_rules! impl_atomic_word {
    ($($atomic:ty => $value:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $atomic {}

            impl AtomicWord for $atomic {
                type Value = $value;

                #[inline]
                fn swap_value(&self, value: $value) -> $value {
                    self.swap(value, Ordering::SeqCst)
                }

                #[inline]
                fn cas_value(&self, current: $value, new: $value) -> $value {
                    match self.compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst) {
                        Ok(previous) | Err(previous) => previous,
                    }
                }

                #[inline]
                fn add_value(&self, delta: $value) -> $value {
                    self.fetch_add(delta, Ordering::SeqCst)
                }

                #[inline]
                fn add_one(&self) -> $value {
                    self.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
                }

                #[inline]
                fn sub_one(&self) -> $value {
                    self.fetch_sub(1, Ordering::SeqCst).wrapping_sub(1)
                }
            }
        )*
    };
}

impl_atomic_word! {
    AtomicI32 => i32,
    AtomicIsize => isize,
    AtomicU32 => u32,
    AtomicUsize => usize,
}

/// Stores `value` into `target`, returning the previous value.
#[inline]
pub fn exchange<A: AtomicWord>(target: &A, value: A::Value) -> A::Value {
    target.swap_value(value)
}

/// Stores `new` into `target` if it currently holds `current`.
///
/// Returns the value observed before the operation. The store happened if and
/// only if the returned value equals `current`.
#[inline]
pub fn compare_and_swap<A: AtomicWord>(target: &A, current: A::Value, new: A::Value) -> A::Value {
    target.cas_value(current, new)
}

/// Adds `delta` to `target`, returning the previous value.
#[inline]
pub fn fetch_add<A: AtomicWord>(target: &A, delta: A::Value) -> A::Value {
    target.add_value(delta)
}

/// Adds one to `target`, returning the new value.
#[inline]
pub fn increment<A: AtomicWord>(target: &A) -> A::Value {
    target.add_one()
}

/// Subtracts one from `target`, returning the new value.
#[inline]
pub fn decrement<A: AtomicWord>(target: &A) -> A::Value {
    target.sub_one()
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::{sync::Arc, vec::Vec};
    use core::sync::atomic::{AtomicI32, AtomicIsize, AtomicU32, AtomicUsize, Ordering};
    use std::thread;

    use super::{compare_and_swap, decrement, exchange, fetch_add, increment};

    #[test]
    fn exchange_returns_previous_value() {
        let word = AtomicI32::new(3);

        assert_eq!(exchange(&word, 9), 3);
        assert_eq!(word.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn compare_and_swap_stores_only_on_match() {
        let word = AtomicUsize::new(10);

        assert_eq!(compare_and_swap(&word, 11, 20), 10);
        assert_eq!(word.load(Ordering::SeqCst), 10);

        assert_eq!(compare_and_swap(&word, 10, 20), 10);
        assert_eq!(word.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn fetch_add_returns_previous_value() {
        let word = AtomicIsize::new(-2);

        assert_eq!(fetch_add(&word, 5), -2);
        assert_eq!(word.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn increment_and_decrement_return_new_value() {
        let word = AtomicI32::new(0);

        assert_eq!(increment(&word), 1);
        assert_eq!(increment(&word), 2);
        assert_eq!(decrement(&word), 1);
    }

    #[test]
    fn arithmetic_wraps() {
        let word = AtomicU32::new(0);
        assert_eq!(decrement(&word), u32::MAX);
        assert_eq!(increment(&word), 0);

        let word = AtomicI32::new(i32::MAX);
        assert_eq!(increment(&word), i32::MIN);
    }

    #[test]
    fn contended_compare_and_swap_never_loses_an_update() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1000;

        let word = Arc::new(AtomicUsize::new(0));
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let word = Arc::clone(&word);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        let mut current = word.load(Ordering::SeqCst);
                        loop {
                            let observed = compare_and_swap(&*word, current, current + 1);
                            if observed == current {
                                break;
                            }
                            current = observed;
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(word.load(Ordering::SeqCst), THREADS * PER_THREAD);
    }

    #[test]
    fn contended_increments_yield_unique_values() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 500;

        let word = Arc::new(AtomicI32::new(0));
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let word = Arc::clone(&word);
                thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| increment(&*word))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen: Vec<i32> = workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect();
        seen.sort_unstable();

        let expected: Vec<i32> = (1..=(THREADS * PER_THREAD) as i32).collect();
        assert_eq!(seen, expected);
    }
}
