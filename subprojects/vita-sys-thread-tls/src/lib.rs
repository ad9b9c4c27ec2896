//! # Thread-Local Storage (TLS) keys for the PS Vita
//!
//! Every Vita thread owns a *reserved TLS region*: an array of
//! [`RESERVED_TLS_WORDS`] pointer-sized words the kernel hands out through
//! `sceKernelGetTLSAddr`. The first `0x100` words belong to the system
//! libraries. The POSIX thread layer claims the words in
//! `TLS_SLOT_START..TLS_SLOT_END` for its `pthread_key_t` keys.
//!
//! ```text
//! reserved TLS region
//! 0x000  ┌────────────────────────────┐
//!        │ System libraries           │ 0x100 words
//! 0x100  ├────────────────────────────┤  ╮
//!        │ Key 0x100                  │  │
//!        │ Key 0x101                  │  │ POSIX thread keys
//!        │ ...                        │  │ one word per key, per thread
//!        │ Key 0x1FF                  │  │
//! 0x200  └────────────────────────────┘  ╯
//! ```
//!
//! ## Allocation
//!
//! Keys are **process-global**: a key names the same word in every thread's
//! region. [`SlotAllocator`] hands them out from a single atomic cursor, so
//! allocation never takes a lock and never returns the same key twice.
//!
//! Keys are not reclaimed. [`SlotAllocator::free`] accepts a key and does
//! nothing, so a process can allocate at most `TLS_SLOT_END - TLS_SLOT_START`
//! keys over its lifetime.
//!
//! ## Access
//!
//! [`get`] and [`set`] resolve a key to the calling thread's word and read or
//! write it. No synchronization is involved since each thread only touches its
//! own region.

#![no_std]

use core::{
    ffi::c_void,
    fmt,
    ops::Range,
    sync::atomic::{AtomicU32, Ordering},
};

use static_assertions::const_assert;
use vita_svc::{misc, raw::Kernel};

pub use vita_svc::raw::RESERVED_TLS_WORDS;

/// First word of the reserved region used for POSIX thread keys.
pub const TLS_SLOT_START: u32 = 0x100;

/// End (exclusive) of the words used for POSIX thread keys.
pub const TLS_SLOT_END: u32 = 0x200;

const_assert!(TLS_SLOT_START < TLS_SLOT_END);
const_assert!(TLS_SLOT_END <= RESERVED_TLS_WORDS);

/// A TLS key: the index of a word in the reserved TLS region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TlsKey(u32);

impl TlsKey {
    /// Converts a raw word index to a [`TlsKey`].
    ///
    /// # Safety
    ///
    /// The caller must guarantee that `raw` was handed out by a
    /// [`SlotAllocator`].
    pub const unsafe fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the word index of this key.
    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TlsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Error type for TLS key operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TlsError {
    /// Every key of the range has already been handed out.
    #[error("No TLS key left")]
    Exhausted,
    /// The key does not resolve to a word of the calling thread's region.
    #[error("TLS key {0} does not resolve to a reserved word")]
    Unresolved(TlsKey),
}

/// Lock-free allocator of [`TlsKey`]s.
#[derive(Debug)]
pub struct SlotAllocator {
    cursor: AtomicU32,
    end: u32,
}

impl SlotAllocator {
    /// Creates an allocator over `TLS_SLOT_START..TLS_SLOT_END`.
    pub const fn new() -> Self {
        Self::with_range(TLS_SLOT_START..TLS_SLOT_END)
    }

    /// Creates an allocator over `range`.
    ///
    /// The end of the range is capped to the size of the reserved region.
    pub const fn with_range(range: Range<u32>) -> Self {
        let end = if range.end > RESERVED_TLS_WORDS {
            RESERVED_TLS_WORDS
        } else {
            range.end
        };

        Self {
            cursor: AtomicU32::new(range.start),
            end,
        }
    }

    /// Hands out the next unused key.
    ///
    /// The cursor only advances while it is below the end of the range, so
    /// concurrent callers each receive a distinct key and exhaustion is
    /// reported without ever overshooting.
    pub fn alloc(&self) -> Result<TlsKey, TlsError> {
        self.cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                (next < self.end).then_some(next + 1)
            })
            .map(TlsKey)
            .map_err(|_| TlsError::Exhausted)
    }

    /// Releases a key.
    ///
    /// Keys are never reused, so this is a no-op.
    #[inline]
    pub fn free(&self, _key: TlsKey) {}

    /// Number of keys that can still be handed out.
    pub fn remaining(&self) -> u32 {
        self.end.saturating_sub(self.cursor.load(Ordering::SeqCst))
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the calling thread's value for `key`.
///
/// A key that was never set on this thread reads as null.
pub fn get<K: Kernel + ?Sized>(kernel: &K, key: TlsKey) -> Result<*mut c_void, TlsError> {
    let word = misc::reserved_tls_addr(kernel, key.0).ok_or(TlsError::Unresolved(key))?;

    // SAFETY: The kernel hands out the address of a word of the calling
    // thread's own region, valid and aligned for the lifetime of the thread.
    Ok(unsafe { word.as_ptr().read() })
}

/// Stores `value` as the calling thread's value for `key`.
pub fn set<K: Kernel + ?Sized>(
    kernel: &K,
    key: TlsKey,
    value: *mut c_void,
) -> Result<(), TlsError> {
    let word = misc::reserved_tls_addr(kernel, key.0).ok_or(TlsError::Unresolved(key))?;

    // SAFETY: See `get`. No other thread accesses this word.
    unsafe { word.as_ptr().write(value) };

    Ok(())
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    extern crate std;

    use alloc::{boxed::Box, sync::Arc, vec::Vec};
    use core::ffi::c_void;
    use std::{collections::HashSet, thread};

    use vita_svc::{host::HostKernel, raw::Kernel};

    use super::{SlotAllocator, TLS_SLOT_END, TLS_SLOT_START, TlsError, TlsKey, get, set};

    #[test]
    fn keys_start_at_the_beginning_of_the_range() {
        let slots = SlotAllocator::new();

        assert_eq!(slots.alloc(), Ok(TlsKey(TLS_SLOT_START)));
        assert_eq!(slots.alloc(), Ok(TlsKey(TLS_SLOT_START + 1)));
    }

    #[test]
    fn allocation_is_exhausted_after_the_last_key() {
        let slots = SlotAllocator::new();
        for _ in TLS_SLOT_START..TLS_SLOT_END {
            assert!(slots.alloc().is_ok());
        }

        assert_eq!(slots.remaining(), 0);
        assert_eq!(slots.alloc(), Err(TlsError::Exhausted));
        assert_eq!(slots.alloc(), Err(TlsError::Exhausted));
    }

    #[test]
    fn freed_keys_are_not_reused() {
        let slots = SlotAllocator::with_range(0x100..0x102);
        let first = slots.alloc().unwrap();
        slots.free(first);

        assert_eq!(slots.alloc(), Ok(TlsKey(0x101)));
        assert_eq!(slots.alloc(), Err(TlsError::Exhausted));
    }

    #[test]
    fn range_end_is_capped_to_the_reserved_region() {
        let slots = SlotAllocator::with_range(0x1FF..0x400);

        assert_eq!(slots.remaining(), 1);
    }

    #[test]
    fn concurrent_allocation_hands_out_unique_keys() {
        let slots = Arc::new(SlotAllocator::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let slots = Arc::clone(&slots);
                thread::spawn(move || {
                    let mut keys = Vec::new();
                    while let Ok(key) = slots.alloc() {
                        keys.push(key);
                    }
                    keys
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            for key in worker.join().unwrap() {
                assert!(seen.insert(key), "key {key} handed out twice");
            }
        }
        assert_eq!(seen.len(), (TLS_SLOT_END - TLS_SLOT_START) as usize);
    }

    #[test]
    fn values_are_per_thread() {
        let kernel = Arc::new(HostKernel::new());
        let slots = SlotAllocator::new();
        let key = slots.alloc().unwrap();

        set(&*kernel, key, 0xBEEF as *mut c_void).unwrap();
        assert_eq!(get(&*kernel, key), Ok(0xBEEF as *mut c_void));

        let other = Arc::clone(&kernel);
        let thid = kernel
            .create_thread(
                "tls",
                Box::new(move || match get(&*other, key) {
                    Ok(value) if value.is_null() => 1,
                    _ => 0,
                }),
                160,
                0x1000,
            )
            .unwrap();
        kernel.start_thread(thid).unwrap();

        assert_eq!(kernel.wait_thread_end(thid, None), Ok(1));
        assert_eq!(get(&*kernel, key), Ok(0xBEEF as *mut c_void));
    }

    #[test]
    fn keys_outside_the_region_are_unresolved() {
        let kernel = HostKernel::new();
        let key = TlsKey(0x200);

        assert_eq!(get(&kernel, key), Err(TlsError::Unresolved(key)));
        assert_eq!(
            set(&kernel, key, core::ptr::null_mut()),
            Err(TlsError::Unresolved(key))
        );
    }
}
