//! # Thread registry
//!
//! A fixed arena of [`MAX_THREADS`] slots, one per thread known to a
//! [`ThreadManager`](crate::ThreadManager). Each occupied slot records the
//! thread's native id, the entry point and argument its trampoline runs, and
//! the [`CancelSignal`] used to interrupt its cancellable waits.
//!
//! ## Layout
//!
//! ```text
//! slot 0         bootstrap thread (set once by `init`, never released)
//! slot 1..256    threads created through the manager
//! ```
//!
//! ## Invariants
//!
//! - A slot is free iff it has no native id.
//! - No two occupied slots hold the same native id.
//! - A released slot has every field cleared at once.
//!
//! The registry itself is not synchronized. The manager keeps it behind its
//! recursive registry lock, and every method here must be called with that
//! lock held.

use core::{ffi::c_void, fmt, ptr};

use vita_svc::{ThreadId, raw::Kernel};

use crate::cancel::CancelSignal;

/// Number of slots in a [`Registry`], the bootstrap slot included.
pub const MAX_THREADS: usize = 256;

/// Slot of the bootstrap thread.
pub const BOOTSTRAP_SLOT: usize = 0;

/// User code run by a thread created through the manager. The return value
/// becomes the thread's exit status.
///
/// The signature matches the pthread layer's C entry points, which can be
/// registered as they are.
pub type ThreadEntry = extern "C-unwind" fn(ThreadArg) -> i32;

/// Opaque argument handed to a [`ThreadEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ThreadArg(*mut c_void);

// SAFETY: The registry never dereferences the pointer. It is handed over
// untouched to the entry point, whose owner is responsible for its use.
unsafe impl Send for ThreadArg {}
unsafe impl Sync for ThreadArg {}

impl ThreadArg {
    /// Wraps a raw pointer.
    #[inline]
    pub const fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    /// An argument that carries no data.
    #[inline]
    pub const fn null() -> Self {
        Self(ptr::null_mut())
    }

    /// Returns the wrapped pointer.
    #[inline]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

/// A registry slot.
#[derive(Clone, Copy)]
pub struct Slot {
    native_id: Option<ThreadId>,
    entry: Option<ThreadEntry>,
    arg: ThreadArg,
    signal: Option<CancelSignal>,
}

impl Slot {
    const EMPTY: Self = Self {
        native_id: None,
        entry: None,
        arg: ThreadArg::null(),
        signal: None,
    };

    /// Native id of the thread owning the slot, `None` if the slot is free.
    pub fn native_id(&self) -> Option<ThreadId> {
        self.native_id
    }

    /// Entry point run by the thread. The bootstrap thread has none.
    pub fn entry(&self) -> Option<ThreadEntry> {
        self.entry
    }

    /// Argument passed to the entry point.
    pub fn arg(&self) -> ThreadArg {
        self.arg
    }

    /// Cancellation signal of the thread.
    pub fn signal(&self) -> Option<CancelSignal> {
        self.signal
    }

    /// Returns `true` if no thread owns the slot.
    pub fn is_free(&self) -> bool {
        self.native_id.is_none()
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("native_id", &self.native_id)
            .field("has_entry", &self.entry.is_some())
            .field("arg", &self.arg)
            .field("signal", &self.signal)
            .finish()
    }
}

/// Fixed-capacity table of thread control entries.
pub struct Registry {
    slots: [Slot; MAX_THREADS],
}

impl Registry {
    /// Creates a registry with every slot free.
    pub const fn new() -> Self {
        Self {
            slots: [Slot::EMPTY; MAX_THREADS],
        }
    }

    /// Returns the first free slot, skipping the bootstrap slot.
    pub fn find_free_slot(&self) -> Result<usize, RegistryError> {
        self.slots
            .iter()
            .enumerate()
            .skip(BOOTSTRAP_SLOT + 1)
            .find(|(_, slot)| slot.is_free())
            .map(|(index, _)| index)
            .ok_or(RegistryError::Full)
    }

    /// Returns the slot owned by `native_id`.
    pub fn find_by_native_id(&self, native_id: ThreadId) -> Result<usize, RegistryError> {
        self.slots
            .iter()
            .position(|slot| slot.native_id == Some(native_id))
            .ok_or(RegistryError::NotFound(native_id))
    }

    /// Fills a free slot.
    ///
    /// Fails if the slot is taken or if `native_id` already owns another slot.
    pub fn reserve(
        &mut self,
        index: usize,
        native_id: ThreadId,
        entry: Option<ThreadEntry>,
        arg: ThreadArg,
        signal: CancelSignal,
    ) -> Result<(), RegistryError> {
        if self.find_by_native_id(native_id).is_ok() {
            return Err(RegistryError::AlreadyRegistered(native_id));
        }

        let slot = self
            .slots
            .get_mut(index)
            .ok_or(RegistryError::OutOfRange(index))?;
        if !slot.is_free() {
            return Err(RegistryError::SlotOccupied(index));
        }

        *slot = Slot {
            native_id: Some(native_id),
            entry,
            arg,
            signal: Some(signal),
        };

        Ok(())
    }

    /// Destroys the cancellation signal of a slot, then frees the slot.
    ///
    /// The bootstrap slot cannot be released.
    pub fn release<K: Kernel + ?Sized>(
        &mut self,
        kernel: &K,
        index: usize,
    ) -> Result<(), RegistryError> {
        if index == BOOTSTRAP_SLOT {
            return Err(RegistryError::Reserved(index));
        }

        let slot = self
            .slots
            .get_mut(index)
            .ok_or(RegistryError::OutOfRange(index))?;
        if slot.is_free() {
            return Err(RegistryError::SlotFree(index));
        }

        if let Some(signal) = slot.signal {
            if let Err(err) = signal.destroy(kernel) {
                log::warn!("failed to destroy cancellation signal of slot {index}: {err}");
            }
        }
        *slot = Slot::EMPTY;

        Ok(())
    }

    /// Destroys the cancellation signal of every occupied slot, the bootstrap
    /// slot included, and frees them all.
    pub(crate) fn clear<K: Kernel + ?Sized>(&mut self, kernel: &K) {
        for slot in self.slots.iter_mut().filter(|slot| !slot.is_free()) {
            if let Some(signal) = slot.signal {
                if let Err(err) = signal.destroy(kernel) {
                    log::warn!("failed to destroy cancellation signal: {err}");
                }
            }
            *slot = Slot::EMPTY;
        }
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_free()).count()
    }

    /// Returns the slot at `index`.
    pub fn entry(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Iterates over the occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_free())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Error type for registry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Every slot is taken.
    #[error("Thread registry is full")]
    Full,
    /// No slot is owned by the thread.
    #[error("Thread {0} is not registered")]
    NotFound(ThreadId),
    /// The thread already owns a slot.
    #[error("Thread {0} is already registered")]
    AlreadyRegistered(ThreadId),
    /// The slot is taken.
    #[error("Slot {0} is already occupied")]
    SlotOccupied(usize),
    /// The slot is not taken.
    #[error("Slot {0} is free")]
    SlotFree(usize),
    /// The slot is reserved for the bootstrap thread.
    #[error("Slot {0} is reserved")]
    Reserved(usize),
    /// The index is past the end of the registry.
    #[error("Slot {0} is out of range")]
    OutOfRange(usize),
}
