//! C interface of the OS abstraction layer.
//!
//! The pthread layer calls the layer through the `pte_os*` functions of
//! `pte_osal.h`. The adapters below translate their C conventions (raw
//! handles, out-pointers, optional timeouts passed by pointer, plain `int`
//! results) to [`Osal`] calls. The exported symbols live in `exports` and run
//! on a process-wide `Osal<VitaKernel>`, so they are only built for the
//! console.

use core::{
    ffi::{c_int, c_uint, c_void},
    ptr,
};

use vita_svc::{
    MutexId, SemaId, ThreadId,
    raw::{Kernel, Uid},
};
use vita_sys_thread::{ThreadArg, ThreadEntry};
use vita_sys_thread_tls::TlsKey;

use crate::{Error, OsResult, Osal, TimeB};

#[cfg(all(feature = "ffi", target_os = "vita"))]
mod exports;
#[cfg(all(feature = "runtime", target_os = "vita"))]
mod runtime;

/// Priority reported for a thread whose priority cannot be read. It lies
/// below the portable range.
pub const UNKNOWN_PRIORITY: c_int = 0;

/// `struct timeb`, as laid out by newlib.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct RawTimeB {
    pub time: i64,
    pub millitm: u16,
    pub timezone: i16,
    pub dstflag: i16,
}

impl From<TimeB> for RawTimeB {
    fn from(now: TimeB) -> Self {
        Self {
            time: i64::try_from(now.time).unwrap_or(i64::MAX),
            millitm: now.millitm,
            // UTC, no daylight saving.
            timezone: 0,
            dstflag: 0,
        }
    }
}

/// Runs `op` and stores its value through `out`.
///
/// A null `out` fails with [`OsResult::InvalidParam`] before `op` runs.
///
/// # Safety
///
/// `out` must be null or valid for writes.
unsafe fn write_out<T>(out: *mut T, op: impl FnOnce() -> Result<T, Error>) -> OsResult {
    if out.is_null() {
        return OsResult::InvalidParam;
    }

    match op() {
        Ok(value) => {
            // SAFETY: Non-null, valid for writes per the caller.
            unsafe { out.write(value) };
            OsResult::Ok
        }
        Err(err) => err.to_result(),
    }
}

/// Reads an optional timeout, in milliseconds.
///
/// # Safety
///
/// `timeout` must be null or valid for reads.
unsafe fn timeout_ms(timeout: *const c_uint) -> Option<u32> {
    // SAFETY: Null or valid for reads per the caller.
    unsafe { timeout.as_ref() }.copied()
}

// Handles coming from C are checked by the registry or by the kernel before
// any use, so wrapping them is sound.

fn thread(handle: Uid) -> ThreadId {
    // SAFETY: See above.
    unsafe { ThreadId::from_raw(handle) }
}

fn mutex(handle: Uid) -> MutexId {
    // SAFETY: See above.
    unsafe { MutexId::from_raw(handle) }
}

fn sema(handle: Uid) -> SemaId {
    // SAFETY: See above.
    unsafe { SemaId::from_raw(handle) }
}

fn tls_key(key: c_uint) -> TlsKey {
    // SAFETY: Keys outside the reserved region are rejected on access.
    unsafe { TlsKey::from_raw(key) }
}

/// `pte_osThreadCreate`. A negative stack size selects the minimum.
///
/// # Safety
///
/// `handle` must be null or valid for writes.
pub unsafe fn thread_create<K: Kernel>(
    osal: &Osal<K>,
    entry: Option<ThreadEntry>,
    stack_size: c_int,
    priority: c_int,
    argv: *mut c_void,
    handle: *mut Uid,
) -> OsResult {
    let Some(entry) = entry else {
        return OsResult::InvalidParam;
    };
    let stack_size = usize::try_from(stack_size).unwrap_or(0);

    // SAFETY: Forwarded from the caller.
    unsafe {
        write_out(handle, || {
            osal.thread_create(entry, stack_size, priority, ThreadArg::new(argv))
                .map(|thread| thread.to_raw())
        })
    }
}

pub fn thread_start<K: Kernel>(osal: &Osal<K>, handle: Uid) -> OsResult {
    osal.thread_start(thread(handle)).into()
}

pub fn thread_delete<K: Kernel>(osal: &Osal<K>, handle: Uid) -> OsResult {
    osal.thread_delete(thread(handle)).into()
}

pub fn thread_exit_and_delete<K: Kernel>(osal: &Osal<K>, handle: Uid) -> ! {
    osal.thread_exit_and_delete(thread(handle))
}

pub fn thread_wait_for_end<K: Kernel>(osal: &Osal<K>, handle: Uid) -> OsResult {
    osal.thread_wait_for_end(thread(handle)).into()
}

pub fn thread_cancel<K: Kernel>(osal: &Osal<K>, handle: Uid) -> OsResult {
    osal.thread_cancel(thread(handle)).into()
}

pub fn thread_check_cancel<K: Kernel>(osal: &Osal<K>, handle: Uid) -> OsResult {
    osal.thread_check_cancel(thread(handle)).into()
}

/// `pte_osThreadGetPriority`. Failures read as [`UNKNOWN_PRIORITY`].
pub fn thread_get_priority<K: Kernel>(osal: &Osal<K>, handle: Uid) -> c_int {
    osal.thread_get_priority(thread(handle)).unwrap_or(UNKNOWN_PRIORITY)
}

pub fn thread_set_priority<K: Kernel>(osal: &Osal<K>, handle: Uid, priority: c_int) -> OsResult {
    osal.thread_set_priority(thread(handle), priority).into()
}

/// `pte_osThreadGetAffinity`. Failures read as the negated result code.
pub fn thread_get_affinity<K: Kernel>(osal: &Osal<K>, handle: Uid) -> c_int {
    match osal.thread_get_affinity(thread(handle)) {
        // At most one bit per user core.
        Ok(affinity) => affinity as c_int,
        Err(err) => -err.to_raw(),
    }
}

pub fn thread_set_affinity<K: Kernel>(osal: &Osal<K>, handle: Uid, affinity: c_int) -> OsResult {
    let Ok(affinity) = u32::try_from(affinity) else {
        return OsResult::InvalidParam;
    };

    osal.thread_set_affinity(thread(handle), affinity).into()
}

/// # Safety
///
/// `handle` must be null or valid for writes.
pub unsafe fn mutex_create<K: Kernel>(osal: &Osal<K>, handle: *mut Uid) -> OsResult {
    // SAFETY: Forwarded from the caller.
    unsafe { write_out(handle, || osal.mutex_create().map(|mutex| mutex.to_raw())) }
}

pub fn mutex_delete<K: Kernel>(osal: &Osal<K>, handle: Uid) -> OsResult {
    osal.mutex_delete(mutex(handle)).into()
}

pub fn mutex_lock<K: Kernel>(osal: &Osal<K>, handle: Uid) -> OsResult {
    osal.mutex_lock(mutex(handle)).into()
}

pub fn mutex_timed_lock<K: Kernel>(osal: &Osal<K>, handle: Uid, timeout: c_uint) -> OsResult {
    osal.mutex_timed_lock(mutex(handle), timeout).into()
}

pub fn mutex_unlock<K: Kernel>(osal: &Osal<K>, handle: Uid) -> OsResult {
    osal.mutex_unlock(mutex(handle)).into()
}

/// # Safety
///
/// `handle` must be null or valid for writes.
pub unsafe fn semaphore_create<K: Kernel>(
    osal: &Osal<K>,
    initial: c_int,
    handle: *mut Uid,
) -> OsResult {
    // SAFETY: Forwarded from the caller.
    unsafe { write_out(handle, || osal.semaphore_create(initial).map(|sema| sema.to_raw())) }
}

pub fn semaphore_delete<K: Kernel>(osal: &Osal<K>, handle: Uid) -> OsResult {
    osal.semaphore_delete(sema(handle)).into()
}

pub fn semaphore_post<K: Kernel>(osal: &Osal<K>, handle: Uid, count: c_int) -> OsResult {
    osal.semaphore_post(sema(handle), count).into()
}

/// `pte_osSemaphorePend`. A null `timeout` waits forever.
///
/// # Safety
///
/// `timeout` must be null or valid for reads.
pub unsafe fn semaphore_pend<K: Kernel>(
    osal: &Osal<K>,
    handle: Uid,
    timeout: *const c_uint,
) -> OsResult {
    // SAFETY: Forwarded from the caller.
    let timeout = unsafe { timeout_ms(timeout) };
    osal.semaphore_pend(sema(handle), timeout).into()
}

/// `pte_osSemaphoreCancellablePend`. A null `timeout` waits forever.
///
/// # Safety
///
/// `timeout` must be null or valid for reads.
pub unsafe fn semaphore_cancellable_pend<K: Kernel>(
    osal: &Osal<K>,
    handle: Uid,
    timeout: *const c_uint,
) -> OsResult {
    // SAFETY: Forwarded from the caller.
    let timeout = unsafe { timeout_ms(timeout) };
    osal.semaphore_cancellable_pend(sema(handle), timeout).into()
}

/// # Safety
///
/// `key` must be null or valid for writes.
pub unsafe fn tls_alloc<K: Kernel>(osal: &Osal<K>, key: *mut c_uint) -> OsResult {
    // SAFETY: Forwarded from the caller.
    unsafe { write_out(key, || osal.tls_alloc().map(TlsKey::to_raw)) }
}

pub fn tls_free<K: Kernel>(osal: &Osal<K>, key: c_uint) -> OsResult {
    osal.tls_free(tls_key(key)).into()
}

/// `pte_osTlsGetValue`. Unresolved keys read as null.
pub fn tls_get<K: Kernel>(osal: &Osal<K>, key: c_uint) -> *mut c_void {
    osal.tls_get(tls_key(key)).unwrap_or(ptr::null_mut())
}

pub fn tls_set<K: Kernel>(osal: &Osal<K>, key: c_uint, value: *mut c_void) -> OsResult {
    osal.tls_set(tls_key(key), value).into()
}
