//! The `pte_os*` symbols.
//!
//! Every export runs on one process-wide [`Osal`], created on first use. It is
//! never torn down.

use alloc::{boxed::Box, sync::Arc};
use core::{
    ffi::{c_int, c_uint, c_void},
    ptr,
    sync::atomic::{AtomicI32, AtomicPtr, Ordering},
};

use vita_svc::{
    raw::{INVALID_UID, Uid},
    vita::{self, VitaKernel},
};
use vita_sys_sync::atomic;
use vita_sys_thread::ThreadEntry;

use super::RawTimeB;
use crate::{Error, OsResult, Osal};

type VitaOsal = Osal<VitaKernel>;

static OSAL: AtomicPtr<VitaOsal> = AtomicPtr::new(ptr::null_mut());

/// Returns the process-wide layer, creating it on first use.
fn osal() -> Result<&'static VitaOsal, Error> {
    // SAFETY: A published layer is never freed.
    if let Some(osal) = unsafe { OSAL.load(Ordering::Acquire).as_ref() } {
        return Ok(osal);
    }

    let kernel = VitaKernel::new().map_err(|err| {
        log::error!("cannot bind the thread manager: {err}");
        Error::GeneralFailure
    })?;
    let fresh = Box::into_raw(Box::new(Osal::new(Arc::new(kernel))?));

    match OSAL.compare_exchange(ptr::null_mut(), fresh, Ordering::AcqRel, Ordering::Acquire) {
        // SAFETY: Just published, never freed.
        Ok(_) => Ok(unsafe { &*fresh }),
        Err(published) => {
            // SAFETY: `fresh` lost the race and was never shared.
            drop(unsafe { Box::from_raw(fresh) });
            // SAFETY: A published layer is never freed.
            Ok(unsafe { &*published })
        }
    }
}

fn with_osal(f: impl FnOnce(&'static VitaOsal) -> OsResult) -> OsResult {
    match osal() {
        Ok(osal) => f(osal),
        Err(err) => err.to_result(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osInit() -> OsResult {
    with_osal(|osal| osal.init().into())
}

/// # Safety
///
/// `handle` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osThreadCreate(
    entry: Option<ThreadEntry>,
    stack_size: c_int,
    initial_priority: c_int,
    argv: *mut c_void,
    handle: *mut Uid,
) -> OsResult {
    // SAFETY: Forwarded from the caller.
    with_osal(|osal| unsafe {
        super::thread_create(osal, entry, stack_size, initial_priority, argv, handle)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadStart(handle: Uid) -> OsResult {
    with_osal(|osal| super::thread_start(osal, handle))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadDelete(handle: Uid) -> OsResult {
    with_osal(|osal| super::thread_delete(osal, handle))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadExitAndDelete(handle: Uid) -> ! {
    match osal() {
        Ok(osal) => super::thread_exit_and_delete(osal, handle),
        Err(_) => vita::exit_delete_thread(0),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadExit() -> ! {
    match osal() {
        Ok(osal) => osal.thread_exit(),
        Err(_) => vita::exit_thread(0),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadWaitForEnd(handle: Uid) -> OsResult {
    with_osal(|osal| super::thread_wait_for_end(osal, handle))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadGetHandle() -> Uid {
    osal().map_or(INVALID_UID, |osal| osal.thread_get_handle().to_raw())
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadGetPriority(handle: Uid) -> c_int {
    osal().map_or(super::UNKNOWN_PRIORITY, |osal| super::thread_get_priority(osal, handle))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadSetPriority(handle: Uid, priority: c_int) -> OsResult {
    with_osal(|osal| super::thread_set_priority(osal, handle, priority))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadCancel(handle: Uid) -> OsResult {
    with_osal(|osal| super::thread_cancel(osal, handle))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadCheckCancel(handle: Uid) -> OsResult {
    with_osal(|osal| super::thread_check_cancel(osal, handle))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadSleep(msecs: c_uint) {
    if let Ok(osal) = osal() {
        osal.thread_sleep(msecs);
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadGetMinPriority() -> c_int {
    VitaOsal::thread_min_priority()
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadGetMaxPriority() -> c_int {
    VitaOsal::thread_max_priority()
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadGetDefaultPriority() -> c_int {
    VitaOsal::thread_default_priority()
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadGetAffinity(handle: Uid) -> c_int {
    match osal() {
        Ok(osal) => super::thread_get_affinity(osal, handle),
        Err(err) => -err.to_raw(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osThreadSetAffinity(handle: Uid, affinity: c_int) -> OsResult {
    with_osal(|osal| super::thread_set_affinity(osal, handle, affinity))
}

/// # Safety
///
/// `handle` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osMutexCreate(handle: *mut Uid) -> OsResult {
    // SAFETY: Forwarded from the caller.
    with_osal(|osal| unsafe { super::mutex_create(osal, handle) })
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osMutexDelete(handle: Uid) -> OsResult {
    with_osal(|osal| super::mutex_delete(osal, handle))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osMutexLock(handle: Uid) -> OsResult {
    with_osal(|osal| super::mutex_lock(osal, handle))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osMutexTimedLock(handle: Uid, timeout_msecs: c_uint) -> OsResult {
    with_osal(|osal| super::mutex_timed_lock(osal, handle, timeout_msecs))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osMutexUnlock(handle: Uid) -> OsResult {
    with_osal(|osal| super::mutex_unlock(osal, handle))
}

/// # Safety
///
/// `handle` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osSemaphoreCreate(initial_value: c_int, handle: *mut Uid) -> OsResult {
    // SAFETY: Forwarded from the caller.
    with_osal(|osal| unsafe { super::semaphore_create(osal, initial_value, handle) })
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osSemaphoreDelete(handle: Uid) -> OsResult {
    with_osal(|osal| super::semaphore_delete(osal, handle))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osSemaphorePost(handle: Uid, count: c_int) -> OsResult {
    with_osal(|osal| super::semaphore_post(osal, handle, count))
}

/// # Safety
///
/// `timeout_msecs` must be null or valid for reads.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osSemaphorePend(
    handle: Uid,
    timeout_msecs: *const c_uint,
) -> OsResult {
    // SAFETY: Forwarded from the caller.
    with_osal(|osal| unsafe { super::semaphore_pend(osal, handle, timeout_msecs) })
}

/// # Safety
///
/// `timeout_msecs` must be null or valid for reads.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osSemaphoreCancellablePend(
    handle: Uid,
    timeout_msecs: *const c_uint,
) -> OsResult {
    // SAFETY: Forwarded from the caller.
    with_osal(|osal| unsafe { super::semaphore_cancellable_pend(osal, handle, timeout_msecs) })
}

// The atomic exports take plain `int *`s. The pthread layer only ever
// accesses those words through these functions.

/// # Safety
///
/// `target` must be non-null, aligned and valid for reads and writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osAtomicExchange(target: *mut c_int, value: c_int) -> c_int {
    // SAFETY: Upheld by the caller.
    atomic::exchange(unsafe { AtomicI32::from_ptr(target) }, value)
}

/// # Safety
///
/// `dest` must be non-null, aligned and valid for reads and writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osAtomicCompareExchange(
    dest: *mut c_int,
    exchange: c_int,
    comparand: c_int,
) -> c_int {
    // SAFETY: Upheld by the caller.
    atomic::compare_and_swap(unsafe { AtomicI32::from_ptr(dest) }, comparand, exchange)
}

/// # Safety
///
/// `addend` must be non-null, aligned and valid for reads and writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osAtomicExchangeAdd(addend: *mut c_int, value: c_int) -> c_int {
    // SAFETY: Upheld by the caller.
    atomic::fetch_add(unsafe { AtomicI32::from_ptr(addend) }, value)
}

/// # Safety
///
/// `dest` must be non-null, aligned and valid for reads and writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osAtomicDecrement(dest: *mut c_int) -> c_int {
    // SAFETY: Upheld by the caller.
    atomic::decrement(unsafe { AtomicI32::from_ptr(dest) })
}

/// # Safety
///
/// `dest` must be non-null, aligned and valid for reads and writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osAtomicIncrement(dest: *mut c_int) -> c_int {
    // SAFETY: Upheld by the caller.
    atomic::increment(unsafe { AtomicI32::from_ptr(dest) })
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osTlsSetValue(key: c_uint, value: *mut c_void) -> OsResult {
    with_osal(|osal| super::tls_set(osal, key, value))
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osTlsGetValue(key: c_uint) -> *mut c_void {
    osal().map_or(ptr::null_mut(), |osal| super::tls_get(osal, key))
}

/// # Safety
///
/// `key` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pte_osTlsAlloc(key: *mut c_uint) -> OsResult {
    // SAFETY: Forwarded from the caller.
    with_osal(|osal| unsafe { super::tls_alloc(osal, key) })
}

#[unsafe(no_mangle)]
pub extern "C" fn pte_osTlsFree(key: c_uint) -> OsResult {
    with_osal(|osal| super::tls_free(osal, key))
}

/// # Safety
///
/// `tb` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ftime(tb: *mut RawTimeB) -> c_int {
    let Ok(osal) = osal() else {
        return -1;
    };
    if tb.is_null() {
        return -1;
    }

    // SAFETY: Non-null, valid for writes per the caller.
    unsafe { tb.write(RawTimeB::from(osal.ftime())) };
    0
}
