//! The console's thread manager.
//!
//! [`VitaKernel`] forwards every [`Kernel`] method to the matching
//! `sceKernel*` import. The only state it keeps is the entry closure of each
//! thread between its creation and its start: the kernel thread entry takes a
//! byte buffer copied at start time, so the closure is boxed at creation and
//! its pointer handed over by [`Kernel::start_thread`].

use alloc::{boxed::Box, collections::BTreeMap};
use core::{
    arch::asm,
    cell::UnsafeCell,
    ffi::{c_char, c_int, c_uint, c_void},
    ptr::{self, NonNull},
};

use crate::{
    error::KernelError,
    misc,
    raw::{EventWaitMode, Kernel, MutexAttr, RESERVED_TLS_WORDS, RawThreadEntry, Uid},
    result::{Error, Result},
};

mod sys;

/// Longest object name the kernel keeps, the terminator excluded.
const MAX_NAME_LEN: usize = 31;

/// Size in bytes of the reserved TLS region, which ends at the thread pointer.
const RESERVED_TLS_SIZE: usize = RESERVED_TLS_WORDS as usize * size_of::<*mut c_void>();

type PendingEntry = Box<RawThreadEntry>;

/// [`Kernel`] implementation backed by the PS Vita thread manager.
pub struct VitaKernel {
    /// Kernel mutex guarding `pending`.
    lock: Uid,
    /// Entries of the created, not yet started threads.
    pending: UnsafeCell<BTreeMap<Uid, PendingEntry>>,
}

// SAFETY: `pending` is only accessed with the `lock` kernel mutex held.
unsafe impl Send for VitaKernel {}
unsafe impl Sync for VitaKernel {}

impl VitaKernel {
    /// Binds to the thread manager.
    pub fn new() -> Result<Self> {
        let name = ObjectName::new("vita_svc_pending");
        // SAFETY: `name` is NUL-terminated, no option block is passed.
        let lock =
            check_uid(unsafe { sys::sceKernelCreateMutex(name.as_ptr(), 0, 0, ptr::null()) })?;

        Ok(Self {
            lock,
            pending: UnsafeCell::new(BTreeMap::new()),
        })
    }

    fn with_pending<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<Uid, PendingEntry>) -> R,
    ) -> Result<R> {
        // SAFETY: `lock` is a live mutex owned by `self`.
        check(unsafe { sys::sceKernelLockMutex(self.lock, 1, ptr::null_mut()) })?;

        // SAFETY: The lock is held, no other reference to the map exists.
        let result = f(unsafe { &mut *self.pending.get() });

        // SAFETY: Locked above by this thread.
        check(unsafe { sys::sceKernelUnlockMutex(self.lock, 1) })?;
        Ok(result)
    }
}

impl Drop for VitaKernel {
    fn drop(&mut self) {
        // SAFETY: Nothing else refers to the mutex once `self` is dropped.
        unsafe { sys::sceKernelDeleteMutex(self.lock) };
    }
}

impl core::fmt::Debug for VitaKernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VitaKernel")
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

impl Kernel for VitaKernel {
    fn create_thread(
        &self,
        name: &str,
        entry: RawThreadEntry,
        init_priority: i32,
        stack_size: usize,
    ) -> Result<Uid> {
        let stack_size = sys::SceSize::try_from(stack_size)
            .map_err(|_| Error::from(KernelError::IllegalStackSize))?;
        let name = ObjectName::new(name);

        // SAFETY: `name` is NUL-terminated, no option block is passed.
        let thid = check_uid(unsafe {
            sys::sceKernelCreateThread(
                name.as_ptr(),
                thread_entry,
                init_priority,
                stack_size,
                0,
                0,
                ptr::null(),
            )
        })?;

        if let Err(err) = self.with_pending(|pending| pending.insert(thid, Box::new(entry))) {
            // SAFETY: The thread was created above and never started.
            unsafe { sys::sceKernelDeleteThread(thid) };
            return Err(err);
        }

        Ok(thid)
    }

    fn start_thread(&self, thid: Uid) -> Result<()> {
        let Some(entry) = self.with_pending(|pending| pending.remove(&thid))? else {
            // Not created here: the kernel either runs the thread's own entry
            // or rejects the id.
            // SAFETY: No argument block is passed.
            return check(unsafe { sys::sceKernelStartThread(thid, 0, ptr::null()) });
        };

        let raw = Box::into_raw(entry);
        // SAFETY: The kernel copies the pointer value onto the new thread's
        // stack before returning, `thread_entry` takes ownership of it.
        let started = check(unsafe {
            sys::sceKernelStartThread(
                thid,
                size_of::<*mut RawThreadEntry>() as sys::SceSize,
                ptr::from_ref(&raw).cast(),
            )
        });

        if started.is_err() {
            // SAFETY: The thread did not start, the box is still ours.
            let entry = unsafe { Box::from_raw(raw) };
            // A failed lock drops the entry: the thread can no longer run.
            let _ = self.with_pending(|pending| pending.insert(thid, entry));
        }

        started
    }

    fn exit_thread(&self, status: i32) -> ! {
        exit_thread(status)
    }

    fn exit_delete_thread(&self, status: i32) -> ! {
        exit_delete_thread(status)
    }

    fn delete_thread(&self, thid: Uid) -> Result<()> {
        // SAFETY: The kernel validates the id and the thread state.
        check(unsafe { sys::sceKernelDeleteThread(thid) })?;

        // The thread is gone either way, a failed lock only leaks its entry.
        let _ = self.with_pending(|pending| pending.remove(&thid));
        Ok(())
    }

    fn get_thread_id(&self) -> Uid {
        // SAFETY: No arguments.
        unsafe { sys::sceKernelGetThreadId() }
    }

    fn wait_thread_end(&self, thid: Uid, timeout_us: Option<u32>) -> Result<i32> {
        let mut status: c_int = 0;
        let mut timeout = timeout_us;

        // SAFETY: Both out-pointers are valid for the duration of the call.
        check(unsafe {
            sys::sceKernelWaitThreadEnd(thid, &mut status, timeout_ptr(&mut timeout))
        })?;
        Ok(status)
    }

    fn get_thread_priority(&self, thid: Uid) -> Result<i32> {
        let mut info = sys::SceKernelThreadInfo::empty();

        // SAFETY: `info` is a valid record with its size set.
        check(unsafe { sys::sceKernelGetThreadInfo(thid, &mut info) })?;
        Ok(info.current_priority)
    }

    fn change_thread_priority(&self, thid: Uid, priority: i32) -> Result<()> {
        // SAFETY: The kernel validates the id and the priority.
        check(unsafe { sys::sceKernelChangeThreadPriority(thid, priority) })
    }

    fn get_thread_cpu_affinity_mask(&self, thid: Uid) -> Result<u32> {
        // SAFETY: The kernel validates the id.
        let mask = unsafe { sys::sceKernelGetThreadCpuAffinityMask(thid) };
        check(mask)?;
        Ok(mask as u32)
    }

    fn change_thread_cpu_affinity_mask(&self, thid: Uid, mask: u32) -> Result<()> {
        // The kernel takes the mask as a signed int, bit for bit.
        // SAFETY: The kernel validates the id and the mask.
        check(unsafe { sys::sceKernelChangeThreadCpuAffinityMask(thid, mask as c_int) })
    }

    fn delay_thread(&self, usecs: u32) {
        // SAFETY: No pointers involved.
        unsafe { sys::sceKernelDelayThread(usecs) };
    }

    fn create_mutex(&self, name: &str, attr: MutexAttr, init_count: i32) -> Result<Uid> {
        let name = ObjectName::new(name);
        // SAFETY: `name` is NUL-terminated, no option block is passed.
        check_uid(unsafe {
            sys::sceKernelCreateMutex(name.as_ptr(), attr.bits(), init_count, ptr::null())
        })
    }

    fn delete_mutex(&self, mutex_id: Uid) -> Result<()> {
        // SAFETY: The kernel validates the id.
        check(unsafe { sys::sceKernelDeleteMutex(mutex_id) })
    }

    fn lock_mutex(&self, mutex_id: Uid, count: i32, timeout_us: Option<u32>) -> Result<()> {
        let mut timeout = timeout_us;
        // SAFETY: The timeout pointer is null or valid for the call.
        check(unsafe { sys::sceKernelLockMutex(mutex_id, count, timeout_ptr(&mut timeout)) })
    }

    fn unlock_mutex(&self, mutex_id: Uid, count: i32) -> Result<()> {
        // SAFETY: The kernel validates the id and the ownership.
        check(unsafe { sys::sceKernelUnlockMutex(mutex_id, count) })
    }

    fn create_sema(&self, name: &str, init_count: i32, max_count: i32) -> Result<Uid> {
        let name = ObjectName::new(name);
        // SAFETY: `name` is NUL-terminated, no option block is passed.
        check_uid(unsafe {
            sys::sceKernelCreateSema(name.as_ptr(), 0, init_count, max_count, ptr::null())
        })
    }

    fn delete_sema(&self, sema_id: Uid) -> Result<()> {
        // SAFETY: The kernel validates the id.
        check(unsafe { sys::sceKernelDeleteSema(sema_id) })
    }

    fn signal_sema(&self, sema_id: Uid, count: i32) -> Result<()> {
        // SAFETY: The kernel validates the id and the count.
        check(unsafe { sys::sceKernelSignalSema(sema_id, count) })
    }

    fn wait_sema(&self, sema_id: Uid, count: i32, timeout_us: Option<u32>) -> Result<()> {
        let mut timeout = timeout_us;
        // SAFETY: The timeout pointer is null or valid for the call.
        check(unsafe { sys::sceKernelWaitSema(sema_id, count, timeout_ptr(&mut timeout)) })
    }

    fn create_event_flag(&self, name: &str, init_pattern: u32) -> Result<Uid> {
        let name = ObjectName::new(name);
        // SAFETY: `name` is NUL-terminated, no option block is passed.
        check_uid(unsafe {
            sys::sceKernelCreateEventFlag(name.as_ptr(), 0, init_pattern, ptr::null())
        })
    }

    fn delete_event_flag(&self, evf_id: Uid) -> Result<()> {
        // SAFETY: The kernel validates the id.
        check(unsafe { sys::sceKernelDeleteEventFlag(evf_id) })
    }

    fn set_event_flag(&self, evf_id: Uid, bits: u32) -> Result<()> {
        // SAFETY: The kernel validates the id.
        check(unsafe { sys::sceKernelSetEventFlag(evf_id, bits) })
    }

    fn poll_event_flag(&self, evf_id: Uid, bits: u32, mode: EventWaitMode) -> Result<u32> {
        let mut observed: c_uint = 0;
        // SAFETY: `observed` is valid for the duration of the call.
        check(unsafe { sys::sceKernelPollEventFlag(evf_id, bits, mode.bits(), &mut observed) })?;
        Ok(observed)
    }

    fn get_process_time_us(&self) -> u64 {
        // SAFETY: No arguments.
        unsafe { sys::sceKernelGetProcessTimeWide() }
    }

    fn get_rtc_time_us(&self) -> u64 {
        let mut tick = sys::SceRtcTick::default();
        // SAFETY: `tick` is valid for the duration of the call.
        if unsafe { sys::sceRtcGetCurrentTick(&mut tick) } < 0 {
            return 0;
        }

        misc::rtc_tick_to_unix_us(tick.tick)
    }

    fn get_reserved_tls_addr(&self, key: u32) -> Option<NonNull<*mut c_void>> {
        if key >= RESERVED_TLS_WORDS {
            return None;
        }

        let base = thread_pointer().checked_sub(RESERVED_TLS_SIZE)?;
        let addr = base + key as usize * size_of::<*mut c_void>();
        NonNull::new(addr as *mut *mut c_void)
    }
}

/// Ends the calling thread, leaving its thread object dormant.
///
/// Unlike [`Kernel::exit_thread`], needs no [`VitaKernel`].
pub fn exit_thread(status: i32) -> ! {
    // SAFETY: Ends the calling thread.
    unsafe { sys::sceKernelExitThread(status) };
    park()
}

/// Ends the calling thread and deletes its thread object.
pub fn exit_delete_thread(status: i32) -> ! {
    // SAFETY: Ends and deletes the calling thread.
    unsafe { sys::sceKernelExitDeleteThread(status) };
    park()
}

/// Kernel entry of every thread created by [`VitaKernel`].
unsafe extern "C" fn thread_entry(args: sys::SceSize, argp: *mut c_void) -> c_int {
    if args as usize != size_of::<*mut RawThreadEntry>() || argp.is_null() {
        return -1;
    }

    // SAFETY: `start_thread` passed exactly one pointer obtained from
    // `Box::into_raw`, copied here by the kernel.
    let entry = unsafe { Box::from_raw(argp.cast::<*mut RawThreadEntry>().read_unaligned()) };
    (*entry)()
}

/// Address the kernel keeps in `TPIDRURO` for the calling thread.
fn thread_pointer() -> usize {
    let tp: usize;
    // SAFETY: Reads a user read-only register, no memory is touched.
    unsafe {
        asm!(
            "mrc p15, 0, {tp}, c13, c0, 3",
            tp = out(reg) tp,
            options(nomem, nostack, preserves_flags),
        );
    }
    tp
}

fn park() -> ! {
    loop {
        // SAFETY: No pointers involved.
        unsafe { sys::sceKernelDelayThread(c_uint::MAX) };
    }
}

fn timeout_ptr(timeout: &mut Option<u32>) -> *mut c_uint {
    timeout.as_mut().map_or(ptr::null_mut(), ptr::from_mut)
}

#[inline]
fn check(ret: c_int) -> Result<()> {
    if ret < 0 {
        return Err(Error::from_raw(ret as u32));
    }
    Ok(())
}

#[inline]
fn check_uid(ret: Uid) -> Result<Uid> {
    check(ret)?;
    Ok(ret)
}

/// A NUL-terminated object name, truncated to what the kernel keeps.
struct ObjectName([u8; MAX_NAME_LEN + 1]);

impl ObjectName {
    fn new(name: &str) -> Self {
        let mut buf = [0; MAX_NAME_LEN + 1];
        let len = name.len().min(MAX_NAME_LEN);
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self(buf)
    }

    fn as_ptr(&self) -> *const c_char {
        self.0.as_ptr().cast()
    }
}
