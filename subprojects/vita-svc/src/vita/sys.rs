//! Thread manager imports, as declared by vitasdk's `psp2/kernel/threadmgr.h`,
//! `psp2/kernel/processmgr.h` and `psp2/rtc.h`.
//!
//! Every call returns a negative value on failure. Ids (`SceUID`) are plain
//! `i32`s.

#![allow(non_snake_case)]

use core::ffi::{c_char, c_int, c_uint, c_void};

use crate::raw::Uid;

pub type SceSize = c_uint;

/// `SceKernelThreadEntry`
pub type ThreadEntryFn = unsafe extern "C" fn(args: SceSize, argp: *mut c_void) -> c_int;

/// `SceKernelThreadInfo`
#[repr(C)]
pub struct SceKernelThreadInfo {
    pub size: SceSize,
    pub process_id: Uid,
    pub name: [c_char; 32],
    pub attr: c_uint,
    pub status: c_int,
    pub entry: Option<ThreadEntryFn>,
    pub stack: *mut c_void,
    pub stack_size: c_int,
    pub init_priority: c_int,
    pub current_priority: c_int,
    pub init_cpu_affinity_mask: c_int,
    pub current_cpu_affinity_mask: c_int,
    pub current_cpu_id: c_int,
    pub last_executed_cpu_id: c_int,
    pub wait_type: c_uint,
    pub wait_id: Uid,
    pub exit_status: c_int,
    pub run_clocks: u64,
    pub intr_preempt_count: c_uint,
    pub thread_preempt_count: c_uint,
    pub thread_release_count: c_uint,
    pub change_cpu_count: c_int,
    pub f_notify_callback: c_int,
    pub reserved: c_int,
}

impl SceKernelThreadInfo {
    /// An empty record with its `size` field set, as the kernel requires.
    pub fn empty() -> Self {
        // SAFETY: Every field is an integer, a raw pointer, an array of
        // integers or an `Option` of a function pointer, all of which are
        // valid when zeroed.
        let mut info: Self = unsafe { core::mem::zeroed() };
        info.size = size_of::<Self>() as SceSize;
        info
    }
}

/// `SceRtcTick`: microseconds since 0001-01-01T00:00:00Z.
#[repr(C)]
#[derive(Default)]
pub struct SceRtcTick {
    pub tick: u64,
}

unsafe extern "C" {
    pub fn sceKernelCreateThread(
        name: *const c_char,
        entry: ThreadEntryFn,
        init_priority: c_int,
        stack_size: SceSize,
        attr: c_uint,
        cpu_affinity_mask: c_int,
        option: *const c_void,
    ) -> Uid;
    pub fn sceKernelStartThread(thid: Uid, arglen: SceSize, argp: *const c_void) -> c_int;
    pub fn sceKernelExitThread(status: c_int) -> c_int;
    pub fn sceKernelExitDeleteThread(status: c_int) -> c_int;
    pub fn sceKernelDeleteThread(thid: Uid) -> c_int;
    pub fn sceKernelGetThreadId() -> Uid;
    pub fn sceKernelWaitThreadEnd(thid: Uid, stat: *mut c_int, timeout: *mut c_uint) -> c_int;
    pub fn sceKernelGetThreadInfo(thid: Uid, info: *mut SceKernelThreadInfo) -> c_int;
    pub fn sceKernelChangeThreadPriority(thid: Uid, priority: c_int) -> c_int;
    pub fn sceKernelGetThreadCpuAffinityMask(thid: Uid) -> c_int;
    pub fn sceKernelChangeThreadCpuAffinityMask(thid: Uid, mask: c_int) -> c_int;
    pub fn sceKernelDelayThread(delay: c_uint) -> c_int;

    pub fn sceKernelCreateMutex(
        name: *const c_char,
        attr: c_uint,
        init_count: c_int,
        option: *const c_void,
    ) -> Uid;
    pub fn sceKernelDeleteMutex(mutex_id: Uid) -> c_int;
    pub fn sceKernelLockMutex(mutex_id: Uid, lock_count: c_int, timeout: *mut c_uint) -> c_int;
    pub fn sceKernelUnlockMutex(mutex_id: Uid, unlock_count: c_int) -> c_int;

    pub fn sceKernelCreateSema(
        name: *const c_char,
        attr: c_uint,
        init_val: c_int,
        max_val: c_int,
        option: *const c_void,
    ) -> Uid;
    pub fn sceKernelDeleteSema(sema_id: Uid) -> c_int;
    pub fn sceKernelSignalSema(sema_id: Uid, signal: c_int) -> c_int;
    pub fn sceKernelWaitSema(sema_id: Uid, signal: c_int, timeout: *mut c_uint) -> c_int;

    pub fn sceKernelCreateEventFlag(
        name: *const c_char,
        attr: c_uint,
        bits: c_uint,
        option: *const c_void,
    ) -> Uid;
    pub fn sceKernelDeleteEventFlag(evf_id: Uid) -> c_int;
    pub fn sceKernelSetEventFlag(evf_id: Uid, bits: c_uint) -> c_int;
    pub fn sceKernelPollEventFlag(
        evf_id: Uid,
        bits: c_uint,
        wait: c_uint,
        out_bits: *mut c_uint,
    ) -> c_int;

    pub fn sceKernelGetProcessTimeWide() -> u64;

    pub fn sceRtcGetCurrentTick(tick: *mut SceRtcTick) -> c_int;
}
