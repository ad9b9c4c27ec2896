//! Thread manager emulation on top of `std`.
//!
//! [`HostKernel`] implements [`Kernel`] with `std` threads, mutexes and
//! condition variables so the layers above can be exercised on a development
//! machine. Each instance owns its own object table; ids are never shared
//! between instances.
//!
//! Threads are emulated as follows:
//!
//! - [`Kernel::start_thread`] spawns a `std` thread running the entry closure.
//! - [`Kernel::exit_thread`] and [`Kernel::exit_delete_thread`] unwind the
//!   calling thread back to its spawn wrapper, which records the exit status.
//!   They must only be called from threads started by the same instance.
//! - Threads the instance did not start (e.g. the test harness thread) are
//!   adopted the first time they ask for their id.
//!
//! The reserved TLS region belongs to the `std` thread and is shared by every
//! instance running on it.

use alloc::{boxed::Box, string::String, sync::Arc};
use core::{
    cell::{Cell, RefCell},
    ffi::c_void,
    mem,
    ptr::{self, NonNull},
    sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering},
    time::Duration,
};
use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{Condvar, Mutex as StdMutex, MutexGuard, PoisonError},
    thread,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use crate::{
    error::KernelError,
    raw::{
        CPU_MASK_USER_ALL, EventWaitMode, HIGHEST_PRIORITY_USER, INVALID_UID, Kernel,
        LOWEST_PRIORITY_USER, MutexAttr, RESERVED_TLS_WORDS, RawThreadEntry, Uid,
    },
    result::{Error, Result},
};

/// Smallest stack given to an emulated thread. Host frames are far larger than
/// the console's, so the requested size is only honoured above this floor.
const HOST_MIN_STACK_SIZE: usize = 256 * 1024;

/// Native priority reported for adopted threads.
const ADOPTED_PRIORITY: i32 = 160;

/// First id handed out by an instance.
const FIRST_UID: Uid = 0x0040_0001;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    /// Id of the calling thread, per kernel instance.
    static CURRENT: RefCell<HashMap<u64, Uid>> = RefCell::new(HashMap::new());

    /// The calling thread's reserved TLS region.
    static RESERVED_TLS: [Cell<*mut c_void>; RESERVED_TLS_WORDS as usize] = const {
        [const { Cell::new(ptr::null_mut()) }; RESERVED_TLS_WORDS as usize]
    };
}

/// Kernel calls whose next invocation can be forced to fail.
///
/// See [`HostKernel::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCall {
    CreateThread,
    StartThread,
    CreateEventFlag,
    SetEventFlag,
    ChangeThreadCpuAffinityMask,
}

/// Emulated thread manager.
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct HostKernel {
    inner: Arc<Inner>,
}

struct Inner {
    instance: u64,
    epoch: Instant,
    next_uid: AtomicI32,
    objects: StdMutex<Objects>,
    faults: StdMutex<HashMap<HostCall, KernelError>>,
}

#[derive(Default)]
struct Objects {
    threads: HashMap<Uid, Arc<HostThread>>,
    mutexes: HashMap<Uid, Arc<HostMutex>>,
    semas: HashMap<Uid, Arc<HostSema>>,
    flags: HashMap<Uid, Arc<HostEventFlag>>,
}

struct HostThread {
    name: String,
    priority: AtomicI32,
    affinity: AtomicU32,
    stack_size: usize,
    state: StdMutex<ThreadState>,
    ended: Condvar,
}

enum ThreadState {
    Dormant(RawThreadEntry),
    Running,
    Exited(i32),
}

struct HostMutex {
    recursive: bool,
    state: StdMutex<MutexState>,
    released: Condvar,
}

struct MutexState {
    owner: Uid,
    count: i32,
    deleted: bool,
}

struct HostSema {
    state: StdMutex<SemaState>,
    changed: Condvar,
}

struct SemaState {
    count: i32,
    max: i32,
    deleted: bool,
}

struct HostEventFlag {
    pattern: StdMutex<u32>,
}

/// Unwind payload carrying an explicit thread exit.
struct HostExit {
    status: i32,
    delete: bool,
}

impl HostKernel {
    /// Creates an empty thread manager.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
                epoch: Instant::now(),
                next_uid: AtomicI32::new(FIRST_UID),
                objects: StdMutex::new(Objects::default()),
                faults: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// Makes the next invocation of `call` fail with `err`.
    pub fn fail_next(&self, call: HostCall, err: KernelError) {
        lock(&self.inner.faults).insert(call, err);
    }

    /// Returns `true` if `thid` names a thread object of this instance.
    pub fn thread_exists(&self, thid: Uid) -> bool {
        self.objects().threads.contains_key(&thid)
    }

    /// Number of thread objects, adopted threads included.
    pub fn live_threads(&self) -> usize {
        self.objects().threads.len()
    }

    /// Number of live event flags.
    pub fn live_event_flags(&self) -> usize {
        self.objects().flags.len()
    }

    /// Number of live mutexes.
    pub fn live_mutexes(&self) -> usize {
        self.objects().mutexes.len()
    }

    fn objects(&self) -> MutexGuard<'_, Objects> {
        lock(&self.inner.objects)
    }

    fn next_uid(&self) -> Uid {
        self.inner.next_uid.fetch_add(1, Ordering::Relaxed)
    }

    fn injected(&self, call: HostCall) -> Result<()> {
        match lock(&self.inner.faults).remove(&call) {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Returns the calling thread's id, adopting the thread if needed.
    fn current_uid(&self) -> Uid {
        let instance = self.inner.instance;
        if let Some(uid) = CURRENT.with(|current| current.borrow().get(&instance).copied()) {
            return uid;
        }

        let uid = self.next_uid();
        let name = thread::current().name().unwrap_or("adopted").into();
        self.objects().threads.insert(
            uid,
            Arc::new(HostThread {
                name,
                priority: AtomicI32::new(ADOPTED_PRIORITY),
                affinity: AtomicU32::new(0),
                stack_size: 0,
                state: StdMutex::new(ThreadState::Running),
                ended: Condvar::new(),
            }),
        );
        CURRENT.with(|current| current.borrow_mut().insert(instance, uid));

        uid
    }

    fn thread(&self, thid: Uid) -> Result<Arc<HostThread>> {
        find(&self.objects().threads, thid)
    }

    fn mutex(&self, mutex_id: Uid) -> Result<Arc<HostMutex>> {
        find(&self.objects().mutexes, mutex_id)
    }

    fn sema(&self, sema_id: Uid) -> Result<Arc<HostSema>> {
        find(&self.objects().semas, sema_id)
    }

    fn flag(&self, evf_id: Uid) -> Result<Arc<HostEventFlag>> {
        find(&self.objects().flags, evf_id)
    }
}

impl Default for HostKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for HostKernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostKernel")
            .field("instance", &self.inner.instance)
            .finish_non_exhaustive()
    }
}

impl Kernel for HostKernel {
    fn create_thread(
        &self,
        name: &str,
        entry: RawThreadEntry,
        init_priority: i32,
        stack_size: usize,
    ) -> Result<Uid> {
        self.injected(HostCall::CreateThread)?;

        if !(HIGHEST_PRIORITY_USER..=LOWEST_PRIORITY_USER).contains(&init_priority) {
            return Err(KernelError::IllegalPriority.into());
        }
        if stack_size == 0 {
            return Err(KernelError::IllegalStackSize.into());
        }

        let uid = self.next_uid();
        self.objects().threads.insert(
            uid,
            Arc::new(HostThread {
                name: name.into(),
                priority: AtomicI32::new(init_priority),
                affinity: AtomicU32::new(0),
                stack_size,
                state: StdMutex::new(ThreadState::Dormant(entry)),
                ended: Condvar::new(),
            }),
        );

        Ok(uid)
    }

    fn start_thread(&self, thid: Uid) -> Result<()> {
        let thread = self.thread(thid)?;
        self.injected(HostCall::StartThread)?;

        let entry = {
            let mut state = lock(&thread.state);
            match mem::replace(&mut *state, ThreadState::Running) {
                ThreadState::Dormant(entry) => entry,
                previous => {
                    *state = previous;
                    return Err(KernelError::NotDormant.into());
                }
            }
        };

        let inner = Arc::clone(&self.inner);
        let spawned = Arc::clone(&thread);
        thread::Builder::new()
            .name(thread.name.clone())
            .stack_size(thread.stack_size.max(HOST_MIN_STACK_SIZE))
            .spawn(move || run_thread(inner, thid, spawned, entry))
            .map(drop)
            .map_err(|_| {
                *lock(&thread.state) = ThreadState::Exited(-1);
                thread.ended.notify_all();
                Error::from(KernelError::NoMemory)
            })
    }

    fn exit_thread(&self, status: i32) -> ! {
        panic::resume_unwind(Box::new(HostExit {
            status,
            delete: false,
        }))
    }

    fn exit_delete_thread(&self, status: i32) -> ! {
        panic::resume_unwind(Box::new(HostExit {
            status,
            delete: true,
        }))
    }

    fn delete_thread(&self, thid: Uid) -> Result<()> {
        let mut objects = self.objects();
        let thread = find(&objects.threads, thid)?;
        if matches!(*lock(&thread.state), ThreadState::Running) {
            return Err(KernelError::NotDormant.into());
        }
        objects.threads.remove(&thid);

        Ok(())
    }

    fn get_thread_id(&self) -> Uid {
        self.current_uid()
    }

    fn wait_thread_end(&self, thid: Uid, timeout_us: Option<u32>) -> Result<i32> {
        if thid == self.current_uid() {
            return Err(KernelError::CanNotWaitSelf.into());
        }

        let thread = self.thread(thid)?;
        let deadline = deadline(timeout_us);
        let mut state = lock(&thread.state);
        loop {
            if let ThreadState::Exited(status) = &*state {
                return Ok(*status);
            }
            state = wait(&thread.ended, state, deadline)?;
        }
    }

    fn get_thread_priority(&self, thid: Uid) -> Result<i32> {
        Ok(self.thread(thid)?.priority.load(Ordering::SeqCst))
    }

    fn change_thread_priority(&self, thid: Uid, priority: i32) -> Result<()> {
        let thread = self.thread(thid)?;
        if !(HIGHEST_PRIORITY_USER..=LOWEST_PRIORITY_USER).contains(&priority) {
            return Err(KernelError::IllegalPriority.into());
        }
        thread.priority.store(priority, Ordering::SeqCst);

        Ok(())
    }

    fn get_thread_cpu_affinity_mask(&self, thid: Uid) -> Result<u32> {
        Ok(self.thread(thid)?.affinity.load(Ordering::SeqCst))
    }

    fn change_thread_cpu_affinity_mask(&self, thid: Uid, mask: u32) -> Result<()> {
        let thread = self.thread(thid)?;
        self.injected(HostCall::ChangeThreadCpuAffinityMask)?;

        if mask & !CPU_MASK_USER_ALL != 0 {
            return Err(KernelError::IllegalCpuAffinityMask.into());
        }
        thread.affinity.store(mask, Ordering::SeqCst);

        Ok(())
    }

    fn delay_thread(&self, usecs: u32) {
        thread::sleep(Duration::from_micros(u64::from(usecs)));
    }

    fn create_mutex(&self, _name: &str, attr: MutexAttr, init_count: i32) -> Result<Uid> {
        let recursive = attr.contains(MutexAttr::RECURSIVE);
        if init_count < 0 || (!recursive && init_count > 1) {
            return Err(KernelError::InvalidArgument.into());
        }

        let owner = if init_count > 0 {
            self.current_uid()
        } else {
            INVALID_UID
        };

        let uid = self.next_uid();
        self.objects().mutexes.insert(
            uid,
            Arc::new(HostMutex {
                recursive,
                state: StdMutex::new(MutexState {
                    owner,
                    count: init_count,
                    deleted: false,
                }),
                released: Condvar::new(),
            }),
        );

        Ok(uid)
    }

    fn delete_mutex(&self, mutex_id: Uid) -> Result<()> {
        let mutex = self
            .objects()
            .mutexes
            .remove(&mutex_id)
            .ok_or(Error::from(KernelError::UnknownUid))?;

        lock(&mutex.state).deleted = true;
        mutex.released.notify_all();

        Ok(())
    }

    fn lock_mutex(&self, mutex_id: Uid, count: i32, timeout_us: Option<u32>) -> Result<()> {
        if count <= 0 {
            return Err(KernelError::InvalidArgument.into());
        }

        let me = self.current_uid();
        let mutex = self.mutex(mutex_id)?;
        let deadline = deadline(timeout_us);
        let mut state = lock(&mutex.state);
        loop {
            if state.deleted {
                return Err(KernelError::WaitDelete.into());
            }

            if state.owner == INVALID_UID {
                if !mutex.recursive && count > 1 {
                    return Err(KernelError::InvalidArgument.into());
                }
                state.owner = me;
                state.count = count;
                return Ok(());
            }

            if state.owner == me {
                if !mutex.recursive {
                    return Err(KernelError::MutexRecursive.into());
                }
                state.count += count;
                return Ok(());
            }

            state = wait(&mutex.released, state, deadline)?;
        }
    }

    fn unlock_mutex(&self, mutex_id: Uid, count: i32) -> Result<()> {
        if count <= 0 {
            return Err(KernelError::InvalidArgument.into());
        }

        let me = self.current_uid();
        let mutex = self.mutex(mutex_id)?;
        let mut state = lock(&mutex.state);
        if state.owner != me || count > state.count {
            return Err(KernelError::MutexUnlockUdf.into());
        }

        state.count -= count;
        if state.count == 0 {
            state.owner = INVALID_UID;
            mutex.released.notify_all();
        }

        Ok(())
    }

    fn create_sema(&self, _name: &str, init_count: i32, max_count: i32) -> Result<Uid> {
        if init_count < 0 || max_count <= 0 || init_count > max_count {
            return Err(KernelError::InvalidArgument.into());
        }

        let uid = self.next_uid();
        self.objects().semas.insert(
            uid,
            Arc::new(HostSema {
                state: StdMutex::new(SemaState {
                    count: init_count,
                    max: max_count,
                    deleted: false,
                }),
                changed: Condvar::new(),
            }),
        );

        Ok(uid)
    }

    fn delete_sema(&self, sema_id: Uid) -> Result<()> {
        let sema = self
            .objects()
            .semas
            .remove(&sema_id)
            .ok_or(Error::from(KernelError::UnknownUid))?;

        lock(&sema.state).deleted = true;
        sema.changed.notify_all();

        Ok(())
    }

    fn signal_sema(&self, sema_id: Uid, count: i32) -> Result<()> {
        if count <= 0 {
            return Err(KernelError::InvalidArgument.into());
        }

        let sema = self.sema(sema_id)?;
        let mut state = lock(&sema.state);
        let max = state.max;
        state.count = state
            .count
            .checked_add(count)
            .filter(|next| *next <= max)
            .ok_or(Error::from(KernelError::SemaOvf))?;
        sema.changed.notify_all();

        Ok(())
    }

    fn wait_sema(&self, sema_id: Uid, count: i32, timeout_us: Option<u32>) -> Result<()> {
        let sema = self.sema(sema_id)?;
        let deadline = deadline(timeout_us);
        let mut state = lock(&sema.state);
        if count <= 0 || count > state.max {
            return Err(KernelError::InvalidArgument.into());
        }

        loop {
            if state.deleted {
                return Err(KernelError::WaitDelete.into());
            }

            if state.count >= count {
                state.count -= count;
                return Ok(());
            }

            state = wait(&sema.changed, state, deadline)?;
        }
    }

    fn create_event_flag(&self, _name: &str, init_pattern: u32) -> Result<Uid> {
        self.injected(HostCall::CreateEventFlag)?;

        let uid = self.next_uid();
        self.objects().flags.insert(
            uid,
            Arc::new(HostEventFlag {
                pattern: StdMutex::new(init_pattern),
            }),
        );

        Ok(uid)
    }

    fn delete_event_flag(&self, evf_id: Uid) -> Result<()> {
        self.objects()
            .flags
            .remove(&evf_id)
            .map(drop)
            .ok_or(Error::from(KernelError::UnknownUid))
    }

    fn set_event_flag(&self, evf_id: Uid, bits: u32) -> Result<()> {
        let flag = self.flag(evf_id)?;
        self.injected(HostCall::SetEventFlag)?;

        *lock(&flag.pattern) |= bits;

        Ok(())
    }

    fn poll_event_flag(&self, evf_id: Uid, bits: u32, mode: EventWaitMode) -> Result<u32> {
        if bits == 0 {
            return Err(KernelError::IllegalPattern.into());
        }

        let flag = self.flag(evf_id)?;
        let mut pattern = lock(&flag.pattern);
        let observed = *pattern;
        let satisfied = if mode.contains(EventWaitMode::OR) {
            observed & bits != 0
        } else {
            observed & bits == bits
        };
        if !satisfied {
            return Err(KernelError::EventCond.into());
        }

        if mode.contains(EventWaitMode::CLEAR_ALL) {
            *pattern = 0;
        } else if mode.contains(EventWaitMode::CLEAR_PAT) {
            *pattern &= !bits;
        }

        Ok(observed)
    }

    fn get_process_time_us(&self) -> u64 {
        u64::try_from(self.inner.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn get_rtc_time_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since_epoch| u64::try_from(since_epoch.as_micros()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    fn get_reserved_tls_addr(&self, key: u32) -> Option<NonNull<*mut c_void>> {
        RESERVED_TLS.with(|words| {
            words
                .get(usize::try_from(key).ok()?)
                .and_then(|word| NonNull::new(word.as_ptr()))
        })
    }
}

/// Body of every emulated thread.
fn run_thread(inner: Arc<Inner>, thid: Uid, thread: Arc<HostThread>, entry: RawThreadEntry) {
    CURRENT.with(|current| current.borrow_mut().insert(inner.instance, thid));

    let (status, delete) = match panic::catch_unwind(AssertUnwindSafe(entry)) {
        Ok(status) => (status, false),
        Err(payload) => match payload.downcast::<HostExit>() {
            Ok(exit) => (exit.status, exit.delete),
            // A genuine panic. The hook already reported it, the waiters only
            // need to be released.
            Err(_) => (-1, false),
        },
    };

    *lock(&thread.state) = ThreadState::Exited(status);
    thread.ended.notify_all();

    if delete {
        lock(&inner.objects).threads.remove(&thid);
    }

    CURRENT.with(|current| current.borrow_mut().remove(&inner.instance));
}

fn find<T>(map: &HashMap<Uid, Arc<T>>, uid: Uid) -> Result<Arc<T>> {
    map.get(&uid)
        .cloned()
        .ok_or(Error::from(KernelError::UnknownUid))
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn deadline(timeout_us: Option<u32>) -> Option<Instant> {
    timeout_us.map(|us| Instant::now() + Duration::from_micros(u64::from(us)))
}

/// Blocks on `cv` once, failing with a wait timeout when `deadline` has passed.
fn wait<'a, T>(
    cv: &Condvar,
    guard: MutexGuard<'a, T>,
    deadline: Option<Instant>,
) -> Result<MutexGuard<'a, T>> {
    let Some(deadline) = deadline else {
        return Ok(cv.wait(guard).unwrap_or_else(PoisonError::into_inner));
    };

    let now = Instant::now();
    if now >= deadline {
        return Err(KernelError::WaitTimeout.into());
    }

    let (guard, _) = cv
        .wait_timeout(guard, deadline - now)
        .unwrap_or_else(PoisonError::into_inner);
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use alloc::{boxed::Box, sync::Arc};
    use core::{
        ffi::c_void,
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };
    use std::thread;

    use super::{HostCall, HostKernel};
    use crate::{
        error::KernelError,
        raw::{CPU_MASK_USER_ALL, EventWaitMode, Kernel, MutexAttr},
    };

    fn spawn(kernel: &HostKernel, entry: impl FnOnce() -> i32 + Send + 'static) -> i32 {
        let thid = kernel
            .create_thread("test", Box::new(entry), 160, 0x1000)
            .expect("create failed");
        kernel.start_thread(thid).expect("start failed");
        thid
    }

    #[test]
    fn started_thread_runs_and_reports_its_status() {
        let kernel = HostKernel::new();
        let thid = spawn(&kernel, || 42);

        assert_eq!(kernel.wait_thread_end(thid, None), Ok(42));
        assert_eq!(kernel.delete_thread(thid), Ok(()));
        assert!(!kernel.thread_exists(thid));
    }

    #[test]
    fn exit_thread_ends_with_the_given_status() {
        let kernel = HostKernel::new();
        let inner = kernel.clone();
        let thid = spawn(&kernel, move || inner.exit_thread(7));

        assert_eq!(kernel.wait_thread_end(thid, None), Ok(7));
        assert!(kernel.thread_exists(thid));
    }

    #[test]
    fn exit_delete_thread_removes_the_thread_object() {
        let kernel = HostKernel::new();
        let inner = kernel.clone();
        let thid = spawn(&kernel, move || inner.exit_delete_thread(3));

        for _ in 0..500 {
            if !kernel.thread_exists(thid) {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("thread object was not deleted");
    }

    #[test]
    fn running_thread_cannot_be_deleted() {
        let kernel = HostKernel::new();
        let release = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&release);
        let thid = spawn(&kernel, move || {
            while !flag.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            0
        });

        let err = kernel.delete_thread(thid).unwrap_err();
        assert_eq!(err.kind(), Some(KernelError::NotDormant));

        release.store(true, Ordering::SeqCst);
        assert_eq!(kernel.wait_thread_end(thid, None), Ok(0));
        assert_eq!(kernel.delete_thread(thid), Ok(()));
    }

    #[test]
    fn wait_thread_end_times_out() {
        let kernel = HostKernel::new();
        let release = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&release);
        let thid = spawn(&kernel, move || {
            while !flag.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            0
        });

        let err = kernel.wait_thread_end(thid, Some(5_000)).unwrap_err();
        assert!(err.is_timeout());

        release.store(true, Ordering::SeqCst);
        assert_eq!(kernel.wait_thread_end(thid, None), Ok(0));
    }

    #[test]
    fn a_thread_cannot_wait_for_itself() {
        let kernel = HostKernel::new();
        let me = kernel.get_thread_id();

        let err = kernel.wait_thread_end(me, Some(0)).unwrap_err();
        assert_eq!(err.kind(), Some(KernelError::CanNotWaitSelf));
    }

    #[test]
    fn calling_thread_is_adopted_once() {
        let kernel = HostKernel::new();
        let first = kernel.get_thread_id();

        assert_eq!(kernel.get_thread_id(), first);
        assert!(kernel.thread_exists(first));
        assert_eq!(kernel.live_threads(), 1);
    }

    #[test]
    fn priorities_outside_the_user_range_are_rejected() {
        let kernel = HostKernel::new();

        let err = kernel
            .create_thread("test", Box::new(|| 0), 200, 0x1000)
            .unwrap_err();
        assert_eq!(err.kind(), Some(KernelError::IllegalPriority));

        let me = kernel.get_thread_id();
        assert!(kernel.change_thread_priority(me, 63).is_err());
        assert_eq!(kernel.change_thread_priority(me, 128), Ok(()));
        assert_eq!(kernel.get_thread_priority(me), Ok(128));
    }

    #[test]
    fn affinity_mask_starts_unset_and_rejects_foreign_cores() {
        let kernel = HostKernel::new();
        let me = kernel.get_thread_id();

        assert_eq!(kernel.get_thread_cpu_affinity_mask(me), Ok(0));
        assert_eq!(kernel.change_thread_cpu_affinity_mask(me, 0x2 << 16), Ok(()));
        assert_eq!(kernel.get_thread_cpu_affinity_mask(me), Ok(0x2 << 16));

        let err = kernel
            .change_thread_cpu_affinity_mask(me, CPU_MASK_USER_ALL | 0x8 << 16)
            .unwrap_err();
        assert_eq!(err.kind(), Some(KernelError::IllegalCpuAffinityMask));
    }

    #[test]
    fn recursive_mutex_counts_its_locks() {
        let kernel = HostKernel::new();
        let mutex = kernel
            .create_mutex("test", MutexAttr::RECURSIVE, 0)
            .unwrap();

        assert_eq!(kernel.lock_mutex(mutex, 1, None), Ok(()));
        assert_eq!(kernel.lock_mutex(mutex, 1, None), Ok(()));
        assert_eq!(kernel.unlock_mutex(mutex, 1), Ok(()));
        assert_eq!(kernel.unlock_mutex(mutex, 1), Ok(()));

        let err = kernel.unlock_mutex(mutex, 1).unwrap_err();
        assert_eq!(err.kind(), Some(KernelError::MutexUnlockUdf));
    }

    #[test]
    fn plain_mutex_rejects_relock_by_owner() {
        let kernel = HostKernel::new();
        let mutex = kernel.create_mutex("test", MutexAttr::empty(), 0).unwrap();

        assert_eq!(kernel.lock_mutex(mutex, 1, None), Ok(()));
        let err = kernel.lock_mutex(mutex, 1, None).unwrap_err();
        assert_eq!(err.kind(), Some(KernelError::MutexRecursive));
    }

    #[test]
    fn contended_mutex_lock_times_out() {
        let kernel = HostKernel::new();
        let mutex = kernel.create_mutex("test", MutexAttr::empty(), 0).unwrap();
        assert_eq!(kernel.lock_mutex(mutex, 1, None), Ok(()));

        let other = kernel.clone();
        let thid = spawn(&kernel, move || {
            match other.lock_mutex(mutex, 1, Some(5_000)) {
                Err(err) if err.is_timeout() => 1,
                _ => 0,
            }
        });

        assert_eq!(kernel.wait_thread_end(thid, None), Ok(1));
        assert_eq!(kernel.delete_mutex(mutex), Ok(()));
        assert_eq!(kernel.live_mutexes(), 0);
    }

    #[test]
    fn semaphore_counts_and_overflows() {
        let kernel = HostKernel::new();
        let sema = kernel.create_sema("test", 0, 2).unwrap();

        let err = kernel.wait_sema(sema, 1, Some(1_000)).unwrap_err();
        assert!(err.is_timeout());

        assert_eq!(kernel.signal_sema(sema, 2), Ok(()));
        let err = kernel.signal_sema(sema, 1).unwrap_err();
        assert_eq!(err.kind(), Some(KernelError::SemaOvf));

        assert_eq!(kernel.wait_sema(sema, 1, Some(0)), Ok(()));
        assert_eq!(kernel.wait_sema(sema, 1, None), Ok(()));
    }

    #[test]
    fn deleting_a_semaphore_wakes_its_waiters() {
        let kernel = HostKernel::new();
        let sema = kernel.create_sema("test", 0, 1).unwrap();

        let other = kernel.clone();
        let thid = spawn(&kernel, move || match other.wait_sema(sema, 1, None) {
            Err(err) if err.kind() == Some(KernelError::WaitDelete) => 1,
            _ => 0,
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(kernel.delete_sema(sema), Ok(()));
        assert_eq!(kernel.wait_thread_end(thid, None), Ok(1));
    }

    #[test]
    fn event_flag_poll_honours_mode() {
        let kernel = HostKernel::new();
        let flag = kernel.create_event_flag("test", 0).unwrap();

        let err = kernel
            .poll_event_flag(flag, 0x1, EventWaitMode::AND)
            .unwrap_err();
        assert_eq!(err.kind(), Some(KernelError::EventCond));

        assert_eq!(kernel.set_event_flag(flag, 0x1), Ok(()));
        assert_eq!(kernel.poll_event_flag(flag, 0x1, EventWaitMode::AND), Ok(0x1));
        assert_eq!(kernel.poll_event_flag(flag, 0x3, EventWaitMode::OR), Ok(0x1));
        assert!(kernel.poll_event_flag(flag, 0x3, EventWaitMode::AND).is_err());

        assert_eq!(
            kernel.poll_event_flag(flag, 0x1, EventWaitMode::AND | EventWaitMode::CLEAR_PAT),
            Ok(0x1)
        );
        assert!(kernel.poll_event_flag(flag, 0x1, EventWaitMode::AND).is_err());

        let err = kernel
            .poll_event_flag(flag, 0, EventWaitMode::AND)
            .unwrap_err();
        assert_eq!(err.kind(), Some(KernelError::IllegalPattern));
    }

    #[test]
    fn injected_fault_fails_the_next_call_only() {
        let kernel = HostKernel::new();
        kernel.fail_next(HostCall::CreateEventFlag, KernelError::NoMemory);

        let err = kernel.create_event_flag("test", 0).unwrap_err();
        assert_eq!(err.kind(), Some(KernelError::NoMemory));
        assert!(kernel.create_event_flag("test", 0).is_ok());
        assert_eq!(kernel.live_event_flags(), 1);
    }

    #[test]
    fn reserved_tls_is_per_thread() {
        let kernel = HostKernel::new();
        let word = kernel.get_reserved_tls_addr(0x100).unwrap();
        unsafe { *word.as_ptr() = 0x1234 as *mut c_void };

        let other = kernel.clone();
        let thid = spawn(&kernel, move || {
            let word = other.get_reserved_tls_addr(0x100).unwrap();
            unsafe { (*word.as_ptr()).is_null() as i32 }
        });

        assert_eq!(kernel.wait_thread_end(thid, None), Ok(1));
        assert_eq!(unsafe { *word.as_ptr() } as usize, 0x1234);
        assert!(kernel.get_reserved_tls_addr(0x200).is_none());
    }
}
