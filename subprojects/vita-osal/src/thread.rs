//! Thread operations.

use vita_svc::{ThreadId, raw::Kernel};
use vita_sys_thread::{ThreadArg, ThreadEntry, priority};

use crate::{Error, Osal};

impl<K: Kernel> Osal<K> {
    /// Creates a dormant thread running `entry(arg)` once started.
    ///
    /// `priority` is on the portable scale, between
    /// [`thread_min_priority`](Osal::thread_min_priority) and
    /// [`thread_max_priority`](Osal::thread_max_priority).
    pub fn thread_create(
        &self,
        entry: ThreadEntry,
        stack_size: usize,
        priority: i32,
        arg: ThreadArg,
    ) -> Result<ThreadId, Error> {
        Ok(self.threads.create(entry, stack_size, priority, arg)?)
    }

    /// Starts a thread created with [`thread_create`](Osal::thread_create).
    pub fn thread_start(&self, thread: ThreadId) -> Result<(), Error> {
        Ok(self.threads.start(thread)?)
    }

    /// Ends the calling thread. It stays registered until deleted.
    pub fn thread_exit(&self) -> ! {
        self.threads.exit()
    }

    /// Unregisters `thread` and ends the calling thread, deleting it.
    pub fn thread_exit_and_delete(&self, thread: ThreadId) -> ! {
        self.threads.exit_and_delete(thread)
    }

    /// Unregisters `thread` and deletes it.
    pub fn thread_delete(&self, thread: ThreadId) -> Result<(), Error> {
        Ok(self.threads.delete(thread)?)
    }

    /// Blocks until `thread` ends, or until the calling thread is cancelled.
    pub fn thread_wait_for_end(&self, thread: ThreadId) -> Result<(), Error> {
        Ok(self.threads.wait_for_end(thread)?)
    }

    /// Requests cancellation of `thread`.
    pub fn thread_cancel(&self, thread: ThreadId) -> Result<(), Error> {
        Ok(self.threads.cancel(thread)?)
    }

    /// Fails with [`Error::Interrupted`] if cancellation of `thread` was
    /// requested.
    pub fn thread_check_cancel(&self, thread: ThreadId) -> Result<(), Error> {
        if self.threads.is_cancelled(thread)? {
            return Err(Error::Interrupted);
        }

        Ok(())
    }

    pub fn thread_get_priority(&self, thread: ThreadId) -> Result<i32, Error> {
        Ok(self.threads.get_priority(thread)?)
    }

    pub fn thread_set_priority(&self, thread: ThreadId, priority: i32) -> Result<(), Error> {
        Ok(self.threads.set_priority(thread, priority)?)
    }

    /// Returns the CPU affinity of `thread`, one bit per core.
    pub fn thread_get_affinity(&self, thread: ThreadId) -> Result<u32, Error> {
        Ok(self.threads.get_affinity(thread)?)
    }

    /// Restricts `thread` to the cores set in `affinity`.
    pub fn thread_set_affinity(&self, thread: ThreadId, affinity: u32) -> Result<(), Error> {
        Ok(self.threads.set_affinity(thread, affinity)?)
    }

    pub fn thread_sleep(&self, ms: u32) {
        self.threads.sleep(ms)
    }

    /// Returns the handle of the calling thread.
    pub fn thread_get_handle(&self) -> ThreadId {
        self.threads.current()
    }

    pub const fn thread_min_priority() -> i32 {
        priority::min_priority()
    }

    pub const fn thread_max_priority() -> i32 {
        priority::max_priority()
    }

    pub const fn thread_default_priority() -> i32 {
        priority::default_priority()
    }
}
