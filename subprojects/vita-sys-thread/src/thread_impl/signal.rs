//! Cancellation requests.

use vita_svc::{
    ThreadId,
    raw::Kernel,
    sync::{PollEventFlagError, SetEventFlagError},
};

use super::{LookupError, ThreadManager};

impl<K: Kernel> ThreadManager<K> {
    /// Requests cancellation of `thread`.
    ///
    /// The request is observed by the next cancellable wait of the thread, see
    /// [`cancel`](crate::cancel). Cancelling a thread twice is harmless.
    pub fn cancel(&self, thread: ThreadId) -> Result<(), CancelError> {
        let signal = self.signal_of(thread)?;
        signal.raise(&*self.shared.kernel)?;

        log::debug!("cancellation requested for thread {thread}");

        Ok(())
    }

    /// Returns `true` if cancellation of `thread` was requested.
    pub fn is_cancelled(&self, thread: ThreadId) -> Result<bool, CancelError> {
        let signal = self.signal_of(thread)?;
        Ok(signal.is_raised(&*self.shared.kernel)?)
    }
}

/// Error type for [`ThreadManager::cancel`] and
/// [`ThreadManager::is_cancelled`].
#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("Failed to raise the cancellation signal: {0}")]
    Raise(#[from] SetEventFlagError),
    #[error("Failed to poll the cancellation signal: {0}")]
    Poll(#[from] PollEventFlagError),
}
