//! Thread manager error codes.
//!
//! Every failing thread manager call returns a negative `SceUID`/`int`. Seen
//! as a `u32`, all the codes this crate distinguishes live in the
//! `0x8002_xxxx` kernel error space. Codes that are not listed here are still
//! carried verbatim by [`Error`](crate::result::Error).

use crate::result::ResultCode;

/// Known thread manager error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
#[non_exhaustive]
pub enum KernelError {
    /// Unclassified kernel failure.
    Error = 0x8002_0001,
    /// An argument was rejected before the object was looked up.
    InvalidArgument = 0x8002_0003,
    /// The kernel ran out of memory for the object or its stack.
    NoMemory = 0x8002_0190,
    /// The id does not name a live object of the expected kind.
    UnknownUid = 0x8002_8001,
    /// Thread priority outside the range allowed for user threads.
    IllegalPriority = 0x8002_8002,
    /// Thread stack size rejected by the kernel.
    IllegalStackSize = 0x8002_8003,
    /// CPU affinity mask with bits outside the user cores.
    IllegalCpuAffinityMask = 0x8002_8004,
    /// The thread is still running and cannot be deleted.
    NotDormant = 0x8002_8005,
    /// A thread tried to wait for its own termination.
    CanNotWaitSelf = 0x8002_8006,
    /// A bounded wait expired.
    WaitTimeout = 0x8002_8007,
    /// The wait was cancelled.
    WaitCancel = 0x8002_8008,
    /// The object was deleted while the thread was waiting on it.
    WaitDelete = 0x8002_8009,
    /// A non-recursive mutex was locked again by its owner.
    MutexRecursive = 0x8002_800A,
    /// A mutex was unlocked by a thread that does not own it.
    MutexUnlockUdf = 0x8002_800B,
    /// Signalling the semaphore would exceed its maximum count.
    SemaOvf = 0x8002_800C,
    /// The event flag pattern does not satisfy the poll condition.
    EventCond = 0x8002_800D,
    /// An empty bit pattern was passed to an event flag call.
    IllegalPattern = 0x8002_800E,
}

impl KernelError {
    /// Returns the raw code of this error.
    #[inline]
    pub const fn to_rc(self) -> ResultCode {
        self as u32
    }
}

impl PartialEq<u32> for KernelError {
    fn eq(&self, other: &u32) -> bool {
        *self as u32 == *other
    }
}

impl PartialEq<KernelError> for u32 {
    fn eq(&self, other: &KernelError) -> bool {
        *self == *other as u32
    }
}

impl TryFrom<ResultCode> for KernelError {
    type Error = ResultCode;

    /// Identifies a raw code, handing it back unchanged when it is not one of
    /// the known codes.
    fn try_from(rc: ResultCode) -> Result<Self, ResultCode> {
        const KNOWN: [KernelError; 17] = [
            KernelError::Error,
            KernelError::InvalidArgument,
            KernelError::NoMemory,
            KernelError::UnknownUid,
            KernelError::IllegalPriority,
            KernelError::IllegalStackSize,
            KernelError::IllegalCpuAffinityMask,
            KernelError::NotDormant,
            KernelError::CanNotWaitSelf,
            KernelError::WaitTimeout,
            KernelError::WaitCancel,
            KernelError::WaitDelete,
            KernelError::MutexRecursive,
            KernelError::MutexUnlockUdf,
            KernelError::SemaOvf,
            KernelError::EventCond,
            KernelError::IllegalPattern,
        ];

        KNOWN.into_iter().find(|known| *known == rc).ok_or(rc)
    }
}

#[cfg(test)]
mod tests {
    use super::KernelError;

    #[test]
    fn known_codes_are_identified() {
        assert_eq!(
            KernelError::try_from(0x8002_8007),
            Ok(KernelError::WaitTimeout)
        );
        assert_eq!(KernelError::try_from(0x8002_0190), Ok(KernelError::NoMemory));
    }

    #[test]
    fn unknown_codes_are_handed_back() {
        assert_eq!(KernelError::try_from(0x8001_0002), Err(0x8001_0002));
    }

    #[test]
    fn compares_against_raw_codes() {
        assert!(KernelError::SemaOvf == 0x8002_800C);
        assert!(0x8002_800Cu32 == KernelError::SemaOvf);
        assert!(KernelError::SemaOvf != 0x8002_800D);
    }
}
