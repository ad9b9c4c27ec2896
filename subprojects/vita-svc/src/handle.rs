//! Kernel object id types.
//!
//! The thread manager refers to every kernel object through a `SceUID`, a
//! positive 32-bit integer. Negative values are error codes and `0` is never a
//! valid id, which is why it doubles as the "no object" sentinel.

use static_assertions::const_assert_eq;

use crate::raw::INVALID_UID;

/// Internal macro to generate [`Uid`] newtypes with common helpers.
///
/// [`Uid`]: crate::raw::Uid
macro_rules! define_uid_type {
    {
        $(#[$meta:meta])* $vis:vis struct $name:ident
    } => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $vis struct $name(pub(crate) $crate::raw::Uid);

        impl $name {
            /// Converts a raw id to a [`$name`].
            ///
            /// # Safety
            ///
            /// Caller must guarantee that the raw id names a live object of the
            /// matching kind.
            pub const unsafe fn from_raw(raw: $crate::raw::Uid) -> Self {
                Self(raw)
            }

            /// Returns `true` if the id is valid.
            pub const fn is_valid(&self) -> bool {
                self.0 > $crate::raw::INVALID_UID
            }

            /// Converts the [`$name`] to a raw id.
            pub const fn to_raw(&self) -> $crate::raw::Uid {
                self.0
            }
        }

        impl ::core::cmp::PartialEq<$crate::raw::Uid> for $name {
            fn eq(&self, other: &$crate::raw::Uid) -> bool {
                &self.0 == other
            }
        }

        impl ::core::cmp::PartialEq<$name> for $crate::raw::Uid {
            fn eq(&self, other: &$name) -> bool {
                self == &other.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

define_uid_type! {
    /// Id of a kernel thread.
    pub struct ThreadId
}

define_uid_type! {
    /// Id of a kernel mutex.
    pub struct MutexId
}

define_uid_type! {
    /// Id of a kernel counting semaphore.
    pub struct SemaId
}

define_uid_type! {
    /// Id of a kernel event flag.
    pub struct EventFlagId
}

// Ids are never zero, so `0` is free to act as the "unset" marker.
const_assert_eq!(INVALID_UID, 0);

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::{MutexId, ThreadId};
    use crate::raw::INVALID_UID;

    #[test]
    fn ids_wrap_raw_uids() {
        let thread = ThreadId(0x4001_0003);
        let unset = MutexId(INVALID_UID);

        assert!(thread.is_valid());
        assert!(!unset.is_valid());
        assert_eq!(thread.to_raw(), 0x4001_0003);
        assert_eq!(thread, 0x4001_0003);
        assert_eq!(unsafe { ThreadId::from_raw(0x4001_0003) }, thread);
        assert_eq!(format!("{thread}"), "0x40010003");
    }
}
