//! Slot identifier type

use core::fmt;
use crate::constants::SLOT_NONE;

/// Index of a task slot in the pool
///
/// A 32-bit value in `[0, capacity)`.
/// The maximum value (u32::MAX) is reserved as a sentinel for "no slot".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SlotId(u32);

impl SlotId {
    /// Sentinel value indicating no slot
    pub const NONE: SlotId = SlotId(SLOT_NONE);

    /// Create a new SlotId from a raw value
    #[inline]
    pub const fn new(id: u32) -> Self {
        SlotId(id)
    }

    /// Get the raw u32 value
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get as usize for indexing
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Check if this is the NONE sentinel
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == SLOT_NONE
    }

    /// Convert to Option
    #[inline]
    pub const fn to_option(self) -> Option<SlotId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u32> for SlotId {
    #[inline]
    fn from(id: u32) -> Self {
        SlotId(id)
    }
}

impl From<SlotId> for u32 {
    #[inline]
    fn from(id: SlotId) -> Self {
        id.0
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "SlotId(NONE)")
        } else {
            write!(f, "SlotId({})", self.0)
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "-")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_sentinel() {
        assert!(SlotId::NONE.is_none());
        assert_eq!(SlotId::NONE.to_option(), None);
        assert_eq!(SlotId::new(7).to_option(), Some(SlotId::new(7)));
        assert_eq!(format!("{:?}", SlotId::NONE), "SlotId(NONE)");
    }
}
