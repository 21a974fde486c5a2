//! Stream offsets with an explicit "unassigned" sentinel

use std::fmt;

use crate::align::align_up;

/// Granularity of offsets stored in the TOC (offsets are stored `>> 5`)
pub const OFFSET_GRANULARITY: u64 = 1 << OFFSET_SHIFT;

/// Shift applied to literal offsets in the TOC offset field
pub const OFFSET_SHIFT: u32 = 5;

/// Byte offset into an archive.
///
/// [`StreamOffset::EMPTY`] marks an offset that was never assigned and is
/// distinct from offset zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamOffset(u64);

impl StreamOffset {
    /// Unassigned offset
    pub const EMPTY: Self = Self(u64::MAX);

    /// Start of the archive
    pub const ZERO: Self = Self(0);

    /// Wrap a byte position
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Check whether the offset is unassigned
    pub const fn is_empty(self) -> bool {
        self.0 == u64::MAX
    }

    /// Byte position, or `None` when unassigned
    pub const fn get(self) -> Option<u64> {
        if self.is_empty() { None } else { Some(self.0) }
    }

    /// Round up to `alignment`; unassigned offsets stay unassigned
    #[must_use]
    pub const fn align(self, alignment: u64) -> Self {
        if self.is_empty() {
            self
        } else {
            Self(align_up(self.0, alignment))
        }
    }
}

impl Default for StreamOffset {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<u64> for StreamOffset {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for StreamOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => write!(f, "{value:#x}"),
            None => f.write_str("empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_not_zero() {
        assert_ne!(StreamOffset::EMPTY, StreamOffset::ZERO);
        assert!(StreamOffset::default().is_empty());
        assert_eq!(StreamOffset::ZERO.get(), Some(0));
        assert_eq!(StreamOffset::EMPTY.get(), None);
    }

    #[test]
    fn test_align() {
        assert_eq!(StreamOffset::new(10).align(256), StreamOffset::new(256));
        assert_eq!(StreamOffset::EMPTY.align(256), StreamOffset::EMPTY);
    }

    #[test]
    fn test_display() {
        assert_eq!(StreamOffset::new(256).to_string(), "0x100");
        assert_eq!(StreamOffset::EMPTY.to_string(), "empty");
    }
}
