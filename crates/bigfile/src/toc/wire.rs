//! Bit layout of the fixed TOC record fields
//!
//! Each record is `u32 offsetField, i32 sizeField`:
//!
//! ```text
//! offsetField: [31] indirect  [30..0] offset >> 5, or aux block position
//! sizeField:   [31] compressed  [30] has children  [29..0] size
//! ```

use crate::error::{BigfileError, Result};
use crate::file::FileId;
use crate::offset::{OFFSET_GRANULARITY, OFFSET_SHIFT, StreamOffset};

/// Mask of the payload size bits
pub const SIZE_MASK: u32 = 0x3FFF_FFFF;
/// Largest payload size the size field can hold
pub const MAX_FILE_SIZE: u64 = SIZE_MASK as u64;

const COMPRESSED_FLAG: u32 = 1 << 31;
const CHILDREN_FLAG: u32 = 1 << 30;
const INDIRECT_FLAG: u32 = 1 << 31;
const OFFSET_MASK: u32 = 0x7FFF_FFFF;
/// Stored value of an unassigned literal offset
const EMPTY_OFFSET: u32 = OFFSET_MASK;

/// Largest byte position an indirect offset may point at
pub const MAX_AUX_POSITION: u64 = OFFSET_MASK as u64;

/// Decoded size field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeField {
    /// Payload size
    pub size: u32,
    /// Payload is stored compressed
    pub compressed: bool,
    /// Entry carries a child list in its aux block
    pub has_children: bool,
}

impl SizeField {
    /// Build a size field, rejecting sizes that overflow the 30-bit range
    pub fn new(file_id: FileId, size: u64, compressed: bool, has_children: bool) -> Result<Self> {
        if size > MAX_FILE_SIZE {
            return Err(BigfileError::FileTooLarge {
                file_id,
                size,
                max: MAX_FILE_SIZE,
            });
        }
        Ok(Self {
            size: size as u32,
            compressed,
            has_children,
        })
    }

    /// Decode the raw field
    pub const fn decode(raw: u32) -> Self {
        Self {
            size: raw & SIZE_MASK,
            compressed: raw & COMPRESSED_FLAG != 0,
            has_children: raw & CHILDREN_FLAG != 0,
        }
    }

    /// Encode to the raw field
    pub const fn encode(self) -> u32 {
        let mut raw = self.size & SIZE_MASK;
        if self.compressed {
            raw |= COMPRESSED_FLAG;
        }
        if self.has_children {
            raw |= CHILDREN_FLAG;
        }
        raw
    }
}

/// Decoded offset field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetField {
    /// Single placement stored inline
    Literal(StreamOffset),
    /// Byte position of the entry's aux block inside the TOC
    Indirect(u32),
}

impl OffsetField {
    /// Decode the raw field
    pub const fn decode(raw: u32) -> Self {
        if raw & INDIRECT_FLAG != 0 {
            Self::Indirect(raw & OFFSET_MASK)
        } else {
            Self::Literal(decode_offset(raw))
        }
    }

    /// Encode to the raw field
    pub fn encode(self) -> Result<u32> {
        match self {
            Self::Literal(offset) => encode_offset(offset),
            Self::Indirect(position) => {
                if position > OFFSET_MASK {
                    return Err(BigfileError::OffsetOverflow(u64::from(position)));
                }
                Ok(position | INDIRECT_FLAG)
            }
        }
    }
}

/// Encode an archive offset as a shifted 31-bit value
pub fn encode_offset(offset: StreamOffset) -> Result<u32> {
    let Some(value) = offset.get() else {
        return Ok(EMPTY_OFFSET);
    };
    if value % OFFSET_GRANULARITY != 0 {
        return Err(BigfileError::MisalignedOffset {
            offset: value,
            alignment: OFFSET_GRANULARITY,
        });
    }
    let shifted = value >> OFFSET_SHIFT;
    if shifted >= u64::from(EMPTY_OFFSET) {
        return Err(BigfileError::OffsetOverflow(value));
    }
    Ok(shifted as u32)
}

/// Decode a shifted 31-bit offset value
pub const fn decode_offset(raw: u32) -> StreamOffset {
    let value = raw & OFFSET_MASK;
    if value == EMPTY_OFFSET {
        StreamOffset::EMPTY
    } else {
        StreamOffset::new((value as u64) << OFFSET_SHIFT)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_size_flags() {
        let field = SizeField::new(0, 5000, false, true).expect("size");
        let raw = field.encode();
        assert_eq!(raw, 5000 | CHILDREN_FLAG);
        assert_eq!(SizeField::decode(raw), field);

        let field = SizeField::new(0, MAX_FILE_SIZE, true, true).expect("size");
        assert_eq!(field.encode(), u32::MAX);
        assert_eq!(SizeField::decode(u32::MAX).size, SIZE_MASK);
    }

    #[test]
    fn test_size_overflow() {
        assert!(matches!(
            SizeField::new(4, 1 << 30, false, false),
            Err(BigfileError::FileTooLarge { file_id: 4, .. })
        ));
    }

    #[test]
    fn test_literal_offsets() {
        let raw = OffsetField::Literal(StreamOffset::new(5376)).encode().expect("encode");
        assert_eq!(raw, 5376 >> 5);
        assert_eq!(
            OffsetField::decode(raw),
            OffsetField::Literal(StreamOffset::new(5376))
        );

        let raw = OffsetField::Literal(StreamOffset::EMPTY).encode().expect("encode");
        assert_eq!(raw, 0x7FFF_FFFF);
        assert_eq!(OffsetField::decode(raw), OffsetField::Literal(StreamOffset::EMPTY));

        assert_eq!(
            OffsetField::decode(0),
            OffsetField::Literal(StreamOffset::ZERO)
        );
    }

    #[test]
    fn test_literal_offset_errors() {
        assert!(matches!(
            encode_offset(StreamOffset::new(33)),
            Err(BigfileError::MisalignedOffset { offset: 33, alignment: 32 })
        ));
        assert!(matches!(
            encode_offset(StreamOffset::new(0x7FFF_FFFF << 5)),
            Err(BigfileError::OffsetOverflow(_))
        ));
        assert!(encode_offset(StreamOffset::new(0x7FFF_FFFE << 5)).is_ok());
    }

    #[test]
    fn test_indirect_offsets() {
        let raw = OffsetField::Indirect(40).encode().expect("encode");
        assert_eq!(raw, 40 | INDIRECT_FLAG);
        assert_eq!(OffsetField::decode(raw), OffsetField::Indirect(40));
        assert!(OffsetField::Indirect(0x8000_0000).encode().is_err());
    }
}
