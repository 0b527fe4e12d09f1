use crate::error::{CeaflateError, Result};

/// Raw bytes per chunk when compressing: 128 KB.
///
/// Small enough that a modest file still spreads across every core, large
/// enough that per-chunk deflate overhead (fresh dictionary, framing) stays
/// in the noise.
pub const CHUNK_SIZE: usize = 0x20000;

/// Largest block count a container may declare.
///
/// Bounds the offset table, and with 32-bit offsets it bounds the total
/// addressable container size as well.
pub const MAX_BLOCKS: usize = 0xFFFF;

/// Width of the `block_count` field that opens the header.
pub const COUNT_FIELD_LEN: usize = 4;

/// Width of one offset table entry.
pub const OFFSET_ENTRY_LEN: usize = 4;

/// Width of the `uncompressed_size` prefix at the start of every chunk record.
pub const SIZE_PREFIX_LEN: usize = 4;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded container header.
///
/// On the wire (little-endian):
/// ```text
/// [block_count: u32][block_offsets: u32 × block_count]
/// [RECORD 0] [RECORD 1] ... [RECORD N-1]
///   record = [uncompressed_size: u32][compressed payload]
/// ```
/// Every offset is relative to the start of the container and points at the
/// record's `uncompressed_size` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    offsets: Vec<u32>,
}

impl ContainerHeader {
    /// Build a header from computed record offsets.
    ///
    /// Fails with `TooManyBlocks` before anything else if the table would not
    /// fit, and with `SizeOverflow` if any offset is past the 32-bit range.
    pub fn new(offsets: &[u64]) -> Result<Self> {
        if offsets.len() > MAX_BLOCKS {
            return Err(CeaflateError::TooManyBlocks(offsets.len()));
        }
        if offsets.is_empty() {
            return Err(CeaflateError::InvalidBlockCount(0));
        }
        let offsets = offsets
            .iter()
            .map(|&offset| u32::try_from(offset).map_err(|_| CeaflateError::SizeOverflow(offset)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { offsets })
    }

    /// Build and serialize in one step.
    pub fn serialize(offsets: &[u64]) -> Result<Vec<u8>> {
        Ok(Self::new(offsets)?.to_bytes())
    }

    /// Size in bytes of a serialized header holding `block_count` offsets.
    pub fn encoded_len(block_count: usize) -> usize {
        COUNT_FIELD_LEN + block_count * OFFSET_ENTRY_LEN
    }

    /// Decode the header from the start of `bytes`.
    ///
    /// Only `block_count` offsets are read, and only after the count itself
    /// has been range-checked and the table confirmed to fit in `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let block_count = read_u32_le(bytes, 0).ok_or(CeaflateError::HeaderTooShort {
            needed: COUNT_FIELD_LEN as u64,
            actual: bytes.len() as u64,
        })?;
        if block_count == 0 || block_count as usize > MAX_BLOCKS {
            return Err(CeaflateError::InvalidBlockCount(block_count));
        }

        let needed = Self::encoded_len(block_count as usize);
        if bytes.len() < needed {
            return Err(CeaflateError::HeaderTooShort {
                needed: needed as u64,
                actual: bytes.len() as u64,
            });
        }
        let offsets = bytes[COUNT_FIELD_LEN..needed]
            .chunks_exact(OFFSET_ENTRY_LEN)
            .map(|entry| u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]))
            .collect();

        Ok(Self { offsets })
    }

    /// Serialize to exactly `encoded_len(block_count)` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::encoded_len(self.offsets.len()));
        buf.extend_from_slice(&(self.offsets.len() as u32).to_le_bytes());
        for offset in &self.offsets {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        buf
    }

    /// Return the offset of block `index` after checking that at least its
    /// size prefix lies inside a container of `file_size` bytes.
    pub fn validate_offset(&self, file_size: u64, index: usize) -> Result<u32> {
        let offset = *self
            .offsets
            .get(index)
            .ok_or(CeaflateError::BlockIndexOutOfRange {
                index,
                block_count: self.offsets.len(),
            })?;
        if offset as u64 + SIZE_PREFIX_LEN as u64 > file_size {
            return Err(CeaflateError::OffsetOutOfBounds {
                index,
                offset,
                file_size,
            });
        }
        Ok(offset)
    }

    pub fn block_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Bytes occupied by this header on the wire.
    pub fn byte_len(&self) -> usize {
        Self::encoded_len(self.offsets.len())
    }
}

fn read_u32_le(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Read the little-endian `uncompressed_size` prefix of the record at `offset`.
///
/// The caller validates `offset` first; a short read here is still reported
/// as an out-of-bounds offset rather than a panic.
pub(crate) fn read_size_prefix(container: &[u8], index: usize, offset: u32) -> Result<u32> {
    read_u32_le(container, offset as usize).ok_or(CeaflateError::OffsetOutOfBounds {
        index,
        offset,
        file_size: container.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_little_endian_and_length_prefixed() {
        let header = ContainerHeader::new(&[12, 0x0102_0304]).unwrap();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &[2, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[12, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[4, 3, 2, 1]);
        assert_eq!(ContainerHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn parse_rejects_zero_block_count() {
        let err = ContainerHeader::parse(&0u32.to_le_bytes()).unwrap_err();
        assert!(matches!(err, CeaflateError::InvalidBlockCount(0)));
    }

    #[test]
    fn parse_rejects_excessive_block_count() {
        let mut bytes = 65536u32.to_le_bytes().to_vec();
        bytes.resize(1 << 20, 0);
        let err = ContainerHeader::parse(&bytes).unwrap_err();
        assert!(matches!(err, CeaflateError::InvalidBlockCount(65536)));
    }

    #[test]
    fn parse_rejects_truncated_input() {
        let err = ContainerHeader::parse(&[1, 0]).unwrap_err();
        assert!(matches!(
            err,
            CeaflateError::HeaderTooShort { needed: 4, actual: 2 }
        ));

        // Declares three blocks but only carries one offset.
        let mut bytes = 3u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&16u32.to_le_bytes());
        let err = ContainerHeader::parse(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CeaflateError::HeaderTooShort { needed: 16, actual: 8 }
        ));
    }

    #[test]
    fn parse_ignores_bytes_past_the_table() {
        let mut bytes = ContainerHeader::new(&[8]).unwrap().to_bytes();
        bytes.extend_from_slice(&[0xFF; 32]);
        let header = ContainerHeader::parse(&bytes).unwrap();
        assert_eq!(header.offsets(), &[8]);
    }

    #[test]
    fn validate_offset_needs_room_for_size_prefix() {
        let header = ContainerHeader::new(&[8, 20]).unwrap();
        assert_eq!(header.validate_offset(24, 1).unwrap(), 20);
        let err = header.validate_offset(23, 1).unwrap_err();
        assert!(matches!(
            err,
            CeaflateError::OffsetOutOfBounds { index: 1, offset: 20, file_size: 23 }
        ));
    }

    #[test]
    fn validate_offset_rejects_unknown_block() {
        let header = ContainerHeader::new(&[8, 20]).unwrap();
        let err = header.validate_offset(1024, 2).unwrap_err();
        assert!(matches!(
            err,
            CeaflateError::BlockIndexOutOfRange { index: 2, block_count: 2 }
        ));
    }

    #[test]
    fn validate_offset_does_not_overflow_near_u32_max() {
        let header = ContainerHeader::new(&[u32::MAX as u64]).unwrap();
        assert!(header.validate_offset(u32::MAX as u64, 0).is_err());
    }

    #[test]
    fn new_checks_capacity_before_range() {
        let too_many = vec![u64::MAX; MAX_BLOCKS + 1];
        assert!(matches!(
            ContainerHeader::new(&too_many).unwrap_err(),
            CeaflateError::TooManyBlocks(n) if n == MAX_BLOCKS + 1
        ));
        assert!(matches!(
            ContainerHeader::new(&[8, u32::MAX as u64 + 1]).unwrap_err(),
            CeaflateError::SizeOverflow(_)
        ));
    }

    #[test]
    fn size_prefix_read_is_bounds_checked() {
        let container = [0u8, 0, 0, 0, 0x10, 0x27, 0, 0];
        assert_eq!(read_size_prefix(&container, 0, 4).unwrap(), 10_000);
        assert!(read_size_prefix(&container, 0, 6).is_err());
    }
}
