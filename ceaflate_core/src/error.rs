//! The single error type surfaced by every pipeline operation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CeaflateError>;

#[derive(Error, Debug)]
pub enum CeaflateError {
    // ── Format errors: detected before any chunk work begins ───────────────
    #[error("container too short for header: need {needed} bytes, have {actual}")]
    HeaderTooShort { needed: u64, actual: u64 },

    #[error("invalid block count {0} (must be between 1 and 65535)")]
    InvalidBlockCount(u32),

    #[error("block #{index} has an invalid offset ({offset} + 4 > {file_size})")]
    OffsetOutOfBounds {
        index: usize,
        offset: u32,
        file_size: u64,
    },

    #[error("block #{index} does not exist (container has {block_count} blocks)")]
    BlockIndexOutOfRange { index: usize, block_count: usize },

    #[error(
        "block #{index} declares {declared} uncompressed bytes, \
         impossible from {available} compressed bytes"
    )]
    ImplausibleChunkSize {
        index: usize,
        declared: u32,
        available: u64,
    },

    // ── Capacity errors: detected during planning, before writing ──────────
    #[error("maximum blocks exceeded ({0} > 65535)")]
    TooManyBlocks(usize),

    #[error("container size exceeds the 32-bit offset limit ({0} > {max})", max = u32::MAX)]
    SizeOverflow(u64),

    // ── Codec errors: collected per chunk after every job has finished ─────
    #[error("{} failed to compress", describe_blocks(.0))]
    ChunkCompressionFailed(Vec<usize>),

    #[error("{} failed to decompress", describe_blocks(.0))]
    ChunkDecompressionFailed(Vec<usize>),

    #[error("invalid options: {0}")]
    InvalidOptions(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CeaflateError {
    /// Indices of the chunks whose codec job failed, if this is a codec error.
    pub fn failed_blocks(&self) -> Option<&[usize]> {
        match self {
            Self::ChunkCompressionFailed(indices) | Self::ChunkDecompressionFailed(indices) => {
                Some(indices)
            }
            _ => None,
        }
    }
}

fn describe_blocks(indices: &[usize]) -> String {
    let list = indices
        .iter()
        .map(|i| format!("#{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    if indices.len() == 1 {
        format!("block {list}")
    } else {
        format!("blocks {list}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_failures_list_every_index() {
        let err = CeaflateError::ChunkDecompressionFailed(vec![1, 4]);
        assert_eq!(err.to_string(), "blocks #1, #4 failed to decompress");
        assert_eq!(err.failed_blocks(), Some(&[1, 4][..]));

        let err = CeaflateError::ChunkCompressionFailed(vec![0]);
        assert_eq!(err.to_string(), "block #0 failed to compress");
    }

    #[test]
    fn format_errors_carry_no_block_list() {
        assert!(CeaflateError::InvalidBlockCount(0).failed_blocks().is_none());
    }
}
