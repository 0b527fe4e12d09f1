use thiserror::Error;

/// Fixed bytes added to the `2 × input` worst-case bound.
///
/// Deflate's own worst case is roughly `n + n/1000 + 12`, so doubling the
/// input is generous for real chunks, but a 0- or 1-byte chunk still needs
/// room for the stream header, an empty final block and the trailer.
pub const FRAMING_SLACK: usize = 16;

/// Failure of a single codec call. Recorded on the chunk job that hit it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("output buffer of {capacity} bytes is too small")]
    OutputTooSmall { capacity: usize },

    #[error("stream ended after {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("stream did not reach its end marker")]
    Incomplete,

    #[error("{codec}: {message}")]
    Backend { codec: &'static str, message: String },
}

/// Block compression abstraction.
///
/// Every call is independent: implementations keep no state between calls,
/// which is what lets the scheduler run one call per chunk on separate
/// threads. Both directions write into caller-owned buffers.
pub trait BlockCodec: Send + Sync {
    /// Human-readable codec name for logs and CLI display.
    fn name(&self) -> &'static str;

    /// Compress `input` into `output` at maximum effort.
    ///
    /// Returns the number of bytes written. Fails with
    /// [`CodecError::OutputTooSmall`] if `output` cannot hold the finished
    /// stream; the planner sizes buffers with [`max_compressed_len`] so this
    /// should not happen in practice.
    ///
    /// [`max_compressed_len`]: BlockCodec::max_compressed_len
    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError>;

    /// Decompress one stream from the front of `input` into `output`.
    ///
    /// `output.len()` is the exact decompressed size: anything shorter,
    /// longer, malformed or truncated is an error. `input` may run past the
    /// end of the stream (into later chunk records); the stream marks its own
    /// end and trailing bytes are ignored.
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError>;

    /// Worst-case compressed size for `input_len` raw bytes.
    fn max_compressed_len(&self, input_len: usize) -> usize {
        2 * input_len + FRAMING_SLACK
    }
}
