use ceaflate_core::codec::{BlockCodec, CodecError};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

/// Deflate block codec with the zlib wrapper.
///
/// Each call builds a fresh stream, so chunks share no dictionary or state
/// and any chunk decodes on its own. The zlib trailer's Adler-32 makes a
/// corrupted chunk fail loudly instead of decoding to garbage.
///
/// Defaults to the maximum compression level (9): the container exists to
/// spread that cost across every core.
pub struct DeflateCodec {
    /// Compression level (0 = store, 9 = slowest / smallest).
    pub level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self {
            level: Compression::best().level(),
        }
    }
}

impl DeflateCodec {
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(Compression::best().level()),
        }
    }
}

fn backend(err: impl std::fmt::Display) -> CodecError {
    CodecError::Backend {
        codec: "deflate",
        message: err.to_string(),
    }
}

impl BlockCodec for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
        let mut stream = Compress::new(Compression::new(self.level), true);
        let status = stream
            .compress(input, output, FlushCompress::Finish)
            .map_err(backend)?;
        match status {
            Status::StreamEnd => Ok(stream.total_out() as usize),
            Status::Ok | Status::BufError => Err(CodecError::OutputTooSmall {
                capacity: output.len(),
            }),
        }
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
        let expected = output.len();
        // An empty chunk still has a stream to walk; give the decoder a byte
        // of room so it is never handed a zero-length buffer.
        let mut scratch = [0u8; 1];
        let target: &mut [u8] = if output.is_empty() {
            &mut scratch
        } else {
            output
        };

        let mut stream = Decompress::new(true);
        let status = stream
            .decompress(input, target, FlushDecompress::Finish)
            .map_err(backend)?;
        let produced = stream.total_out() as usize;

        match status {
            Status::StreamEnd if produced == expected => Ok(produced),
            Status::StreamEnd => Err(CodecError::LengthMismatch {
                expected,
                actual: produced,
            }),
            // Buffer full but the stream wants to keep going.
            _ if produced >= expected => Err(CodecError::OutputTooSmall { capacity: expected }),
            _ => Err(CodecError::Incomplete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(codec: &DeflateCodec, raw: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; codec.max_compressed_len(raw.len())];
        let n = codec.compress(raw, &mut out).unwrap();
        out.truncate(n);
        out
    }

    #[test]
    fn round_trip_exact_size() {
        let codec = DeflateCodec::default();
        let raw = b"deflate me, deflate me, deflate me again".repeat(50);
        let compressed = packed(&codec, &raw);
        assert!(compressed.len() < raw.len());

        let mut out = vec![0u8; raw.len()];
        assert_eq!(codec.decompress(&compressed, &mut out).unwrap(), raw.len());
        assert_eq!(out, raw);
    }

    #[test]
    fn tiny_inputs_fit_the_worst_case_bound() {
        let codec = DeflateCodec::default();
        for len in 0..8 {
            let raw = vec![0xA5u8; len];
            let compressed = packed(&codec, &raw);
            let mut out = vec![0u8; len];
            codec.decompress(&compressed, &mut out).unwrap();
            assert_eq!(out, raw);
        }
    }

    #[test]
    fn incompressible_input_fits_the_worst_case_bound() {
        let codec = DeflateCodec::default();
        let mut state = 0x9E37_79B9u32;
        let raw: Vec<u8> = (0..65_536)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        let compressed = packed(&codec, &raw);
        assert!(compressed.len() <= codec.max_compressed_len(raw.len()));
    }

    #[test]
    fn trailing_bytes_after_the_stream_are_ignored() {
        let codec = DeflateCodec::default();
        let raw = b"first record".to_vec();
        let mut input = packed(&codec, &raw);
        input.extend_from_slice(b"\x05\x00\x00\x00 next record bytes");
        let mut out = vec![0u8; raw.len()];
        codec.decompress(&input, &mut out).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn wrong_declared_size_fails() {
        let codec = DeflateCodec::default();
        let raw = vec![1u8; 1000];
        let compressed = packed(&codec, &raw);

        let mut short = vec![0u8; 999];
        assert!(codec.decompress(&compressed, &mut short).is_err());

        let mut long = vec![0u8; 1001];
        assert_eq!(
            codec.decompress(&compressed, &mut long),
            Err(CodecError::LengthMismatch { expected: 1001, actual: 1000 })
        );
    }

    #[test]
    fn truncated_stream_fails() {
        let codec = DeflateCodec::default();
        let raw = b"some text that will be cut short".repeat(20);
        let compressed = packed(&codec, &raw);
        let mut out = vec![0u8; raw.len()];
        assert!(codec
            .decompress(&compressed[..compressed.len() / 2], &mut out)
            .is_err());
    }

    #[test]
    fn garbage_input_fails() {
        let codec = DeflateCodec::default();
        let mut out = vec![0u8; 16];
        assert!(codec.decompress(b"definitely not zlib", &mut out).is_err());
    }

    #[test]
    fn too_small_output_is_reported() {
        let codec = DeflateCodec::default();
        let raw = vec![7u8; 4096];
        let mut out = vec![0u8; 2];
        assert!(codec.compress(&raw, &mut out).is_err());
    }

    #[test]
    fn level_is_clamped() {
        assert_eq!(DeflateCodec::new(42).level, 9);
        assert_eq!(DeflateCodec::default().level, 9);
    }
}
