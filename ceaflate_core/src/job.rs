use crate::codec::{BlockCodec, CodecError};
use crate::format::SIZE_PREFIX_LEN;

/// One chunk's worth of codec work.
///
/// A job borrows its input from the buffer the pipeline was handed (the raw
/// file when compressing, the container when decompressing) and owns its
/// output outright. The scheduler hands each job to exactly one worker, so no
/// two workers ever touch the same output buffer.
#[derive(Debug)]
pub struct ChunkJob<'a> {
    index: usize,
    input: &'a [u8],
    output: Vec<u8>,
    /// Where the codec starts writing; bytes before this are pre-filled.
    write_offset: usize,
    /// Meaningful bytes of `output`. Starts at the buffer capacity and is
    /// trimmed to the real stream length after a successful compression.
    output_size: usize,
    failure: Option<CodecError>,
}

impl<'a> ChunkJob<'a> {
    /// A compression job for raw chunk `input`.
    ///
    /// The output buffer is `4 + max_compressed_len` bytes and already holds
    /// the little-endian `uncompressed_size` prefix of the chunk record.
    pub fn for_compression(index: usize, input: &'a [u8], max_compressed_len: usize) -> Self {
        let capacity = SIZE_PREFIX_LEN + max_compressed_len;
        let mut output = vec![0u8; capacity];
        output[..SIZE_PREFIX_LEN].copy_from_slice(&(input.len() as u32).to_le_bytes());
        Self {
            index,
            input,
            output,
            write_offset: SIZE_PREFIX_LEN,
            output_size: capacity,
            failure: None,
        }
    }

    /// A decompression job whose output is exactly `raw_len` bytes.
    ///
    /// `input` starts right after the record's size prefix and may extend to
    /// the end of the container.
    pub fn for_decompression(index: usize, input: &'a [u8], raw_len: usize) -> Self {
        Self {
            index,
            input,
            output: vec![0u8; raw_len],
            write_offset: 0,
            output_size: raw_len,
            failure: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    /// The produced bytes. For compression this is the full chunk record,
    /// size prefix included.
    pub fn output(&self) -> &[u8] {
        &self.output[..self.output_size]
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn failure(&self) -> Option<&CodecError> {
        self.failure.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Compress the input into the space after the size prefix.
    pub fn run_compression(&mut self, codec: &dyn BlockCodec) -> Result<(), CodecError> {
        let capacity = self.output.len() - self.write_offset;
        let written = codec.compress(self.input, &mut self.output[self.write_offset..])?;
        if written > capacity {
            return Err(CodecError::OutputTooSmall { capacity });
        }
        self.output_size = self.write_offset + written;
        Ok(())
    }

    /// Inflate the input into the exact-size output buffer.
    pub fn run_decompression(&mut self, codec: &dyn BlockCodec) -> Result<(), CodecError> {
        let expected = self.output.len() - self.write_offset;
        let written = codec.decompress(self.input, &mut self.output[self.write_offset..])?;
        if written != expected {
            return Err(CodecError::LengthMismatch {
                expected,
                actual: written,
            });
        }
        Ok(())
    }

    /// Store the outcome of a codec call. Called once, by the worker that
    /// ran the job.
    pub(crate) fn record(&mut self, result: Result<(), CodecError>) {
        if let Err(err) = result {
            log::warn!("block #{} failed: {}", self.index, err);
            self.failure = Some(err);
        }
    }

    pub(crate) fn into_output(mut self) -> Vec<u8> {
        self.output.truncate(self.output_size);
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Copies input to output verbatim.
    struct Verbatim;

    impl BlockCodec for Verbatim {
        fn name(&self) -> &'static str {
            "verbatim"
        }

        fn compress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
            let dst = output
                .get_mut(..input.len())
                .ok_or(CodecError::OutputTooSmall { capacity: input.len() })?;
            dst.copy_from_slice(input);
            Ok(input.len())
        }

        fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
            let n = output.len().min(input.len());
            output[..n].copy_from_slice(&input[..n]);
            Ok(n)
        }
    }

    #[test]
    fn compression_job_prewrites_size_prefix() {
        let input = [7u8; 300];
        let job = ChunkJob::for_compression(2, &input, 616);
        assert_eq!(job.output_size(), 620);
        assert_eq!(&job.output()[..4], &300u32.to_le_bytes());
        assert_eq!(job.index(), 2);
    }

    #[test]
    fn compression_trims_output_to_bytes_written() {
        let input = b"abcdef";
        let mut job = ChunkJob::for_compression(0, input, Verbatim.max_compressed_len(input.len()));
        let result = job.run_compression(&Verbatim);
        job.record(result);
        assert!(!job.is_failed());
        assert_eq!(job.output(), b"\x06\x00\x00\x00abcdef");
        assert_eq!(job.into_output().len(), 10);
    }

    /// Claims to have written far more than it was given room for.
    struct Boastful;

    impl BlockCodec for Boastful {
        fn name(&self) -> &'static str {
            "boastful"
        }

        fn compress(&self, _input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
            Ok(output.len() + 1)
        }

        fn decompress(&self, _input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
            Ok(output.len())
        }
    }

    #[test]
    fn overreported_compressed_size_is_rejected() {
        let mut job = ChunkJob::for_compression(0, b"abc", 22);
        assert_eq!(
            job.run_compression(&Boastful),
            Err(CodecError::OutputTooSmall { capacity: 22 })
        );
        assert_eq!(job.output_size(), 26);
    }

    #[test]
    fn short_decompression_is_a_length_mismatch() {
        let mut job = ChunkJob::for_decompression(0, b"abc", 5);
        let result = job.run_decompression(&Verbatim);
        assert_eq!(
            result,
            Err(CodecError::LengthMismatch { expected: 5, actual: 3 })
        );
        job.record(result);
        assert!(job.is_failed());
    }
}
