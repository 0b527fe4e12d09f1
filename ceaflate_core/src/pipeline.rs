use std::num::NonZeroUsize;

use crate::codec::BlockCodec;
use crate::error::{CeaflateError, Result};
use crate::format::{ContainerHeader, CHUNK_SIZE};
use crate::job::ChunkJob;
use crate::planner::{plan_compression, plan_decompression};
use crate::scheduler::Scheduler;

/// Knobs for one compress or decompress run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Raw bytes per chunk when compressing. Ignored when decompressing,
    /// where each record carries its own size.
    pub chunk_size: usize,
    /// Concurrent codec jobs; `None` uses the host's available parallelism.
    pub max_parallel: Option<NonZeroUsize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            max_parallel: None,
        }
    }
}

impl PipelineOptions {
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = NonZeroUsize::new(max_parallel);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(CeaflateError::InvalidOptions(
                "chunk_size must be greater than 0",
            ));
        }
        if u32::try_from(self.chunk_size).is_err() {
            return Err(CeaflateError::InvalidOptions(
                "chunk_size must fit in a 32-bit size prefix",
            ));
        }
        Ok(())
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::with_limit(self.max_parallel)
    }
}

/// Compress `input` into a complete container.
///
/// Every chunk is compressed, even after one fails, so the error names every
/// failing block. Nothing is returned unless all of them succeed.
pub fn compress(input: &[u8], codec: &dyn BlockCodec, options: &PipelineOptions) -> Result<Vec<u8>> {
    options.validate()?;

    let mut jobs = plan_compression(input, options.chunk_size, codec)?;
    let block_count = jobs.len();
    log::info!(
        "compressing {} bytes as {} chunk{} with {}",
        input.len(),
        block_count,
        if block_count == 1 { "" } else { "s" },
        codec.name()
    );

    options
        .scheduler()
        .run(&mut jobs, |job| job.run_compression(codec));

    let failed = failed_blocks(&jobs);
    if !failed.is_empty() {
        return Err(CeaflateError::ChunkCompressionFailed(failed));
    }

    let (header, total_len) = lay_out_records(jobs.iter().map(|job| job.output_size()))?;

    let mut container = Vec::with_capacity(total_len as usize);
    container.extend_from_slice(&header);
    for job in jobs {
        container.extend_from_slice(job.output());
    }

    log::info!(
        "compressed {} bytes into {} bytes",
        input.len(),
        container.len()
    );
    Ok(container)
}

/// Decompress a container produced by [`compress`] back into the original
/// bytes.
///
/// The header and every offset are validated before any codec work starts.
pub fn decompress(
    container: &[u8],
    codec: &dyn BlockCodec,
    options: &PipelineOptions,
) -> Result<Vec<u8>> {
    let header = ContainerHeader::parse(container)?;
    let mut jobs = plan_decompression(container, &header)?;
    let block_count = jobs.len();
    log::info!(
        "decompressing {} chunk{} with {}",
        block_count,
        if block_count == 1 { "" } else { "s" },
        codec.name()
    );

    options
        .scheduler()
        .run(&mut jobs, |job| job.run_decompression(codec));

    let failed = failed_blocks(&jobs);
    if !failed.is_empty() {
        return Err(CeaflateError::ChunkDecompressionFailed(failed));
    }

    let total: usize = jobs.iter().map(|job| job.output_size()).sum();
    let mut output = Vec::with_capacity(total);
    for job in jobs {
        output.extend_from_slice(&job.into_output());
    }

    log::info!(
        "decompressed {} bytes into {} bytes",
        container.len(),
        output.len()
    );
    Ok(output)
}

/// Serialize the header for records of the given lengths, packed back to
/// back after it. Returns the header bytes and the full container length.
///
/// Offsets follow the actual record sizes, not the worst-case buffers.
fn lay_out_records(record_lens: impl ExactSizeIterator<Item = usize>) -> Result<(Vec<u8>, u64)> {
    let mut offsets = Vec::with_capacity(record_lens.len());
    let mut cursor = ContainerHeader::encoded_len(record_lens.len()) as u64;
    for len in record_lens {
        offsets.push(cursor);
        cursor += len as u64;
    }
    let header = ContainerHeader::serialize(&offsets)?;
    Ok((header, cursor))
}

fn failed_blocks(jobs: &[ChunkJob<'_>]) -> Vec<usize> {
    jobs.iter()
        .filter(|job| job.is_failed())
        .map(|job| job.index())
        .collect()
}
