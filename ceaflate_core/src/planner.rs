//! Turns an input buffer into chunk jobs.
//!
//! Compression slices the raw file into `chunk_size` pieces. Decompression
//! walks the container's offset table, reading each record's size prefix so
//! the output buffer can be allocated at its exact size up front.

use crate::codec::BlockCodec;
use crate::error::{CeaflateError, Result};
use crate::format::{read_size_prefix, ContainerHeader, MAX_BLOCKS, SIZE_PREFIX_LEN};
use crate::job::ChunkJob;

/// Upper bound on deflate's expansion ratio (a 258-byte match per ~2 bits).
///
/// A record claiming more output than this from the bytes that follow it
/// cannot be valid, so it is rejected before its buffer is allocated.
pub const MAX_INFLATE_RATIO: u64 = 1032;

/// Number of chunks `len` raw bytes split into. An empty input is still one
/// (empty) chunk, since a container must hold at least one block.
pub fn block_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size).max(1)
}

/// Build one compression job per `chunk_size` slice of `input`.
///
/// Fails with `TooManyBlocks` before allocating anything if the offset
/// table could not describe the result.
pub fn plan_compression<'a>(
    input: &'a [u8],
    chunk_size: usize,
    codec: &dyn BlockCodec,
) -> Result<Vec<ChunkJob<'a>>> {
    let count = block_count(input.len(), chunk_size);
    if count > MAX_BLOCKS {
        return Err(CeaflateError::TooManyBlocks(count));
    }

    if input.is_empty() {
        return Ok(vec![ChunkJob::for_compression(
            0,
            input,
            codec.max_compressed_len(0),
        )]);
    }

    Ok(input
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, chunk)| {
            ChunkJob::for_compression(index, chunk, codec.max_compressed_len(chunk.len()))
        })
        .collect())
}

/// Build one decompression job per block declared in `header`.
///
/// Each job's input runs from just past the record's size prefix to the end
/// of the container; the codec stops at the end of its own stream.
pub fn plan_decompression<'a>(
    container: &'a [u8],
    header: &ContainerHeader,
) -> Result<Vec<ChunkJob<'a>>> {
    let file_size = container.len() as u64;
    let mut jobs = Vec::with_capacity(header.block_count());

    for index in 0..header.block_count() {
        let offset = header.validate_offset(file_size, index)?;
        let raw_len = read_size_prefix(container, index, offset)?;

        let payload_start = offset as usize + SIZE_PREFIX_LEN;
        let input = &container[payload_start..];
        check_plausible(index, raw_len, input.len() as u64)?;

        jobs.push(ChunkJob::for_decompression(index, input, raw_len as usize));
    }

    Ok(jobs)
}

fn check_plausible(index: usize, declared: u32, available: u64) -> Result<()> {
    let limit = available
        .saturating_mul(MAX_INFLATE_RATIO)
        .saturating_add(64);
    if declared as u64 > limit {
        return Err(CeaflateError::ImplausibleChunkSize {
            index,
            declared,
            available,
        });
    }
    Ok(())
}

/// Location and sizes of one record inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub index: usize,
    /// Byte offset of the record (its size prefix) from the container start.
    pub offset: u32,
    /// Uncompressed length declared by the record's size prefix.
    pub raw_len: u32,
    /// Bytes between this record and the next one (or the end of file),
    /// size prefix included.
    pub stored_len: u64,
}

/// Parse and validate a container's header and list its records without
/// decompressing anything.
pub fn describe(container: &[u8]) -> Result<(ContainerHeader, Vec<BlockInfo>)> {
    let header = ContainerHeader::parse(container)?;
    let file_size = container.len() as u64;

    let mut blocks = Vec::with_capacity(header.block_count());
    for index in 0..header.block_count() {
        let offset = header.validate_offset(file_size, index)?;
        let raw_len = read_size_prefix(container, index, offset)?;
        let end = header
            .offsets()
            .get(index + 1)
            .map(|&next| next as u64)
            .filter(|&next| next >= offset as u64)
            .unwrap_or(file_size);
        blocks.push(BlockInfo {
            index,
            offset,
            raw_len,
            stored_len: end - offset as u64,
        });
    }

    Ok((header, blocks))
}
