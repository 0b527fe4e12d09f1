//! Whole-file wrappers around the in-memory pipeline.
//!
//! The input is read completely, processed completely, and only then is the
//! output written, through a temporary file renamed into place, so a failed
//! run never leaves a partial output file behind.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::codec::BlockCodec;
use crate::error::Result;
use crate::pipeline::{compress, decompress, PipelineOptions};

/// Byte counts of a finished file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileReport {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl FileReport {
    /// Raw size over compressed size, whichever direction the run went.
    pub fn ratio(&self) -> f64 {
        let (raw, packed) = if self.bytes_in >= self.bytes_out {
            (self.bytes_in, self.bytes_out)
        } else {
            (self.bytes_out, self.bytes_in)
        };
        if packed == 0 {
            return 1.0;
        }
        raw as f64 / packed as f64
    }
}

pub fn compress_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    codec: &dyn BlockCodec,
    options: &PipelineOptions,
) -> Result<FileReport> {
    let raw = fs::read(input)?;
    let container = compress(&raw, codec, options)?;
    write_atomically(output.as_ref(), &container)?;
    Ok(FileReport {
        bytes_in: raw.len() as u64,
        bytes_out: container.len() as u64,
    })
}

pub fn decompress_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    codec: &dyn BlockCodec,
    options: &PipelineOptions,
) -> Result<FileReport> {
    let container = fs::read(input)?;
    let raw = decompress(&container, codec, options)?;
    write_atomically(output.as_ref(), &raw)?;
    Ok(FileReport {
        bytes_in: container.len() as u64,
        bytes_out: raw.len() as u64,
    })
}

/// Write `bytes` to a sibling temporary file, then rename it over `path`.
///
/// An existing file at `path` is only replaced once the new contents are
/// fully on disk. On failure the temporary file is removed.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let staging = staging_path(path);
    let result = fs::File::create(&staging)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&staging, path));
    if let Err(err) = result {
        log::error!("failed to write {}: {}", path.display(), err);
        let _ = fs::remove_file(&staging);
        return Err(err.into());
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".partial");
    path.with_file_name(name)
}
