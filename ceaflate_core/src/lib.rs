pub mod codec;
pub mod error;
pub mod files;
pub mod format;
pub mod job;
pub mod pipeline;
pub mod planner;
pub mod scheduler;

pub use codec::{BlockCodec, CodecError};
pub use error::{CeaflateError, Result};
pub use files::{compress_file, decompress_file, FileReport};
pub use format::{ContainerHeader, CHUNK_SIZE, MAX_BLOCKS};
pub use pipeline::{compress, decompress, PipelineOptions};
pub use planner::{describe, BlockInfo};
pub use scheduler::Scheduler;
