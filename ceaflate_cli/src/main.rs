use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use ceaflate_codecs::DeflateCodec;
use ceaflate_core::scheduler::hardware_parallelism;
use ceaflate_core::{compress_file, decompress_file, describe, PipelineOptions, CHUNK_SIZE};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "ceaflate",
    about = "Chunked parallel deflate: compress, decompress, and inspect containers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Concurrent chunk jobs (default: available parallelism)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,
    /// Log per-chunk scheduling detail
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a chunked container
    #[command(name = "c", visible_alias = "compress")]
    Compress {
        /// Source file
        input: PathBuf,
        /// Destination container
        output: PathBuf,
        /// Raw bytes per chunk (default: 131072 = 128 KB)
        #[arg(long, default_value_t = CHUNK_SIZE)]
        chunk_size: usize,
        /// Deflate level (0–9)
        #[arg(short, long, default_value_t = 9)]
        level: u32,
    },
    /// Decompress a container back to the original file
    #[command(name = "d", visible_alias = "decompress")]
    Decompress {
        /// Source container
        input: PathBuf,
        /// Destination file
        output: PathBuf,
    },
    /// Print the header and per-block offset table
    Inspect {
        /// Container to inspect
        file: PathBuf,
        /// Print per-block details
        #[arg(long)]
        blocks: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logger(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));
    let _ = builder.try_init();
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn pipeline_options(threads: Option<usize>) -> PipelineOptions {
    match threads {
        Some(n) => PipelineOptions::default().with_max_parallel(n),
        None => PipelineOptions::default(),
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    chunk_size: usize,
    level: u32,
    threads: Option<usize>,
) -> anyhow::Result<()> {
    let codec = DeflateCodec::new(level);
    let options = pipeline_options(threads).with_chunk_size(chunk_size);

    let t0 = Instant::now();
    let report = compress_file(&input, &output, &codec, &options)
        .with_context(|| format!("compressing {:?} into {:?}", input, output))?;
    let elapsed = t0.elapsed();

    println!("  raw size    : {}", human_bytes(report.bytes_in));
    println!("  compressed  : {}", human_bytes(report.bytes_out));
    println!("  ratio       : {:.2}x", report.ratio());
    println!(
        "  throughput  : {}/s",
        human_bytes((report.bytes_in as f64 / elapsed.as_secs_f64()) as u64)
    );
    println!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf, threads: Option<usize>) -> anyhow::Result<()> {
    let codec = DeflateCodec::default();
    let options = pipeline_options(threads);

    let t0 = Instant::now();
    let report = decompress_file(&input, &output, &codec, &options)
        .with_context(|| format!("decompressing {:?} into {:?}", input, output))?;
    let elapsed = t0.elapsed();

    println!("  raw size    : {}", human_bytes(report.bytes_out));
    println!(
        "  throughput  : {}/s",
        human_bytes((report.bytes_out as f64 / elapsed.as_secs_f64()) as u64)
    );
    println!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, show_blocks: bool) -> anyhow::Result<()> {
    let container =
        std::fs::read(&file).with_context(|| format!("reading container {:?}", file))?;
    let (header, blocks) =
        describe(&container).with_context(|| format!("parsing container {:?}", file))?;

    let raw_size: u64 = blocks.iter().map(|b| b.raw_len as u64).sum();
    let file_size = container.len() as u64;

    println!("=== Ceaflate container: {:?} ===", file);
    println!();
    println!("  block count    : {}", header.block_count());
    println!("  header size    : {}", human_bytes(header.byte_len() as u64));
    println!("  raw size       : {}", human_bytes(raw_size));
    println!("  file on disk   : {}", human_bytes(file_size));
    if file_size > 0 {
        println!("  ratio          : {:.2}x", raw_size as f64 / file_size as f64);
    }
    println!("  parallelism    : {}", hardware_parallelism());

    if show_blocks {
        println!();
        println!(
            "  {:>8}  {:>14}  {:>12}  {:>12}",
            "block", "file offset", "stored", "raw"
        );
        println!("  {}", "-".repeat(52));
        for b in &blocks {
            println!(
                "  {:>8}  {:>14}  {:>12}  {:>12}",
                b.index,
                b.offset,
                human_bytes(b.stored_len),
                human_bytes(b.raw_len as u64)
            );
        }
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Compress {
            input,
            output,
            chunk_size,
            level,
        } => run_compress(input, output, chunk_size, level, cli.threads),
        Commands::Decompress { input, output } => run_decompress(input, output, cli.threads),
        Commands::Inspect { file, blocks } => run_inspect(file, blocks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_mode_letters_parse() {
        let cli = Cli::try_parse_from(["ceaflate", "c", "in.bin", "out.cmap"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Compress { chunk_size: CHUNK_SIZE, level: 9, .. }
        ));

        let cli = Cli::try_parse_from(["ceaflate", "-j", "3", "d", "in.cmap", "out.bin"]).unwrap();
        assert_eq!(cli.threads, Some(3));
        assert!(matches!(cli.command, Commands::Decompress { .. }));

        let cli = Cli::try_parse_from(["ceaflate", "decompress", "a", "b"]).unwrap();
        assert!(matches!(cli.command, Commands::Decompress { .. }));
    }

    #[test]
    fn other_invocations_are_usage_errors() {
        assert!(Cli::try_parse_from(["ceaflate", "x", "a", "b"]).is_err());
        assert!(Cli::try_parse_from(["ceaflate", "c", "only-one"]).is_err());
        assert!(Cli::try_parse_from(["ceaflate"]).is_err());
    }

    #[test]
    fn human_bytes_scales_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(131_072), "128.00 KB");
    }
}
