//! ecarchive command-line tool
//!
//! ```text
//! ecarchive split -b liberasurecode_rs_vand -k 4 -m 2 data.bin   # data.bin#0 .. data.bin#5
//! ecarchive join -k 4 data.bin#1 data.bin#3 data.bin#4 data.bin#5 > restored.bin
//! ecarchive info data.bin#0
//! ecarchive backends
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ecarchive::ec::{self, catalog, ArchiveSummary, Backend, ChecksumType, FragmentReader, FragmentWriter, Params};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Split files into erasure-coded fragment archives and join them back
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a file into K + M fragment archives named FILE#0 .. FILE#{K+M-1}
    Split(SplitArgs),
    /// Decode fragment archives back to the original content on stdout
    Join(JoinArgs),
    /// Print information about fragment archives
    Info(InfoArgs),
    /// List the known erasure coding backends
    Backends,
}

#[derive(clap::Args, Debug)]
struct SplitArgs {
    /// The backend to use
    #[arg(short = 'b', long = "backend", env = "EC_BACKEND")]
    backend: String,

    /// Number of data fragments
    #[arg(short = 'k', long = "data")]
    k: usize,

    /// Number of parity fragments
    #[arg(short = 'm', long = "parity", default_value_t = 0)]
    m: usize,

    /// Word size, in bits
    #[arg(short = 'w', long = "word-size", default_value_t = 0)]
    w: u32,

    /// Hamming distance, for flat_xor_hd
    #[arg(short = 'd', long = "hamming-distance", default_value_t = 0)]
    hd: u32,

    /// Chunk size, in bytes
    #[arg(short = 's', long = "chunk-size", default_value_t = 1 << 20)]
    chunk_size: usize,

    /// Data checksum written into every fragment (none, crc32)
    #[arg(long, default_value = "crc32")]
    checksum: ChecksumType,

    /// File to split
    file: PathBuf,
}

#[derive(clap::Args, Debug)]
struct JoinArgs {
    /// Number of data fragments
    #[arg(short = 'k', long = "data")]
    k: usize,

    /// Fragment archives to decode
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct InfoArgs {
    /// Print one JSON object per file
    #[arg(long)]
    json: bool,

    /// Fragment archives to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    match &args.command {
        Command::Split(split_args) => split(split_args),
        Command::Join(join_args) => join(join_args),
        Command::Info(info_args) => inspect(info_args),
        Command::Backends => list_backends(),
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout carries joined data, so logs go to stderr
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }
}

// =============================================================================
// Split
// =============================================================================

fn split(args: &SplitArgs) -> Result<()> {
    if !catalog::is_available(&args.backend) {
        bail!(
            "backend must be one of {:?}",
            catalog::available_backends()
        );
    }
    if args.m == 0 && args.backend != "null" {
        bail!("missing required flag -m");
    }

    let params = Params::new(&args.backend, args.k, args.m)
        .with_word_size(args.w)
        .with_hamming_distance(args.hd)
        .with_checksum(args.checksum);
    info!(
        "Splitting {} with {} (k={}, m={})",
        args.file.display(),
        params.name,
        params.k,
        params.m
    );

    let mut backend = Backend::open(params)
        .with_context(|| format!("failed to open backend {}", args.backend))?;

    let mut input = File::open(&args.file)
        .with_context(|| format!("failed to open {}", args.file.display()))?;
    let mode = file_mode(&input)?;

    let copied = {
        let mut writer = backend.file_writer(&args.file, mode)?;
        let copied = copy_in_chunks(&mut input, &mut writer, args.chunk_size)?;
        writer.close()?;
        copied
    };
    backend.close()?;

    println!("{} bytes copied", copied);
    Ok(())
}

#[cfg(unix)]
fn file_mode(file: &File) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(file.metadata()?.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(_file: &File) -> Result<u32> {
    Ok(0o644)
}

/// Feed `input` to `writer` in pieces of exactly `chunk_size` bytes (the
/// last one may be shorter).
fn copy_in_chunks<R: Read, W: Write>(
    input: &mut R,
    writer: &mut FragmentWriter<'_, W>,
    chunk_size: usize,
) -> Result<u64> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut copied = 0u64;

    loop {
        let mut filled = 0;
        while filled < buf.len() {
            match input.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled > 0 {
            writer.write_chunk(&buf[..filled])?;
            copied += filled as u64;
            debug!("Wrote chunk of {} bytes ({} total)", filled, copied);
        }
        if filled < buf.len() {
            return Ok(copied);
        }
    }
}

// =============================================================================
// Join
// =============================================================================

fn join(args: &JoinArgs) -> Result<()> {
    let mut files = args
        .files
        .iter()
        .map(|path| File::open(path).with_context(|| format!("failed to open {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    let inferred = ec::infer_params(&mut files).context("failed to infer coding parameters")?;
    for file in &mut files {
        file.seek(SeekFrom::Start(0))?;
    }

    let params = inferred.split_total(args.k)?;
    info!(
        "Joining {} archives with {} (k={}, m={})",
        files.len(),
        params.name,
        params.k,
        params.m
    );

    let mut backend = Backend::open(params)?;
    let copied = {
        let mut reader = FragmentReader::new(&backend, files)?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let copied = io::copy(&mut reader, &mut out).map_err(ecarchive::error::unwrap_io)?;
        out.flush()?;
        reader.close()?;
        copied
    };
    backend.close()?;

    eprintln!("{} bytes copied", copied);
    Ok(())
}

// =============================================================================
// Info
// =============================================================================

#[derive(Serialize)]
struct FileReport<'a> {
    file: &'a Path,
    #[serde(flatten)]
    summary: &'a ArchiveSummary,
}

fn inspect(args: &InfoArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut unreadable = 0;

    for path in &args.files {
        let summary = match ec::inspect_file(path) {
            Ok(summary) => summary,
            Err(e) => {
                writeln!(out, "Error opening {:?}: {}", path, e)?;
                unreadable += 1;
                continue;
            }
        };

        if args.json {
            serde_json::to_writer(&mut out, &FileReport { file: path, summary: &summary })?;
            writeln!(out)?;
        } else {
            print_summary(&mut out, path, &summary)?;
        }
    }

    if unreadable > 0 {
        bail!("{} of {} files could not be opened", unreadable, args.files.len());
    }
    Ok(())
}

fn print_summary(out: &mut impl Write, path: &Path, summary: &ArchiveSummary) -> io::Result<()> {
    writeln!(out, "Inspecting {:?}:", path)?;
    if let Some(first) = &summary.first {
        writeln!(
            out,
            "    Index: {:2} FragSize: {:5} Backend: {}/{} libec/{}",
            first.index, first.size, first.backend_name, first.backend_version, first.libec_version
        )?;
    }
    for anomaly in &summary.anomalies {
        writeln!(out, "    {}", anomaly)?;
    }
    match &summary.error {
        None => writeln!(
            out,
            "    Found {} fragments, totaling {} bytes (original file was {} bytes)\n",
            summary.fragments, summary.bytes, summary.orig_data_size
        ),
        Some(error) => {
            writeln!(out, "    {}", error)?;
            writeln!(
                out,
                "    Found {} fragments, totaling {} bytes before aborting\n",
                summary.fragments, summary.bytes
            )
        }
    }
}

// =============================================================================
// Backends
// =============================================================================

fn list_backends() -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for entry in catalog::entries() {
        let status = if entry.is_available() {
            "available"
        } else {
            "not available"
        };
        writeln!(out, "{:>3}  {:<24} {}", entry.id, entry.name, status)?;
    }
    Ok(())
}
