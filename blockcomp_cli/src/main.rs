use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blockcomp_codecs::builtin_registry;
use blockcomp_core::defaults::{attributes_from_options, split_storage_options};
use blockcomp_core::{
    default_attributes, validate, Registry, SegmentReader, SegmentWriter, StorageAttributes, TupleDesc, TypeId,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "blockcomp",
    about = "Validate storage attributes and compress, scan, and inspect column segment files",
    version
)]
struct Cli {
    /// JSON file of extra compression rows to register after the built-ins
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    /// Log more (-v info, -vv debug). BLOCKCOMP_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

/// Storage attribute flags shared by the commands that take them.
#[derive(clap::Args)]
struct AttrArgs {
    /// Registered compression type
    #[arg(short = 't', long, default_value_t = default_attributes().comptype)]
    compresstype: String,
    /// Compression level (0 = algorithm default)
    #[arg(short = 'l', long, default_value_t = 0, allow_negative_numbers = true)]
    compresslevel: i32,
    /// Raw bytes per block
    #[arg(short, long, default_value_t = default_attributes().blocksize)]
    blocksize: usize,
    /// Column type name (int4, int8, text, ...) or numeric type id
    #[arg(long = "type", default_value = "bytea")]
    type_name: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered compression algorithms
    List,
    /// Check a compresstype / compresslevel / blocksize / type combination
    Validate {
        #[command(flatten)]
        attrs: AttrArgs,
    },
    /// Resolve `key=value` table options into storage attributes
    Options {
        /// Options such as compresstype=zlib appendonly=true
        options: Vec<String>,
        /// Column type name or numeric type id
        #[arg(long = "type", default_value = "bytea")]
        type_name: String,
    },
    /// Compress a file into a column segment
    Compress {
        /// Source file to compress ("-" reads stdin)
        input: PathBuf,
        /// Destination segment file
        output: PathBuf,
        #[command(flatten)]
        attrs: AttrArgs,
    },
    /// Fully decompress a column segment back to raw bytes
    Decompress {
        /// Source segment file
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
    },
    /// Print header metadata and block index statistics
    Inspect {
        /// Segment file to inspect
        file: PathBuf,
        /// Print per-block details
        #[arg(long)]
        blocks: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("BLOCKCOMP_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_registry(catalog: Option<&Path>) -> anyhow::Result<Registry> {
    let mut registry = builtin_registry().context("seeding built-in compression algorithms")?;
    if let Some(path) = catalog {
        let json = std::fs::read_to_string(path).with_context(|| format!("reading catalog {:?}", path))?;
        let added = registry
            .register_json(&json)
            .with_context(|| format!("registering rows from {:?}", path))?;
        info!(count = added.len(), path = %path.display(), "registered catalog rows");
    }
    Ok(registry)
}

fn parse_type(name: &str) -> anyhow::Result<TypeId> {
    if let Some(typid) = TypeId::from_name(name) {
        return Ok(typid);
    }
    name.parse::<u32>()
        .map(TypeId)
        .map_err(|_| anyhow::anyhow!("unknown column type '{}'", name))
}

impl AttrArgs {
    fn to_attributes(&self) -> anyhow::Result<StorageAttributes> {
        Ok(StorageAttributes::new(
            self.compresstype.clone(),
            self.compresslevel,
            self.blocksize,
            parse_type(&self.type_name)?,
        ))
    }
}

fn describe(attrs: &StorageAttributes) -> String {
    format!(
        "compresstype={} compresslevel={} blocksize={} type={}",
        attrs.comptype, attrs.complevel, attrs.blocksize, attrs.typid
    )
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

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_list(registry: &Registry) -> anyhow::Result<()> {
    println!(
        "  {:<12}  {:<28}  {:>6}",
        "name", "provider", "owner"
    );
    println!("  {}", "-".repeat(50));
    for row in registry.rows() {
        let entry = registry.lookup(&row.compname)?;
        println!(
            "  {:<12}  {:<28}  {:>6}",
            row.compname,
            entry.algorithm().provider(),
            row.compowner
        );
    }
    Ok(())
}

fn run_validate(registry: &Registry, args: &AttrArgs) -> anyhow::Result<()> {
    let attrs = args.to_attributes()?;
    validate(registry, &attrs)?;
    println!("ok: {}", describe(&attrs));
    Ok(())
}

fn run_options(registry: &Registry, options: &[String], type_name: &str) -> anyhow::Result<()> {
    let pairs = options
        .iter()
        .map(|opt| {
            opt.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| anyhow::anyhow!("option '{}' is not of the form key=value", opt))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let (storage, other) = split_storage_options(pairs);
    for (key, value) in &other {
        println!("  table option    : {}={}", key, value);
    }
    let attrs = attributes_from_options(storage, parse_type(type_name)?)?;
    validate(registry, &attrs)?;
    println!("  storage encoding: {}", describe(&attrs));
    Ok(())
}

fn run_compress(registry: &Registry, input: PathBuf, output: PathBuf, args: &AttrArgs) -> anyhow::Result<()> {
    let attrs = args.to_attributes()?;
    validate(registry, &attrs)?;

    let blocksize = attrs.blocksize;
    let tupdesc = TupleDesc::single("column", attrs.typid);
    let mut writer = SegmentWriter::create(&output, registry, &tupdesc, attrs.clone())
        .with_context(|| format!("creating output file {:?}", output))?;

    let mut src: Box<dyn Read> = if input.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(&input).with_context(|| format!("opening input file {:?}", input))?,
        ))
    };

    let t0 = Instant::now();
    let mut bytes_read = 0u64;
    let mut buf = vec![0u8; blocksize];
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write(&buf[..n])?;
        bytes_read += n as u64;
    }

    let block_count = writer.finish()?;
    let elapsed = t0.elapsed();

    let compressed_size = std::fs::metadata(&output)?.len();
    let ratio = bytes_read as f64 / compressed_size.max(1) as f64;

    eprintln!("  encoding    : {}", describe(&attrs));
    eprintln!("  block size  : {}", human_bytes(blocksize as u64));
    eprintln!("  blocks      : {}", block_count);
    eprintln!("  raw size    : {}", human_bytes(bytes_read));
    eprintln!("  compressed  : {}", human_bytes(compressed_size));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((bytes_read as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn open_segment(registry: &Registry, path: &Path) -> anyhow::Result<SegmentReader> {
    let header = SegmentReader::read_header(path)?;
    let tupdesc = TupleDesc::single("column", header.attrs.typid);
    SegmentReader::open(path, registry, &tupdesc)
}

fn run_decompress(registry: &Registry, input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let mut reader = open_segment(registry, &input)?;

    let mut dst: Box<dyn Write> = if output.to_str() == Some("-") {
        Box::new(io::stdout())
    } else {
        Box::new(
            File::create(&output).with_context(|| format!("creating output file {:?}", output))?,
        )
    };

    let t0 = Instant::now();
    let block_count = reader.block_count();
    let mut total_raw = 0u64;

    for idx in 0..block_count {
        let block = reader.read_block(idx)?;
        total_raw += block.len() as u64;
        dst.write_all(&block)?;
    }
    dst.flush()?;

    let elapsed = t0.elapsed();
    eprintln!("  blocks      : {}", block_count);
    eprintln!("  raw size    : {}", human_bytes(total_raw));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((total_raw as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(registry: &Registry, file: PathBuf, show_blocks: bool) -> anyhow::Result<()> {
    let reader = open_segment(registry, &file)?;
    let header = reader.header();
    let file_size = std::fs::metadata(&file)?.len();

    println!("=== Column segment: {:?} ===", file);
    println!();
    println!("  format version : {}", header.version);
    println!("  compresstype   : {}", header.attrs.comptype);
    println!("  compresslevel  : {}", header.attrs.complevel);
    println!("  column type    : {}", header.attrs.typid);
    println!("  block size     : {}", human_bytes(reader.blocksize() as u64));
    println!("  block count    : {}", reader.block_count());
    println!("  raw size       : {}", human_bytes(reader.raw_size()));
    println!("  stored         : {}", human_bytes(reader.stored_size()));
    println!("  file on disk   : {}", human_bytes(file_size));
    println!("  ratio          : {:.2}x", reader.ratio());
    println!("  flags          : 0x{:016x}", header.flags);

    if show_blocks {
        println!();
        println!(
            "  {:>8}  {:>14}  {:>12}  {:>12}  {:>16}  {:>4}",
            "block", "file offset", "stored", "raw", "checksum", "raw?"
        );
        println!("  {}", "-".repeat(74));
        for (i, e) in reader.entries().iter().enumerate() {
            println!(
                "  {:>8}  {:>14}  {:>12}  {:>12}  {:016x}  {:>4}",
                i,
                e.offset,
                human_bytes(e.stored_len as u64),
                human_bytes(e.raw_len as u64),
                e.checksum,
                if e.is_stored_raw() { "yes" } else { "" }
            );
        }
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let registry = load_registry(cli.catalog.as_deref())?;

    match cli.command {
        Commands::List => run_list(&registry),
        Commands::Validate { attrs } => run_validate(&registry, &attrs),
        Commands::Options { options, type_name } => run_options(&registry, &options, &type_name),
        Commands::Compress { input, output, attrs } => run_compress(&registry, input, output, &attrs),
        Commands::Decompress { input, output } => run_decompress(&registry, input, output),
        Commands::Inspect { file, blocks } => run_inspect(&registry, file, blocks),
    }
}
