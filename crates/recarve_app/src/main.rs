//! Recarve - signature-based file recovery
//!
//! Carves PNG, JPEG, MP4 and MKV files (plus user-defined formats) out of raw
//! block devices and disk images.

mod device_discovery;
mod report;
mod signature_file;

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use device_discovery::discover_disks;
use recarve_core::groups::DEFAULT_FILES_PER_GROUP;
use recarve_core::reader::DEFAULT_BLOCK_SIZE;
use recarve_core::{
    BlockSource, CarveConfig, CarveSummary, CarvingEngine, Category, CoreError, EndMarker,
    GroupNaming, Selection, Signature, SignatureRegistry,
};
use recarve_io::{FsSink, Reader};
use report::Reporter;

#[derive(Parser, Debug)]
#[command(name = "recarve")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device node or image file to scan
    #[arg(short, long)]
    device: Option<String>,

    #[arg(short, long, default_value = "./recovered_files")]
    output: PathBuf,

    /// png, jpg, mp4, mkv, images, videos, all, or a custom signature name
    #[arg(short, long)]
    format: Option<Selection>,

    /// JSON file with extra signatures
    #[arg(long, value_name = "FILE")]
    signatures: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    #[arg(long, default_value_t = DEFAULT_FILES_PER_GROUP)]
    files_per_group: usize,

    /// Name groups group-0001, group-0002, ... instead of random ids
    #[arg(long, default_value_t = false)]
    sequential_groups: bool,

    /// Skip the confirmation prompt
    #[arg(short, long, default_value_t = false)]
    yes: bool,

    #[arg(long, default_value_t = false)]
    list_formats: bool,

    /// -v for info logs, -vv for debug
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn carve_config(&self) -> CarveConfig {
        CarveConfig {
            block_size: self.block_size,
            files_per_group: self.files_per_group,
            group_naming: if self.sequential_groups {
                GroupNaming::Sequential
            } else {
                GroupNaming::Random
            },
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let registry = load_registry(args.signatures.as_deref())?;
    if args.list_formats {
        print_formats(&registry);
        return Ok(());
    }

    let config = args.carve_config();
    config.validate()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let device = match &args.device {
        Some(path) => path.clone(),
        None => interactive_device_selection()?,
    };
    let device = if cfg!(windows) {
        device_discovery::raw_device_path(&device)
    } else {
        device
    };
    println!("\nSelected drive: {}", device);

    let selection = match &args.format {
        Some(selection) => selection.clone(),
        None => interactive_format_selection()?,
    };
    let signatures = registry.signatures_for(&selection)?;

    if !args.yes && !confirm(&device, &args.output)? {
        println!("Aborted.");
        return Ok(());
    }

    println!("\nStarting recovery... Press Ctrl+C to stop");

    match recover(&device, &args.output, config, &signatures, &running) {
        Ok(_) => Ok(()),
        Err(err) => {
            if let Some(hint) = hint(&err) {
                eprintln!("\nError: {}", hint);
            }
            Err(err)
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_registry(extra: Option<&Path>) -> Result<SignatureRegistry> {
    let mut registry = SignatureRegistry::builtin();
    if let Some(path) = extra {
        let signatures = signature_file::load(path)?;
        tracing::info!(count = signatures.len(), path = %path.display(), "loaded signatures");
        registry
            .extend(signatures)
            .with_context(|| format!("Cannot register signatures from {}", path.display()))?;
    }
    Ok(registry)
}

fn recover(
    device: &str,
    output: &Path,
    config: CarveConfig,
    signatures: &[&Signature],
    running: &AtomicBool,
) -> Result<CarveSummary> {
    let mut reader =
        Reader::open(device).with_context(|| format!("Failed to open device: {}", device))?;
    tracing::info!(device, size = reader.size(), mmap = reader.is_mmap(), "source opened");

    let sink = FsSink::create(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;
    let mut engine = CarvingEngine::new(config, output, sink)?;
    let mut reporter = Reporter::new()?;

    let started = Instant::now();
    let result = engine.run(&mut reader, signatures, running, &mut |event| {
        reporter.handle(event)
    });
    reporter.clear();

    match result {
        Ok(summary) => {
            report::print_summary(&summary, &reporter, reader.size(), output, started.elapsed());
            Ok(summary)
        }
        Err(err) => {
            report::print_partial(engine.files_recovered(), output);
            Err(err).context("Recovery failed")
        }
    }
}

/// User-facing advice for the failures a wrong device path or missing
/// privileges produce.
fn hint(err: &anyhow::Error) -> Option<&'static str> {
    match err.downcast_ref::<CoreError>()? {
        CoreError::PermissionDenied(_) => {
            Some("Permission denied. Try running as root (administrator on Windows).")
        }
        CoreError::NotFound(_) if cfg!(windows) => Some(
            "Drive not found. On Windows, use a path like \\\\.\\PhysicalDrive0 or \\\\.\\C:",
        ),
        CoreError::NotFound(_) => {
            Some("Drive not found. Make sure you're using the correct path.")
        }
        _ => None,
    }
}

fn interactive_device_selection() -> Result<String> {
    println!("🔍 Discovering block devices...\n");

    let disks = discover_disks().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "device discovery unavailable");
        Vec::new()
    });

    if disks.is_empty() {
        let path: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Device or image path")
            .interact_text()
            .context("Failed to read device path")?;
        return Ok(path);
    }

    println!("📀 Available drives:\n");
    println!("{:<12} {:<15} {:>12} PATH", "NAME", "TYPE", "SIZE");
    println!("{}", "-".repeat(55));
    for disk in &disks {
        println!(
            "{:<12} {:<15} {:>12} {}",
            disk.name,
            disk.device_type,
            disk.human_size(),
            disk.path
        );
    }
    println!();

    let items: Vec<String> = disks.iter().map(|d| d.display()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select drive")
        .items(&items)
        .default(0)
        .interact()
        .context("Failed to show interactive selection")?;

    Ok(disks[selection].path.clone())
}

const RECOVERY_TYPES: [&str; 4] = [
    "PNG images",
    "JPG/JPEG images",
    "Videos (MP4, MKV)",
    "All supported types",
];

fn recovery_type(index: usize) -> Selection {
    match index {
        0 => Selection::Format("png".to_string()),
        1 => Selection::Format("jpg".to_string()),
        2 => Selection::Category(Category::Videos),
        _ => Selection::All,
    }
}

fn interactive_format_selection() -> Result<Selection> {
    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select recovery type")
        .items(&RECOVERY_TYPES)
        .default(3)
        .interact()
        .context("Failed to show recovery type selection")?;
    Ok(recovery_type(index))
}

fn confirm(device: &str, output: &Path) -> Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Scan {} and write recovered files to {}?",
            device,
            output.display()
        ))
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

fn print_formats(registry: &SignatureRegistry) {
    println!("{:<8} {:<6} {:<8} {:<26} END", "NAME", "EXT", "CATEGORY", "HEADER");
    println!("{}", "-".repeat(72));
    for signature in registry.iter() {
        let end = match signature.end() {
            EndMarker::Footer {
                bytes,
                inclusive_len,
            } => format!("{} (+{})", hex::encode_upper(bytes), inclusive_len - bytes.len()),
            EndMarker::NextHeader => "next header".to_string(),
        };
        println!(
            "{:<8} {:<6} {:<8} {:<26} {}",
            signature.name(),
            signature.extension(),
            signature.category().name(),
            hex::encode_upper(signature.header()),
            end
        );
    }
}
