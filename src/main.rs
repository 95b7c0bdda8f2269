//! simos - Loads a program as the init process and translates addresses
//!
//! Usage: simos [OPTIONS] <PROGRAM> <INPUT> <OUTPUT>
//!
//! Every whitespace-separated virtual address in INPUT is translated inside
//! the init process's address space, faulting pages in on demand. OUTPUT
//! receives the physical addresses separated by spaces, -1 for addresses
//! outside the address space.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use simos::io::{ProgramSource, read_virtual_addresses, to_output, write_results};
use simos::{Config, Kernel};

/// Demand-paging OS simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Program to boot as the init process
    program: PathBuf,

    /// File containing virtual addresses (space-separated)
    input: PathBuf,

    /// Output file for physical addresses
    output: PathBuf,

    /// JSON file with boot parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cells per page
    #[arg(long)]
    page_size: Option<usize>,

    /// Frames of main memory
    #[arg(long)]
    frames: Option<usize>,

    /// Pages per address space
    #[arg(long)]
    address_space: Option<usize>,

    /// Slots in the backing store
    #[arg(long)]
    swap_capacity: Option<usize>,

    /// Log page faults, evictions and scheduling
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Merge the config file with the command-line overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(page_size) = args.page_size {
        // keep the frame count when only the page size changes
        let frames = config.frame_count();
        config.page_size = page_size;
        config = config.with_frames(frames)?;
    }
    if let Some(frames) = args.frames {
        config = config.with_frames(frames)?;
    }
    if let Some(pages) = args.address_space {
        config.address_space_size = pages;
    }
    if let Some(slots) = args.swap_capacity {
        config.swap_capacity = slots;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    debug!("boot parameters: {:?}", config);

    let source = ProgramSource::from_file(&args.program)?;
    let mut kernel = Kernel::new(config)?;
    let pid = kernel
        .boot(&source)
        .with_context(|| format!("Failed to boot {}", args.program.display()))?;

    let addresses = read_virtual_addresses(&args.input)?;
    let results: Vec<i64> = addresses
        .iter()
        .map(|address| {
            let result = kernel.resolve(address);
            match &result {
                Ok(pa) => debug!("VA {} -> PA {}", address, pa),
                Err(e) => debug!("VA {} -> {}", address, e),
            }
            to_output(&result)
        })
        .collect();

    write_results(&args.output, &results)?;

    let failures = results.iter().filter(|&&r| r < 0).count();
    info!(
        "process {}: {} addresses translated, {} access violations, {} pages swapped",
        pid,
        results.len() - failures,
        failures,
        kernel.mmu().manager().swap().in_use()
    );

    kernel.shutdown();
    Ok(())
}
