//! progmem - S32K1xx on-chip flash tool
//!
//! Runs the FTFC driver against an emulated controller whose flash contents
//! live in an image file. Every driver operation is reachable from the
//! command line:
//!
//! - `info` - geometry and erase status
//! - `init` - cache disable and FlexNVM partitioning
//! - `erase` / `check` - block erase and erased-page check
//! - `write` / `read` - programming and read-back
//!
//! Driver behavior is tuned with `-o key=value` options (`verify_erase`,
//! `verify_write`, `verify_policy`, `margin`, `poll_limit`,
//! `poll_interval_us`).

mod cli;
mod commands;
mod image;

use clap::Parser;
use cli::{Cli, Commands};
use image::FlashHandle;
use progmem_core::FlashGeometry;
use progmem_ftfc::ProgmemOptions;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let geometry = match &cli.geometry {
        Some(path) => progmem_core::config::load_geometry(path)?,
        None => FlashGeometry::default(),
    };
    log::debug!("Using geometry {:?}", geometry);

    let pairs: Vec<(&str, &str)> = cli
        .options
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let options = ProgmemOptions::from_options(&pairs)?;

    let mut handle = FlashHandle::open(&cli.image, geometry, options)?;
    log::info!("Using image {}", handle.path().display());

    let device = &mut handle.device;
    let result = match cli.command {
        Commands::Info => commands::run_info(device),
        Commands::Init => commands::run_init(device),
        Commands::Erase { block, count } => commands::run_erase(device, block, count),
        Commands::Check { page } => commands::run_check(device, page),
        Commands::Write { addr, ref input } => commands::run_write(device, addr, input),
        Commands::Read {
            addr,
            length,
            ref output,
        } => commands::run_read(device, addr, length, output),
    };

    // Keep whatever reached flash, even when a later step failed
    if cli.command.mutates() {
        handle.save()?;
    }

    result
}
