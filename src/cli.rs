//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    progmem_core::config::parse_number(s)
}

/// Parse a `key=value` driver option
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("Invalid option format: '{}' (expected key=value)", s))
}

#[derive(Parser)]
#[command(name = "progmem")]
#[command(author, version, about = "S32K1xx on-chip flash tool (emulated controller)", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Flash image backing the emulated controller (created erased if missing)
    #[arg(long, global = true, default_value = "progmem.bin")]
    pub image: PathBuf,

    /// Geometry file (TOML format); defaults to the S32K1xx data flash
    #[arg(long, global = true)]
    pub geometry: Option<PathBuf>,

    /// Driver option (key=value, repeatable), e.g. -o verify_write=on
    #[arg(short = 'o', long = "option", global = true, value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show flash geometry and image status
    Info,

    /// Disable the data flash cache and partition FlexNVM
    Init,

    /// Erase one or more blocks
    Erase {
        /// First block to erase
        block: u32,

        /// Number of consecutive blocks
        #[arg(long, default_value = "1")]
        count: u32,
    },

    /// Report how many bytes of a page are not erased
    Check {
        /// Page index
        page: u32,
    },

    /// Program a file into flash (target must be erased)
    Write {
        /// Start address (absolute or base-relative, hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Input file path; its length must be a multiple of the write unit
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Read flash contents to a file
    Read {
        /// Start address (absolute or base-relative, hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Number of bytes to read (default: to the end of the region)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

impl Commands {
    /// Whether the command changes flash contents
    pub fn mutates(&self) -> bool {
        matches!(self, Self::Erase { .. } | Self::Write { .. })
    }
}
