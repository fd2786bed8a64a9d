//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal offset/length
fn parse_hex_usize(s: &str) -> Result<usize, String> {
    vfsdev_registry::parse_number(s)
}

#[derive(Parser)]
#[command(name = "vfsdev")]
#[command(author, version, about = "Storage device layer over simulated NOR flash", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Flash family (stm32f4-512k, stm32f4-1m, stm32f4-1536k, stm32f4-2m-dual,
    /// stm32f7-1m, stm32l4-<KiB>k, stm32l4-<KiB>k-sb)
    #[arg(short, long, default_value = "stm32f4-1m")]
    pub family: String,

    /// Flash image backing the simulated controller (created if missing)
    #[arg(short, long)]
    pub image: PathBuf,

    /// Device configuration (TOML). Without it a single device named
    /// "flash" covers the whole part.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered devices
    List,

    /// Show device and flash family information
    Info {
        /// Device name
        device: String,
    },

    /// Read from a device
    Read {
        /// Device name
        device: String,

        /// Offset within the device (hex or decimal)
        #[arg(value_parser = parse_hex_usize)]
        offset: usize,

        /// Number of bytes (hex or decimal)
        #[arg(value_parser = parse_hex_usize)]
        len: usize,

        /// Output file (hex dump to stdout if not given)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a file to a device (target must be erased)
    Write {
        /// Device name
        device: String,

        /// Offset within the device (hex or decimal)
        #[arg(value_parser = parse_hex_usize)]
        offset: usize,

        /// Input file
        input: PathBuf,
    },

    /// Erase a range within one sector
    Erase {
        /// Device name
        device: String,

        /// Offset within the device (hex or decimal)
        #[arg(value_parser = parse_hex_usize)]
        offset: usize,

        /// Number of bytes (hex or decimal)
        #[arg(value_parser = parse_hex_usize)]
        len: usize,
    },

    /// Check whether a range is erased
    Check {
        /// Device name
        device: String,

        /// Offset within the device (hex or decimal)
        #[arg(value_parser = parse_hex_usize)]
        offset: usize,

        /// Number of bytes (hex or decimal)
        #[arg(value_parser = parse_hex_usize)]
        len: usize,
    },
}

impl Commands {
    /// True if the command may change flash contents
    pub fn mutates(&self) -> bool {
        matches!(self, Self::Write { .. } | Self::Erase { .. })
    }
}
