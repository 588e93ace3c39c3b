use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use nrfdump_core::DEFAULT_GADGET_FILE;

use crate::hex_utils::parse_hex_address;

#[derive(Parser)]
#[command(name = "nrfdump", version)]
#[command(about = "Dump memory of read-back protected nRF51 chips through OpenOCD")]
pub struct Cli {
    /// Config file (TOML)
    #[arg(short, long, env = "NRFDUMP_CONFIG")]
    pub config: Option<PathBuf>,

    /// OpenOCD host
    #[arg(long, env = "NRFDUMP_HOST", global = true)]
    pub host: Option<String>,

    /// OpenOCD telnet port
    #[arg(long, env = "NRFDUMP_PORT", global = true)]
    pub port: Option<u16>,

    /// Delay between command and response read in ms (0: wait for prompt only)
    #[arg(long, global = true)]
    pub settle_ms: Option<u64>,

    /// Give up on a response after this many seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Log every scanned address and dumped word
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Read the known marker word
    Marker {
        /// Marker address (hex)
        #[arg(long, value_parser = parse_hex_address)]
        address: Option<u32>,
    },

    /// Find a usable instruction and its registers, then save them
    Find {
        #[command(flatten)]
        search: SearchArgs,
    },

    /// Dump memory through a saved or freshly found instruction
    Dump {
        #[command(flatten)]
        search: SearchArgs,

        /// First address (hex)
        #[arg(long, default_value = "0x0", value_parser = parse_hex_address)]
        from: u32,

        /// Last address, inclusive (hex)
        #[arg(long, default_value = "0x40000", value_parser = parse_hex_address)]
        to: u32,

        /// Output file; words are printed to stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Continue an interrupted dump from <output>.part
        #[arg(long, requires = "output")]
        resume: bool,

        /// Ignore the gadget file and search again
        #[arg(long)]
        rescan: bool,
    },
}

#[derive(Args)]
pub struct SearchArgs {
    /// Where the discovered instruction is stored
    #[arg(long, default_value = DEFAULT_GADGET_FILE)]
    pub gadget_file: PathBuf,

    /// Marker address (hex)
    #[arg(long, value_parser = parse_hex_address)]
    pub marker_address: Option<u32>,

    /// Bytes to scan past the reset pc (hex)
    #[arg(long, value_parser = parse_hex_address)]
    pub scan_window: Option<u32>,

    /// Last instruction address to scan (hex); overrides --scan-window
    #[arg(long, value_parser = parse_hex_address)]
    pub scan_end: Option<u32>,
}
