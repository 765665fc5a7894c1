//! CLI argument parsing for nvsniff

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{resolve_dump_path, EnforceMode};

/// Output format for the unsupported-call report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "nvsniff")]
#[command(version)]
#[command(about = "Classify captured NVIDIA ioctl streams and report unsupported calls", long_about = None)]
pub struct Cli {
    /// Enable debug logging to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process captured ioctl streams and report unsupported calls
    Parse(ParseArgs),

    /// Split a dump file into de-duplicated seed files
    ExtractSeeds {
        /// Dump file written by `parse --dump-file`
        dump: PathBuf,
        /// Directory for the seeds; its name prefixes every seed file
        out_dir: PathBuf,
    },

    /// Print the header and leading payload bytes of a seed file
    InspectSeed {
        /// Seed file to inspect
        seed: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Captured streams to read, in order ("-" or none for stdin)
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Append pre-call control/alloc payloads to this file
    /// [env: IOCTL_DUMP_FILE, GVISOR_IOCTL_DUMP_FILE]
    #[arg(long = "dump-file", value_name = "PATH")]
    pub dump_file: Option<PathBuf>,

    /// What to do about unsupported calls [default: off]
    /// [env: IOCTL_SNIFFER_ENFORCE_COMPATIBILITY, GVISOR_IOCTL_SNIFFER_ENFORCE_COMPATIBILITY]
    #[arg(long = "enforce", value_enum, ignore_case = true)]
    pub enforce: Option<EnforceMode>,

    /// TOML file listing supported subcategories per category
    #[arg(long = "supported", value_name = "FILE")]
    pub supported: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Include record counters in the report
    #[arg(long = "stats")]
    pub stats: bool,
}

impl ParseArgs {
    /// `--enforce`, else the enforce environment variables
    pub fn enforce_mode(&self) -> EnforceMode {
        EnforceMode::resolve(self.enforce, |name| std::env::var(name).ok())
    }

    /// `--dump-file`, else the dump environment variables
    pub fn dump_path(&self) -> Option<PathBuf> {
        resolve_dump_path(self.dump_file.clone(), |name| std::env::var(name).ok())
    }
}
