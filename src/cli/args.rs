//! Command line argument parsing for the stringsubs CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::definition::PropertyType;

/// stringsubs - streaming token substitution for configuration files
#[derive(Parser, Debug, Clone)]
#[command(name = "stringsubs")]
#[command(about = "Streaming token substitution for configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct StringsubsArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl StringsubsArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Apply a substitution definition to the files it names
    Apply(ApplyArgs),

    /// Substitute a single stream using a flat JSON map
    Replace(ReplaceArgs),

    /// List the default properties of a definition
    Defaults(DefaultsArgs),
}

/// Arguments for applying a definition
#[derive(Parser, Debug, Clone)]
pub struct ApplyArgs {
    /// Substitution definition file (JSON)
    #[arg(value_name = "DEFINITION")]
    pub definition: PathBuf,

    /// Only substitute these components
    #[arg(short, long = "component", value_name = "ID")]
    pub components: Vec<String>,

    /// Only substitute these groups
    #[arg(short, long = "group", value_name = "ID")]
    pub groups: Vec<String>,

    /// Value for a $NAME$ token, as NAME=VALUE
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    pub vars: Vec<(String, String)>,

    /// Resolve $NAME$ tokens from environment variables as well
    #[arg(long)]
    pub env: bool,

    /// Copy each file here before rewriting it
    #[arg(long, value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Substitute the files of a group in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Reader/writer buffer size in bytes
    #[arg(long, default_value = "8192")]
    pub buffer_size: usize,
}

/// Arguments for substituting a single stream
#[derive(Parser, Debug, Clone)]
pub struct ReplaceArgs {
    /// JSON object mapping each token to its replacement
    #[arg(short, long, value_name = "MAP_FILE")]
    pub map: PathBuf,

    /// Input file (default: stdin)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE", conflicts_with = "in_place")]
    pub output: Option<PathBuf>,

    /// Rewrite the input file in place
    #[arg(long, requires = "input")]
    pub in_place: bool,
}

/// Arguments for listing default properties
#[derive(Parser, Debug, Clone)]
pub struct DefaultsArgs {
    /// Substitution definition file (JSON)
    #[arg(value_name = "DEFINITION")]
    pub definition: PathBuf,

    /// Only list properties of this type
    #[arg(short = 't', long = "type")]
    pub property_type: Option<PropertyType>,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Parse a `NAME=VALUE` pair.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid NAME=VALUE: no `=` found in `{s}`"))?;
    if key.is_empty() {
        return Err(format!("invalid NAME=VALUE: empty name in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
