use clap::Parser;
use std::path::PathBuf;

use crate::config::{MarkupEngine, Mode};

#[derive(Parser, Debug)]
#[command(
    name = "xss-clean",
    version,
    about = "Strip XSS and SQL-injection vectors from untrusted text"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "xss-clean.yaml")]
    pub config: PathBuf,

    /// How to interpret the input (overrides config file setting)
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Backslash-escape quotes in the output (overrides config file setting)
    #[arg(short, long)]
    pub escape_quotes: bool,

    /// Markup engine for markup mode (overrides config file setting)
    #[arg(short, long, value_enum)]
    pub backend: Option<MarkupEngine>,

    /// Tag policy YAML for markup mode (overrides config file setting)
    #[arg(short, long)]
    pub policy: Option<PathBuf>,

    /// Print the rule matches as JSON instead of sanitizing
    #[arg(long)]
    pub report: bool,

    /// Input file; reads stdin when omitted
    pub input: Option<PathBuf>,
}
