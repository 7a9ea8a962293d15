use clap::{Parser, ValueEnum};

/// Reports the memory usage of this process, as seen by the operating system.
#[derive(Clone, Debug, Parser)]
#[command(about)]
pub struct Cli {
    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Allocate, and write to, this many mebibytes before querying a second time.
    ///
    /// The report then includes the reading before and after the allocation, and how much it grew by.
    #[arg(long, value_name = "MIB")]
    pub allocate_mib: Option<usize>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,

    /// A single JSON object.
    Json,
}
