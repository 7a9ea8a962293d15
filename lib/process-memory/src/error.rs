use std::{fmt, io};

use snafu::Snafu;

/// The stage of output parsing at which a memory report was rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FormatStage {
    /// The report did not have the expected number of lines.
    LineCount,

    /// The header line did not contain the expected column label.
    Header,

    /// The memory field could not be located within the data row.
    FieldLocation,

    /// The memory field did not end with the expected unit marker.
    UnitSuffix,

    /// The memory field was not a valid non-negative integer, or overflowed when scaled to bytes.
    NumericParse,
}

impl FormatStage {
    /// Returns a short, stable name for this stage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LineCount => "line-count",
            Self::Header => "header",
            Self::FieldLocation => "field-location",
            Self::UnitSuffix => "unit-suffix",
            Self::NumericParse => "numeric-parse",
        }
    }
}

impl fmt::Display for FormatStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process memory query error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum QueryError {
    /// The memory query command exited with a non-zero status code.
    ///
    /// The standard output and standard error of the command are logged when this happens, rather than being carried
    /// by the error itself.
    #[snafu(display("memory query command '{}' failed with exit code {}", command, exit_code))]
    ChildProcessFailed {
        /// Command line that was executed.
        command: String,

        /// Exit code of the command.
        ///
        /// A command killed by a signal is reported as `128 + signal` on Unix, and `-1` where no code is available.
        exit_code: i32,
    },

    /// The output of the memory query command did not have the expected shape.
    #[snafu(display("unexpected memory query output format ({}): {}", stage, detail))]
    UnexpectedOutputFormat {
        /// Parsing stage that rejected the output.
        stage: FormatStage,

        /// Description of what was found instead.
        detail: String,
    },

    /// The memory query command could not be spawned, or its output could not be read.
    #[snafu(display("failed to run memory query command '{}': {}", command, source))]
    Io {
        /// Command line that was executed.
        command: String,

        /// Error source.
        source: io::Error,
    },

    /// Waiting for the memory query command was interrupted before it exited normally.
    #[snafu(display("memory query command '{}' was interrupted: {}", command, detail))]
    Interrupted {
        /// Command line that was executed.
        command: String,

        /// Description of the interruption.
        detail: String,
    },
}

impl QueryError {
    /// Returns the parsing stage that failed, if this is an output format error.
    pub fn stage(&self) -> Option<FormatStage> {
        match self {
            Self::UnexpectedOutputFormat { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Scales a kibibyte count, as reported by the OS tools, to bytes.
pub(crate) fn kib_to_bytes(kib: u64) -> Result<u64, QueryError> {
    kib.checked_mul(1024).ok_or_else(|| QueryError::UnexpectedOutputFormat {
        stage: FormatStage::NumericParse,
        detail: format!("{} KiB overflows when converted to bytes", kib),
    })
}
