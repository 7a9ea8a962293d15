use tracing::debug;

use crate::{
    command::run_command,
    error::{kib_to_bytes, FormatStage, QueryError},
    MemoryQuery, QueryConfiguration,
};

const TASKLIST_PROGRAM: &str = "tasklist";

/// Characters that locales use to group digits in the `tasklist` memory column.
const GROUPING_SEPARATORS: &[char] = &[',', '.', '\'', '\u{a0}', '\u{202f}'];

/// Queries working set size on Windows using `tasklist`.
///
/// The command run is `tasklist /FI "PID eq <pid>"`, passed directly as an argument list. It reports a short, column
/// aligned table whose last line is the row for the process, ending in its memory usage, such as `12,345 K`.
#[derive(Clone, Debug)]
pub struct WindowsQuery {
    expected_line_count: usize,
    unit_suffix: String,
}

impl WindowsQuery {
    /// Creates a new `WindowsQuery` from the given configuration.
    pub fn from_configuration(config: &QueryConfiguration) -> Self {
        Self {
            expected_line_count: config.windows_expected_line_count,
            unit_suffix: config.windows_unit_suffix.clone(),
        }
    }
}

impl Default for WindowsQuery {
    fn default() -> Self {
        Self::from_configuration(&QueryConfiguration::default())
    }
}

impl MemoryQuery for WindowsQuery {
    fn query(&self, pid: u32) -> Result<u64, QueryError> {
        let args = vec!["/FI".to_string(), format!("PID eq {}", pid)];
        let lines = run_command(TASKLIST_PROGRAM, &args)?;

        let working_set_bytes = parse_tasklist_output(&lines, self.expected_line_count, &self.unit_suffix)?;
        debug!(pid, working_set_bytes, "Parsed memory usage from tasklist.");

        Ok(working_set_bytes)
    }
}

/// Parses the output of `tasklist /FI "PID eq <pid>"` into a byte count.
///
/// The output must be exactly `expected_line_count` lines long. The memory field is the final two space-delimited
/// tokens of the last line: a locale-formatted number of kibibytes followed by `unit_suffix`.
///
/// # Errors
///
/// If the output deviates from that shape, an [`UnexpectedOutputFormat`][QueryError::UnexpectedOutputFormat] error is
/// returned, tagged with the stage at which parsing failed.
pub fn parse_tasklist_output<S: AsRef<str>>(
    lines: &[S], expected_line_count: usize, unit_suffix: &str,
) -> Result<u64, QueryError> {
    if expected_line_count == 0 || lines.len() != expected_line_count {
        return Err(QueryError::UnexpectedOutputFormat {
            stage: FormatStage::LineCount,
            detail: format!(
                "expected {} lines, got {}: {:?}",
                expected_line_count,
                lines.len(),
                lines.iter().map(|line| line.as_ref()).collect::<Vec<&str>>()
            ),
        });
    }

    let row = lines[expected_line_count - 1].as_ref();
    let memory_field = extract_memory_field(row)?;

    let Some(raw_value) = memory_field.strip_suffix(unit_suffix) else {
        return Err(QueryError::UnexpectedOutputFormat {
            stage: FormatStage::UnitSuffix,
            detail: format!("expected '{}' to end with '{}'", memory_field, unit_suffix),
        });
    };

    let digits = raw_value.replace(GROUPING_SEPARATORS, "");
    let usage_kib = digits.parse::<u64>().map_err(|e| QueryError::UnexpectedOutputFormat {
        stage: FormatStage::NumericParse,
        detail: format!("'{}' is not a kibibyte count: {}", raw_value, e),
    })?;

    kib_to_bytes(usage_kib)
}

/// Returns everything after the second-to-last space of the row, which holds the value and its unit.
fn extract_memory_field(row: &str) -> Result<&str, QueryError> {
    let last_space = row.rfind(' ').ok_or_else(|| QueryError::UnexpectedOutputFormat {
        stage: FormatStage::FieldLocation,
        detail: format!("no unit separator in row '{}'", row),
    })?;

    let value_start = row[..last_space]
        .rfind(' ')
        .ok_or_else(|| QueryError::UnexpectedOutputFormat {
            stage: FormatStage::FieldLocation,
            detail: format!("no value separator in row '{}'", row),
        })?;

    Ok(&row[value_start + 1..])
}
