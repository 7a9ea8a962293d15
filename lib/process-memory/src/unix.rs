use tracing::debug;

use crate::{
    command::run_command,
    error::{kib_to_bytes, FormatStage, QueryError},
    MemoryQuery, QueryConfiguration,
};

const PS_PROGRAM: &str = "ps";

/// Queries resident set size on POSIX-like systems using `ps`.
///
/// The command run is `ps -p <pid> -o rss`, which reports a header line followed by a single line holding the resident
/// set size in kibibytes.
#[derive(Clone, Debug)]
pub struct UnixQuery {
    header_label: String,
}

impl UnixQuery {
    /// Creates a new `UnixQuery` from the given configuration.
    pub fn from_configuration(config: &QueryConfiguration) -> Self {
        Self {
            header_label: config.unix_header_label.clone(),
        }
    }
}

impl Default for UnixQuery {
    fn default() -> Self {
        Self::from_configuration(&QueryConfiguration::default())
    }
}

impl MemoryQuery for UnixQuery {
    fn query(&self, pid: u32) -> Result<u64, QueryError> {
        let args = vec!["-p".to_string(), pid.to_string(), "-o".to_string(), "rss".to_string()];
        let lines = run_command(PS_PROGRAM, &args)?;

        let rss_bytes = parse_ps_output(&lines, &self.header_label)?;
        debug!(pid, rss_bytes, "Parsed resident set size from ps.");

        Ok(rss_bytes)
    }
}

/// Parses the output of `ps -p <pid> -o rss` into a byte count.
///
/// The output must be exactly two lines: a header containing `header_label`, and a data line holding a non-negative
/// integer number of kibibytes, optionally padded with whitespace.
///
/// # Errors
///
/// If the output deviates from that shape, an [`UnexpectedOutputFormat`][QueryError::UnexpectedOutputFormat] error is
/// returned, tagged with the stage at which parsing failed.
pub fn parse_ps_output<S: AsRef<str>>(lines: &[S], header_label: &str) -> Result<u64, QueryError> {
    let [header, data] = lines else {
        return Err(QueryError::UnexpectedOutputFormat {
            stage: FormatStage::LineCount,
            detail: format!("expected 2 lines, got {}", lines.len()),
        });
    };

    let header = header.as_ref();
    if !header.contains(header_label) {
        return Err(QueryError::UnexpectedOutputFormat {
            stage: FormatStage::Header,
            detail: format!("header '{}' does not contain '{}'", header, header_label),
        });
    }

    let raw_value = data.as_ref().trim();
    let rss_kib = raw_value
        .parse::<u64>()
        .map_err(|e| QueryError::UnexpectedOutputFormat {
            stage: FormatStage::NumericParse,
            detail: format!("'{}' is not a kibibyte count: {}", raw_value, e),
        })?;

    kib_to_bytes(rss_kib)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parses_rss() {
        assert_eq!(parse_ps_output(&["RSS", "  12345"], "RSS").unwrap(), 12345 * 1024);
        assert_eq!(parse_ps_output(&["  RSS", "12345  "], "RSS").unwrap(), 12345 * 1024);
        assert_eq!(parse_ps_output(&["RSS", "0"], "RSS").unwrap(), 0);
    }

    #[test]
    fn header_without_label() {
        let error = parse_ps_output(&["SIZE", "  12345"], "RSS").unwrap_err();
        assert_eq!(error.stage(), Some(FormatStage::Header));
    }

    #[test]
    fn header_match_is_case_sensitive() {
        let error = parse_ps_output(&["rss", "  12345"], "RSS").unwrap_err();
        assert_eq!(error.stage(), Some(FormatStage::Header));
    }

    #[test]
    fn wrong_line_count() {
        for lines in [vec![], vec!["RSS"], vec!["RSS", "1", "2"]] {
            let error = parse_ps_output(lines.as_slice(), "RSS").unwrap_err();
            assert_eq!(error.stage(), Some(FormatStage::LineCount));
        }
    }

    #[test]
    fn unparsable_value() {
        for value in ["", "   ", "-5", "12.5", "12,345", "12345 K", "lots"] {
            let error = parse_ps_output(&["RSS", value], "RSS").unwrap_err();
            assert_eq!(error.stage(), Some(FormatStage::NumericParse), "{:?}", value);
        }
    }

    #[test]
    fn overflowing_value() {
        let error = parse_ps_output(&["RSS", u64::MAX.to_string().as_str()], "RSS").unwrap_err();
        assert_eq!(error.stage(), Some(FormatStage::NumericParse));
    }

    #[test]
    fn custom_header_label() {
        assert_eq!(parse_ps_output(&["RSZ", "8"], "RSZ").unwrap(), 8 * 1024);
    }

    #[cfg(unix)]
    #[test]
    fn nonexistent_pid_fails() {
        // `ps` exits non-zero when no process matches the selection.
        let result = UnixQuery::default().query(u32::MAX);
        assert!(
            matches!(result, Err(QueryError::ChildProcessFailed { .. })),
            "{:?}",
            result
        );
    }

    proptest! {
        #[test]
        fn property_test_arbitrary_lines_never_panic(lines in proptest::collection::vec(any::<String>(), 0..4)) {
            let _ = parse_ps_output(lines.as_slice(), "RSS");
        }

        #[test]
        fn property_test_bytes_are_whole_kibibytes(kib in 0u64..(u64::MAX / 1024), pad in 0usize..8) {
            let data = format!("{}{}", " ".repeat(pad), kib);
            let bytes = parse_ps_output(&["  RSS", data.as_str()], "RSS").unwrap();
            prop_assert_eq!(bytes % 1024, 0);
            prop_assert_eq!(bytes / 1024, kib);
        }
    }
}
