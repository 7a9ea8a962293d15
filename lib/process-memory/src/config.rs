use figment::{
    providers::{Env, Serialized},
    Figment, Provider,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt as _, Snafu};

/// Prefix for environment variables that override the query configuration.
pub const ENV_PREFIX: &str = "PROCESS_MEMORY_";

fn default_unix_header_label() -> String {
    "RSS".to_string()
}

const fn default_windows_expected_line_count() -> usize {
    4
}

fn default_windows_unit_suffix() -> String {
    " K".to_string()
}

/// Query configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// The configuration could not be extracted from its sources.
    #[snafu(display("failed to load process memory query configuration: {}", source))]
    Extract {
        /// Error source.
        source: Box<figment::Error>,
    },

    /// A configuration value was present but not usable.
    #[snafu(display("invalid value for '{}': {}", field, reason))]
    InvalidValue {
        /// Name of the invalid field.
        field: &'static str,

        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// Expectations about the shape of the OS tool output.
///
/// The OS tools queried for memory usage produce human-oriented reports whose layout has drifted between OS versions,
/// most notably the number of preamble lines emitted by `tasklist`. These values describe the layout we expect, and can
/// be overridden from the environment (see [`QueryConfiguration::from_environment`]) when a target OS version reports
/// differently.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct QueryConfiguration {
    /// Column label that must appear in the header line of the `ps` report.
    ///
    /// Defaults to `RSS`.
    #[serde(default = "default_unix_header_label")]
    pub unix_header_label: String,

    /// Exact number of lines expected in the `tasklist` report, the last of which is the data row.
    ///
    /// Defaults to 4: a blank line, the column header, the separator, and the data row.
    #[serde(default = "default_windows_expected_line_count")]
    pub windows_expected_line_count: usize,

    /// Unit marker that must terminate the memory field of the `tasklist` data row.
    ///
    /// Defaults to ` K`.
    #[serde(default = "default_windows_unit_suffix")]
    pub windows_unit_suffix: String,
}

impl QueryConfiguration {
    /// Loads the configuration from environment variables prefixed with [`ENV_PREFIX`], falling back to the defaults
    /// for anything not set.
    ///
    /// For example, `PROCESS_MEMORY_WINDOWS_EXPECTED_LINE_COUNT=6` overrides `windows_expected_line_count`.
    ///
    /// # Errors
    ///
    /// If a variable cannot be converted to the type of its field, or a value is not usable, an error is returned.
    pub fn from_environment() -> Result<Self, ConfigurationError> {
        Self::from_environment_prefixed(ENV_PREFIX)
    }

    fn from_environment_prefixed(prefix: &str) -> Result<Self, ConfigurationError> {
        Self::from_provider(Env::prefixed(prefix))
    }

    fn from_provider<P: Provider>(provider: P) -> Result<Self, ConfigurationError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(provider)
            .extract()
            .map_err(Box::new)
            .context(Extract)?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.unix_header_label.is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "unix_header_label",
                reason: "must not be empty",
            });
        }

        // The data row is always the last line, so there must be at least one.
        if self.windows_expected_line_count == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "windows_expected_line_count",
                reason: "must be at least 1",
            });
        }

        if self.windows_unit_suffix.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "windows_unit_suffix",
                reason: "must contain a unit marker",
            });
        }

        Ok(())
    }
}

impl Default for QueryConfiguration {
    fn default() -> Self {
        Self {
            unix_header_label: default_unix_header_label(),
            windows_expected_line_count: default_windows_expected_line_count(),
            windows_unit_suffix: default_windows_unit_suffix(),
        }
    }
}
