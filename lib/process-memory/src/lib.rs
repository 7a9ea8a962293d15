//! Process memory querying.
//!
//! This crate asks the operating system how much physical memory the current process is using, as opposed to how much
//! has been allocated through any in-process accounting. Memory allocated by native libraries, memory-mapped buffers,
//! and anything else the process never sees through its own allocator shows up here, which makes it useful for
//! spotting memory growth that in-process accounting cannot.
//!
//! Queries are answered by running a platform utility and parsing its report. Each query spawns exactly one child
//! process and blocks until it exits; nothing is cached between queries.
//!
//! ## Unix
//!
//! On Linux, macOS, and other POSIX-like systems, `ps -p <pid> -o rss` is run, and the resident set size it reports (in
//! kibibytes) is returned in bytes.
//!
//! ## Windows
//!
//! On Windows, `tasklist /FI "PID eq <pid>"` is run, and the "Mem Usage" column of the matching row (in kibibytes,
//! formatted for the current locale) is returned in bytes.
//!
//! ## Configuration
//!
//! The expected shape of both reports can be adjusted through [`QueryConfiguration`], which is read from
//! `PROCESS_MEMORY_`-prefixed environment variables the first time the process-wide strategy is used.
#![deny(missing_docs)]

use std::sync::OnceLock;

use tracing::warn;

mod command;

mod config;
pub use self::config::{ConfigurationError, QueryConfiguration, ENV_PREFIX};

mod detect;
pub use self::detect::StrategyKind;

mod error;
pub use self::error::{FormatStage, QueryError};

mod unix;
pub use self::unix::{parse_ps_output, UnixQuery};

mod windows;
pub use self::windows::{parse_tasklist_output, WindowsQuery};

/// A platform-specific way of measuring the memory usage of a process.
pub trait MemoryQuery {
    /// Gets the memory usage of the process identified by `pid`, in bytes.
    ///
    /// # Errors
    ///
    /// If the platform command cannot be run, exits unsuccessfully, is interrupted, or reports in an unexpected format,
    /// an error is returned. No fallback value is ever substituted.
    fn query(&self, pid: u32) -> Result<u64, QueryError>;

    /// Gets the memory usage of the current process, in bytes.
    ///
    /// # Errors
    ///
    /// See [`query`][Self::query].
    fn query_current(&self) -> Result<u64, QueryError> {
        self.query(std::process::id())
    }
}

/// A memory query strategy, selected by platform.
#[derive(Clone, Debug)]
pub enum Strategy {
    /// Query with `ps`.
    Unix(UnixQuery),

    /// Query with `tasklist`.
    Windows(WindowsQuery),
}

impl Strategy {
    /// Creates the strategy of the given kind, using the given configuration.
    pub fn new(kind: StrategyKind, config: &QueryConfiguration) -> Self {
        match kind {
            StrategyKind::Unix => Self::Unix(UnixQuery::from_configuration(config)),
            StrategyKind::Windows => Self::Windows(WindowsQuery::from_configuration(config)),
        }
    }

    /// Returns the kind of this strategy.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Unix(_) => StrategyKind::Unix,
            Self::Windows(_) => StrategyKind::Windows,
        }
    }

    /// Returns the process-wide strategy.
    ///
    /// The strategy is selected from the host operating system, and configured from the environment, the first time
    /// this is called. It is never re-evaluated afterwards. If the configuration in the environment is invalid, the
    /// defaults are used instead, and a warning is logged.
    pub fn global() -> &'static Strategy {
        static GLOBAL_STRATEGY: OnceLock<Strategy> = OnceLock::new();

        GLOBAL_STRATEGY.get_or_init(|| {
            let config = QueryConfiguration::from_environment().unwrap_or_else(|error| {
                warn!(%error, "Invalid process memory query configuration. Using defaults.");
                QueryConfiguration::default()
            });

            Strategy::new(StrategyKind::detect(), &config)
        })
    }
}

impl MemoryQuery for Strategy {
    fn query(&self, pid: u32) -> Result<u64, QueryError> {
        match self {
            Self::Unix(query) => query.query(pid),
            Self::Windows(query) => query.query(pid),
        }
    }
}

/// Gets the memory usage of the current process, in bytes, as reported by the operating system.
///
/// This is the resident set size on POSIX-like systems, and the working set size on Windows. The value is always a
/// multiple of 1024, as both platforms report in kibibytes.
///
/// Failures are returned immediately: there are no retries, and no fallback value.
///
/// # Errors
///
/// If the memory query command cannot be run, exits unsuccessfully, is interrupted, or reports in an unexpected format,
/// an error is returned.
pub fn get_process_memory_usage() -> Result<u64, QueryError> {
    Strategy::global().query_current()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_follows_kind() {
        let config = QueryConfiguration::default();
        assert_eq!(Strategy::new(StrategyKind::Unix, &config).kind(), StrategyKind::Unix);
        assert_eq!(Strategy::new(StrategyKind::Windows, &config).kind(), StrategyKind::Windows);
    }

    #[test]
    fn global_strategy_is_detected_once() {
        let first = Strategy::global();
        let second = Strategy::global();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.kind(), StrategyKind::detect());
    }

    #[test]
    fn basic() {
        let usage = get_process_memory_usage().unwrap();
        assert!(usage > 0);
        assert_eq!(usage % 1024, 0);
    }
}
