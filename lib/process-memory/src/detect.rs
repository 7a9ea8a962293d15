use std::sync::OnceLock;

/// The family of query strategy applicable to a host operating system.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StrategyKind {
    /// POSIX-like systems, queried with `ps`.
    Unix,

    /// Windows, queried with `tasklist`.
    Windows,
}

impl StrategyKind {
    /// Detects the strategy kind for the host operating system.
    ///
    /// Detection happens once per process, and the result is reused for every subsequent call.
    pub fn detect() -> Self {
        static DETECTED: OnceLock<StrategyKind> = OnceLock::new();

        *DETECTED.get_or_init(|| Self::from_os_name(std::env::consts::OS))
    }

    /// Maps an operating system name to a strategy kind.
    ///
    /// Anything not recognized as Windows is treated as POSIX-like.
    pub fn from_os_name(os_name: &str) -> Self {
        if os_name.trim_start().to_ascii_lowercase().starts_with("win") {
            Self::Windows
        } else {
            Self::Unix
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StrategyKind;

    #[test]
    fn windows_names() {
        for name in ["windows", "Windows 10", "Windows Server 2019", "WINDOWS 11"] {
            assert_eq!(StrategyKind::from_os_name(name), StrategyKind::Windows, "{}", name);
        }
    }

    #[test]
    fn everything_else_is_unix() {
        // "darwin" contains "win", but is not Windows.
        for name in ["linux", "macos", "darwin", "Mac OS X", "freebsd", "solaris", ""] {
            assert_eq!(StrategyKind::from_os_name(name), StrategyKind::Unix, "{}", name);
        }
    }

    #[test]
    fn detection_matches_build_target() {
        let expected = if cfg!(windows) {
            StrategyKind::Windows
        } else {
            StrategyKind::Unix
        };
        assert_eq!(StrategyKind::detect(), expected);
        assert_eq!(StrategyKind::detect(), StrategyKind::detect());
    }
}
