//! Build metadata.
//!
//! The commit and date are injected by the release build through the
//! `CERTDX_BUILD_COMMIT` and `CERTDX_BUILD_DATE` environment variables.

use std::fmt;

/// Immutable build metadata for the running binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub date: &'static str,
}

/// Build metadata of this build.
pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    commit: match option_env!("CERTDX_BUILD_COMMIT") {
        Some(commit) => commit,
        None => "unknown",
    },
    date: match option_env!("CERTDX_BUILD_DATE") {
        Some(date) => date,
        None => "unknown",
    },
};

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, built at {})", self.version, self.commit, self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let info = BuildInfo {
            version: "1.2.3",
            commit: "abc1234",
            date: "2024-01-01 00:00",
        };
        assert_eq!(info.to_string(), "1.2.3 (abc1234, built at 2024-01-01 00:00)");
    }

    #[test]
    fn test_version_matches_package() {
        assert_eq!(BUILD_INFO.version, env!("CARGO_PKG_VERSION"));
    }
}
