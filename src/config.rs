use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "selftest.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub wrapper: WrapperConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunConfig {
    /// Per-test limit in milliseconds for script bodies. 0 disables it.
    #[serde(default)]
    pub timeout_ms: u64,
    /// Exit with status 1 when any test fails.
    #[serde(default)]
    pub fail_on_error: bool,
}

/// Controls which files `--auto` scans.
#[derive(Debug, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Glob patterns of files to skip.
    /// Example: ["vendor/**", "**/*.min.js"]
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore: Vec::new(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    ["js", "mjs", "cjs"].map(String::from).to_vec()
}

/// Settings for running tests in a child process.
#[derive(Debug, Deserialize)]
pub struct WrapperConfig {
    /// Engine command line, shell-words syntax. Empty means this executable.
    /// Example: "selftest" or "/opt/bin/selftest --timeout-ms 500"
    #[serde(default)]
    pub command: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub keep_cache: bool,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            cache_dir: default_cache_dir(),
            keep_cache: false,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

impl Config {
    /// Load `path`, falling back to defaults if absent or invalid.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        toml::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring invalid config");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(DEFAULT_CONFIG_FILE));
        assert_eq!(config.run.timeout_ms, 0);
        assert!(!config.run.fail_on_error);
        assert_eq!(config.discovery.extensions, ["js", "mjs", "cjs"]);
        assert_eq!(config.wrapper.cache_dir, PathBuf::from(".cache"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[run]\ntimeout_ms = 250\n\n[wrapper]\nkeep_cache = true\ncommand = \"selftest --dev\""
        )
        .unwrap();
        let config = Config::load(file.path());
        assert_eq!(config.run.timeout_ms, 250);
        assert!(config.wrapper.keep_cache);
        assert_eq!(config.wrapper.command, "selftest --dev");
        assert_eq!(config.wrapper.cache_dir, PathBuf::from(".cache"));
        assert_eq!(config.discovery.extensions, ["js", "mjs", "cjs"]);
    }

    #[test]
    fn invalid_file_gives_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[run\ntimeout_ms = ").unwrap();
        assert_eq!(Config::load(file.path()).run.timeout_ms, 0);
    }
}
