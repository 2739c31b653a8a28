use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use tracing::debug;

use crate::config::{Config, DEFAULT_CONFIG_FILE, DiscoveryConfig};
use crate::discovery;
use crate::error::RunError;
use crate::models::TestSpec;
use crate::runner::EngineOptions;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "selftest")]
#[command(version = VERSION)]
#[command(about = "Run named test snippets and emit a JSON report", long_about = None)]
pub struct Cli {
    /// JSON file holding an array of { "name", "code" } tests
    #[arg(value_name = "INPUT", conflicts_with = "auto")]
    pub input: Option<PathBuf>,

    /// Show progress, per-test results and a summary on stderr
    #[arg(long)]
    pub dev: bool,

    /// Write the report to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Synthesize tests from function declarations found in a file or directory
    #[arg(long, value_name = "DIR")]
    pub auto: Option<PathBuf>,

    /// Exit with status 1 when any test fails
    #[arg(long)]
    pub fail_on_error: bool,

    /// Fail script tests that run longer than this many milliseconds (0 disables)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Run the tests in a child engine process
    #[arg(long)]
    pub subprocess: bool,

    /// Keep the child process cache files (with --subprocess)
    #[arg(long)]
    pub keep_cache: bool,

    /// Configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

/// Where the tests come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Auto(PathBuf),
}

impl Source {
    pub fn load(&self, discovery_config: &DiscoveryConfig) -> Result<Vec<TestSpec>, RunError> {
        match self {
            Source::File(path) => {
                let text =
                    std::fs::read_to_string(path).map_err(|source| RunError::io(path, source))?;
                TestSpec::parse_list(&text).map_err(|source| RunError::Input {
                    path: path.clone(),
                    source,
                })
            }
            Source::Auto(dir) => discovery::discover(dir, discovery_config),
        }
    }
}

/// Command-line flags merged over the config file.
#[derive(Debug)]
pub struct Settings {
    pub source: Source,
    pub dev: bool,
    pub json: Option<PathBuf>,
    pub fail_on_error: bool,
    pub options: EngineOptions,
    pub subprocess: bool,
    pub config: Config,
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings, RunError> {
        let source = match (self.input, self.auto) {
            (_, Some(dir)) => Source::Auto(dir),
            (Some(path), None) => Source::File(path),
            (None, None) => return Err(RunError::Usage(usage("missing INPUT or --auto <DIR>"))),
        };

        let mut config = Config::load(&self.config);
        debug!(config = ?config, "loaded configuration");
        if self.keep_cache {
            config.wrapper.keep_cache = true;
        }

        let timeout_ms = self.timeout_ms.unwrap_or(config.run.timeout_ms);
        Ok(Settings {
            source,
            dev: self.dev,
            json: self.json,
            fail_on_error: self.fail_on_error || config.run.fail_on_error,
            options: EngineOptions::with_timeout_ms(timeout_ms),
            subprocess: self.subprocess,
            config,
        })
    }
}

fn usage(problem: &str) -> String {
    let usage = Cli::command().render_usage();
    format!("{}\n\n{}\n\nFor more information, try '--help'.", problem, usage)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("selftest").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn missing_input_is_a_usage_error() {
        let err = parse(&[]).into_settings().unwrap_err();
        assert!(matches!(&err, RunError::Usage(msg) if msg.contains("Usage:")));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn input_and_auto_conflict() {
        assert!(Cli::try_parse_from(["selftest", "in.json", "--auto", "src"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("selftest.toml");
        std::fs::write(&config, "[run]\ntimeout_ms = 100\nfail_on_error = true\n").unwrap();
        let config = config.to_string_lossy().to_string();

        let settings = parse(&["in.json", "--config", &config]).into_settings().unwrap();
        assert_eq!(settings.source, Source::File("in.json".into()));
        assert_eq!(settings.options.timeout, Some(Duration::from_millis(100)));
        assert!(settings.fail_on_error);

        let settings = parse(&["--auto", "src", "--timeout-ms", "0", "--config", &config])
            .into_settings()
            .unwrap();
        assert_eq!(settings.source, Source::Auto("src".into()));
        assert_eq!(settings.options.timeout, None);
    }

    #[test]
    fn unreadable_input_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Source::File(dir.path().join("missing.json"))
            .load(&DiscoveryConfig::default())
            .unwrap_err();
        assert!(matches!(err, RunError::Io { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn non_array_input_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.json");
        std::fs::write(&path, r#"{"name":"a","code":""}"#).unwrap();
        let err = Source::File(path).load(&DiscoveryConfig::default()).unwrap_err();
        assert!(matches!(err, RunError::Input { .. }));
    }
}
