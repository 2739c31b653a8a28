use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::result::{Summary, TestResult};
use crate::error::RunError;

pub const FRAMEWORK: &str = "selftest-core";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source of the report timestamp.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub framework: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub meta: Meta,
    pub summary: Summary,
    pub tests: Vec<TestResult>,
}

impl Report {
    pub fn build(summary: Summary, tests: Vec<TestResult>, clock: &dyn Clock) -> Self {
        Self {
            meta: Meta {
                framework: FRAMEWORK.to_string(),
                version: VERSION.to_string(),
                timestamp: clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
            summary,
            tests,
        }
    }

    /// Summarize `tests` and stamp the report with the current time.
    pub fn from_results(tests: Vec<TestResult>) -> Self {
        Self::build(Summary::from_results(&tests), tests, &SystemClock)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Write the pretty JSON form to `path` via a temp file in the same
    /// directory, so readers never see a partial report.
    pub fn write_to(&self, path: &Path) -> Result<(), RunError> {
        let json = self.to_json_pretty()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file =
            tempfile::NamedTempFile::new_in(dir).map_err(|source| RunError::io(dir, source))?;
        file.write_all(json.as_bytes())
            .map_err(|source| RunError::io(file.path(), source))?;
        file.persist(path)
            .map_err(|e| RunError::io(path, e.error))?;
        debug!(path = %path.display(), "wrote report");
        Ok(())
    }
}
