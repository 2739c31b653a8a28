use serde::{Deserialize, Serialize};

use super::status::TestStatus;

/// Outcome of one test. `error` is present exactly when the test failed;
/// the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTestResult")]
pub struct TestResult {
    name: String,
    status: TestStatus,
    error: Option<String>,
    duration_ms: u64,
}

impl TestResult {
    pub fn passed(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Passed,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Failed,
            error: Some(error.into()),
            duration_ms,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TestStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

/// Wire shape of a [`TestResult`], checked before conversion.
#[derive(Deserialize)]
struct RawTestResult {
    name: String,
    status: TestStatus,
    error: Option<String>,
    duration_ms: u64,
}

impl TryFrom<RawTestResult> for TestResult {
    type Error = String;

    fn try_from(raw: RawTestResult) -> Result<Self, Self::Error> {
        match (raw.status, raw.error) {
            (TestStatus::Passed, None) => Ok(Self::passed(raw.name, raw.duration_ms)),
            (TestStatus::Failed, Some(error)) => Ok(Self::failed(raw.name, error, raw.duration_ms)),
            (TestStatus::Passed, Some(_)) => {
                Err(format!("passed test '{}' carries an error", raw.name))
            }
            (TestStatus::Failed, None) => Err(format!("failed test '{}' has no error", raw.name)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl Summary {
    pub fn from_results(results: &[TestResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            summary.total += 1;
            match result.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
            }
            summary.duration_ms += result.duration_ms;
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_flat() {
        let passed = serde_json::to_value(TestResult::passed("a", 3)).unwrap();
        assert_eq!(
            passed,
            json!({"name": "a", "status": "passed", "error": null, "duration_ms": 3})
        );
        let failed = serde_json::to_value(TestResult::failed("b", "boom", 0)).unwrap();
        assert_eq!(
            failed,
            json!({"name": "b", "status": "failed", "error": "boom", "duration_ms": 0})
        );
    }

    #[test]
    fn rejects_inconsistent_wire_results() {
        let bad = json!({"name": "a", "status": "passed", "error": "x", "duration_ms": 1});
        assert!(serde_json::from_value::<TestResult>(bad).is_err());
        let bad = json!({"name": "a", "status": "failed", "error": null, "duration_ms": 1});
        assert!(serde_json::from_value::<TestResult>(bad).is_err());
    }

    #[test]
    fn summary_counts_and_sums() {
        let results = vec![
            TestResult::passed("a", 2),
            TestResult::failed("b", "x", 5),
            TestResult::passed("c", 1),
        ];
        assert_eq!(
            Summary::from_results(&results),
            Summary {
                total: 3,
                passed: 2,
                failed: 1,
                duration_ms: 8,
            }
        );
        assert_eq!(Summary::from_results(&[]), Summary::default());
    }
}
