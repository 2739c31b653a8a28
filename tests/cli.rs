use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use serde_json::Value;

const TESTS: &str = r#"[
  {"name": "a", "code": "expect(1).toBe(1)"},
  {"name": "b", "code": "expect([1, 2]).toEqual([1, 3])"}
]"#;

fn selftest(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_selftest"))
        .args(args)
        .current_dir(dir)
        .env_remove("SELFTEST_LOG")
        .output()
        .unwrap()
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tests.json"), TESTS).unwrap();
    dir
}

fn statuses(report: &Value) -> Vec<(String, String)> {
    report["tests"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| {
            (
                t["name"].as_str().unwrap().to_string(),
                t["status"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

#[test]
fn no_input_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = selftest(dir.path(), &[]);

    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage:"));
}

#[test]
fn report_goes_to_stdout_by_default() {
    let dir = workspace();
    let out = selftest(dir.path(), &["tests.json"]);

    assert_eq!(out.status.code(), Some(0));
    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(
        statuses(&report),
        vec![
            ("a".to_string(), "passed".to_string()),
            ("b".to_string(), "failed".to_string()),
        ]
    );
    assert_eq!(report["summary"]["total"], 2);
    assert_eq!(report["tests"][1]["error"], "Expected [1, 2] toEqual [1, 3]");
    assert_eq!(report["meta"]["framework"], "selftest-core");
}

#[test]
fn json_flag_writes_the_report_file() {
    let dir = workspace();
    let out = selftest(dir.path(), &["tests.json", "--json", "missing/report.json"]);
    assert_eq!(out.status.code(), Some(3));

    let out = selftest(dir.path(), &["tests.json", "--json", "report.json"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(out.stdout.is_empty());

    let text = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
    let report: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(report["summary"]["passed"], 1);
    assert_eq!(report["summary"]["failed"], 1);
}

#[test]
fn dev_mode_announces_the_written_file() {
    let dir = workspace();
    let out = selftest(dir.path(), &["tests.json", "--dev", "--json", "report.json"]);

    assert_eq!(out.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Wrote results to report.json"));
    assert!(stderr.contains("SUMMARY"));
    assert!(stderr.contains("Expected [1, 2] toEqual [1, 3]"));
}

#[test]
fn fail_on_error_sets_the_exit_status() {
    let dir = workspace();
    let out = selftest(dir.path(), &["tests.json", "--fail-on-error"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(serde_json::from_slice::<Value>(&out.stdout).is_ok());
}

#[test]
fn unreadable_input_exits_with_three() {
    let dir = tempfile::tempdir().unwrap();
    let out = selftest(dir.path(), &["missing.json"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(out.stdout.is_empty());

    std::fs::write(dir.path().join("bad.json"), "not json").unwrap();
    let out = selftest(dir.path(), &["bad.json"]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn auto_discovers_declared_functions() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir(&src).unwrap();
    std::fs::write(
        src.join("math.js"),
        "function add(a, b) { return a + b }\nconst boom = () => { throw new Error('no') }\n",
    )
    .unwrap();

    let out = selftest(dir.path(), &["--auto", "src"]);
    assert_eq!(out.status.code(), Some(0));
    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(
        statuses(&report),
        vec![
            ("Auto: add() should not throw".to_string(), "passed".to_string()),
            ("Auto: boom() should not throw".to_string(), "failed".to_string()),
        ]
    );
}

#[test]
fn subprocess_mode_matches_in_process() {
    let dir = workspace();
    let in_process = selftest(dir.path(), &["tests.json"]);
    let child = selftest(dir.path(), &["tests.json", "--subprocess"]);

    assert_eq!(child.status.code(), Some(0));
    let a: Value = serde_json::from_slice(&in_process.stdout).unwrap();
    let b: Value = serde_json::from_slice(&child.stdout).unwrap();
    assert_eq!(statuses(&a), statuses(&b));
    assert_eq!(a["tests"][1]["error"], b["tests"][1]["error"]);

    // Cache files are cleaned up.
    let cache = dir.path().join(".cache");
    assert_eq!(std::fs::read_dir(cache).unwrap().count(), 0);
}
