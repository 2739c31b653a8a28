//! Best-effort test synthesis from source files.
//!
//! Every top-level-looking `function NAME(` or `const NAME = (` found in a
//! scanned file becomes a test asserting that calling `NAME()` does not throw.
//! This is pattern matching over text, not parsing: declarations written
//! differently are missed and commented-out ones are picked up.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::DiscoveryConfig;
use crate::error::RunError;
use crate::models::TestSpec;

static FUNCTION_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"function\s+([a-zA-Z0-9_]+)\s*\(").expect("valid regex"));
static CONST_ARROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"const\s+([a-zA-Z0-9_]+)\s*=\s*\(").expect("valid regex"));

/// CommonJS globals some scanned files assign to.
const MODULE_SHIM: &str = "var module = { exports: {} }\nvar exports = module.exports\n";

/// Scan a file, or the files directly inside a directory, and synthesize specs.
pub fn discover(root: &Path, config: &DiscoveryConfig) -> Result<Vec<TestSpec>, RunError> {
    let files = candidate_files(root, config)?;
    let mut specs = Vec::new();
    for file in files {
        let source =
            std::fs::read_to_string(&file).map_err(|source| RunError::io(&file, source))?;
        let names = scan_source(&source);
        debug!(file = %file.display(), found = names.len(), "scanned");
        specs.extend(names.iter().map(|name| synthesize(name, &source)));
    }
    Ok(specs)
}

/// Declared names in match order: `function` declarations first, then
/// `const` arrows.
pub fn scan_source(source: &str) -> Vec<String> {
    FUNCTION_DECL
        .captures_iter(source)
        .chain(CONST_ARROW.captures_iter(source))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// A spec that loads `source`, then calls `name` and expects it not to throw.
pub fn synthesize(name: &str, source: &str) -> TestSpec {
    let code = format!(
        "{MODULE_SHIM}{source}\n\
         if (typeof {name} === \"function\") {{\n\
         \x20 {name}();\n\
         \x20 expect(true).toBeTruthy();\n\
         }} else {{\n\
         \x20 throw new Error(\"{name} is not a function\");\n\
         }}\n"
    );
    TestSpec::script(format!("Auto: {}() should not throw", name), code)
}

fn candidate_files(root: &Path, config: &DiscoveryConfig) -> Result<Vec<PathBuf>, RunError> {
    let meta = std::fs::metadata(root).map_err(|source| RunError::io(root, source))?;
    if meta.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let ignore: Vec<glob::Pattern> = config
        .ignore
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %p, error = %e, "skipping invalid ignore pattern");
                None
            }
        })
        .collect();

    let base = glob::Pattern::escape(&root.to_string_lossy());
    let mut files = Vec::new();
    for ext in &config.extensions {
        let pattern = format!("{}/*.{}", base, ext);
        let entries = glob::glob(&pattern).map_err(|e| RunError::Discovery(e.to_string()))?;
        for entry in entries.flatten() {
            let relative = entry.strip_prefix(root).unwrap_or(&entry);
            if entry.is_file()
                && !ignore.iter().any(|p| p.matches_path(relative))
                && !files.contains(&entry)
            {
                files.push(entry);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{TestBody, TestStatus};
    use crate::runner::engine::{self, EngineOptions};

    #[test]
    fn finds_functions_then_arrows() {
        let source = "const add = (a, b) => a + b\nfunction greet() {}\nexport function shout (x) {}\n";
        assert_eq!(scan_source(source), ["greet", "shout", "add"]);
    }

    #[test]
    fn synthesized_spec_shape() {
        let spec = synthesize("greet", "function greet() {}");
        assert_eq!(spec.name, "Auto: greet() should not throw");
        let TestBody::Script(code) = &spec.body else {
            panic!("expected a script body");
        };
        assert!(code.contains("typeof greet === \"function\""));
        assert!(code.contains("throw new Error(\"greet is not a function\")"));
    }

    #[test]
    fn synthesized_specs_run() {
        let source = "function ok() { return 1 }\n\
                      function bad() { throw new Error('bad things') }\n\
                      const arrow = () => ok()\n\
                      // const ghost = (x) => x\n\
                      module.exports = { ok }\n";
        let specs: Vec<_> = scan_source(source)
            .iter()
            .map(|name| synthesize(name, source))
            .collect();
        let report = engine::run(&specs, &EngineOptions::default());
        let outcomes: Vec<_> = report
            .tests
            .iter()
            .map(|t| (t.name(), t.status(), t.error()))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("Auto: ok() should not throw", TestStatus::Passed, None),
                (
                    "Auto: bad() should not throw",
                    TestStatus::Failed,
                    Some("bad things")
                ),
                ("Auto: arrow() should not throw", TestStatus::Passed, None),
                (
                    "Auto: ghost() should not throw",
                    TestStatus::Failed,
                    Some("ghost is not a function")
                ),
            ]
        );
    }

    #[test]
    fn scans_directory_non_recursively_with_ignores() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.js"), "function two() {}").unwrap();
        std::fs::write(dir.path().join("a.mjs"), "function one() {}").unwrap();
        std::fs::write(dir.path().join("skip.min.js"), "function no() {}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "function nope() {}").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c.js"), "function deep() {}").unwrap();

        let config = DiscoveryConfig {
            ignore: vec!["*.min.js".into()],
            ..DiscoveryConfig::default()
        };
        let names: Vec<_> = discover(dir.path(), &config)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            ["Auto: one() should not throw", "Auto: two() should not throw"]
        );
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("nope"), &DiscoveryConfig::default()).unwrap_err();
        assert!(matches!(err, RunError::Io { .. }));
    }
}
