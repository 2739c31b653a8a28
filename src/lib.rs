//! A minimal test runner.
//!
//! Tests are named snippets of script code (or Rust closures) that use
//! `expect(value).toBe(..)`-style assertions. The engine runs them one at a
//! time, turns every fault into a failed result, and produces a JSON report.

pub mod app;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod expect;
pub mod models;
pub mod runner;
pub mod script;
pub mod suite;
pub mod ui;

pub use error::RunError;
pub use expect::{AssertionError, ExpectFn, Expectation, expect};
pub use models::{Report, Summary, TestResult, TestSpec, TestStatus};
pub use runner::{EngineOptions, InProcessRunner, SubprocessRunner, TestRunner};
pub use script::Value;
pub use suite::Suite;
