//! Sequential execution of test specs.
//!
//! Each body runs on its own worker thread with a large stack. The thread
//! boundary contains panics from native bodies and gives the script
//! evaluator room for deep (but bounded) recursion in debug builds.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::app::TestEvent;
use crate::expect::{factory, script_binding};
use crate::models::{Report, Summary, TestBody, TestResult, TestSpec};
use crate::script::Interpreter;

/// Reserved, not committed: pages are only touched as recursion goes deeper.
const WORKER_STACK_SIZE: usize = 256 * 1024 * 1024;
/// Headroom kept free below the script stack budget.
const STACK_MARGIN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Per-test limit for script bodies. `None` disables it.
    pub timeout: Option<Duration>,
}

impl EngineOptions {
    /// `0` means no timeout.
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
        }
    }
}

/// Run every spec and build the report.
pub fn run(specs: &[TestSpec], options: &EngineOptions) -> Report {
    run_with_events(specs, options, None)
}

/// [`run`], pushing progress events to `events` as tests start and finish.
/// A closed channel is ignored.
pub fn run_with_events(
    specs: &[TestSpec],
    options: &EngineOptions,
    events: Option<&mpsc::UnboundedSender<TestEvent>>,
) -> Report {
    let emit = |event: TestEvent| {
        if let Some(tx) = events {
            let _ = tx.send(event);
        }
    };

    info!(total = specs.len(), "starting run");
    emit(TestEvent::RunStarted { total: specs.len() });

    let mut results = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        emit(TestEvent::TestStarted {
            index,
            name: spec.name.clone(),
        });
        let result = execute(spec, options);
        debug!(
            test = %result.name(),
            status = ?result.status(),
            duration_ms = result.duration_ms(),
            "test finished"
        );
        emit(TestEvent::TestFinished {
            index,
            result: result.clone(),
        });
        results.push(result);
    }

    let summary = Summary::from_results(&results);
    info!(
        passed = summary.passed,
        failed = summary.failed,
        "run finished"
    );
    emit(TestEvent::RunFinished { summary });
    Report::from_results(results)
}

/// Run a single spec. Every fault inside the body becomes a failed result.
pub fn execute(spec: &TestSpec, options: &EngineOptions) -> TestResult {
    if let TestBody::Malformed(reason) = &spec.body {
        return TestResult::failed(spec.name.clone(), reason.clone(), 0);
    }

    let body = spec.body.clone();
    let timeout = options.timeout;
    let (tx, rx) = std_mpsc::channel();

    let spawned = std::thread::Builder::new()
        .name("selftest-body".into())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || {
            let start = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_body(&body, timeout)))
                .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
            let _ = tx.send((outcome, start.elapsed()));
        });

    if let Err(e) = spawned {
        return TestResult::failed(
            spec.name.clone(),
            format!("failed to start test worker: {}", e),
            0,
        );
    }

    match rx.recv() {
        Ok((Ok(()), elapsed)) => TestResult::passed(spec.name.clone(), millis(elapsed)),
        Ok((Err(message), elapsed)) => {
            TestResult::failed(spec.name.clone(), message, millis(elapsed))
        }
        Err(_) => TestResult::failed(spec.name.clone(), "test worker exited unexpectedly", 0),
    }
}

fn run_body(body: &TestBody, timeout: Option<Duration>) -> Result<(), String> {
    match body {
        TestBody::Script(code) => {
            let mut interp =
                Interpreter::new().with_stack_budget(WORKER_STACK_SIZE - STACK_MARGIN);
            if let Some(limit) = timeout {
                interp = interp.with_timeout(limit);
            }
            interp.define_global("expect", script_binding());
            interp.run(code).map_err(|fault| fault.to_string())
        }
        TestBody::Native(f) => f(factory).map_err(|e| format!("{:#}", e)),
        TestBody::Malformed(reason) => Err(reason.clone()),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("test panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("test panicked: {}", s)
    } else {
        "test panicked".to_string()
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::TestStatus;
    use crate::script::Value;

    fn statuses(report: &Report) -> Vec<(&str, TestStatus, Option<&str>)> {
        report
            .tests
            .iter()
            .map(|t| (t.name(), t.status(), t.error()))
            .collect()
    }

    #[test]
    fn script_bodies_pass_and_fail() {
        let specs = vec![
            TestSpec::script("a", "expect(1).toBe(1)"),
            TestSpec::script("b", "expect(1).toBe(2)"),
        ];
        let report = run(&specs, &EngineOptions::default());
        assert_eq!(
            statuses(&report),
            vec![
                ("a", TestStatus::Passed, None),
                ("b", TestStatus::Failed, Some("Expected 1 toBe 2")),
            ]
        );
        assert_eq!(report.summary.total, 2);
    }

    #[test]
    fn failure_stops_only_the_failing_body() {
        let specs = vec![TestSpec::script(
            "stops",
            "expect(1).toBe(2)\nthrow new Error('not reached')",
        )];
        let report = run(&specs, &EngineOptions::default());
        assert_eq!(report.tests[0].error(), Some("Expected 1 toBe 2"));
    }

    #[test]
    fn native_bodies_get_the_factory() {
        let specs = vec![
            TestSpec::native("ok", |expect| {
                expect(Value::from(2 + 2)).to_be(4)?;
                Ok(())
            }),
            TestSpec::native("err", |expect| {
                expect(Value::from("x")).to_be_falsy()?;
                Ok(())
            }),
            TestSpec::native("panics", |_| panic!("kaboom")),
        ];
        let report = run(&specs, &EngineOptions::default());
        assert_eq!(
            statuses(&report),
            vec![
                ("ok", TestStatus::Passed, None),
                ("err", TestStatus::Failed, Some("Expected \"x\" toBeFalsy")),
                ("panics", TestStatus::Failed, Some("test panicked: kaboom")),
            ]
        );
    }

    #[test]
    fn malformed_specs_fail_without_running() {
        let report = run(
            &[TestSpec::malformed("m", "test entry is missing \"code\"")],
            &EngineOptions::default(),
        );
        assert_eq!(report.tests[0].error(), Some("test entry is missing \"code\""));
        assert_eq!(report.tests[0].duration_ms(), 0);
    }

    #[test]
    fn events_follow_input_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let specs = vec![TestSpec::script("x", ""), TestSpec::script("y", "nope()")];
        run_with_events(&specs, &EngineOptions::default(), Some(&tx));
        drop(tx);

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(match event {
                TestEvent::RunStarted { total } => format!("start {}", total),
                TestEvent::TestStarted { index, .. } => format!("begin {}", index),
                TestEvent::TestFinished { index, result } => {
                    format!("end {} {:?}", index, result.status())
                }
                TestEvent::RunFinished { summary } => format!("done {}", summary.failed),
            });
        }
        assert_eq!(
            seen,
            vec![
                "start 2",
                "begin 0",
                "end 0 Passed",
                "begin 1",
                "end 1 Failed",
                "done 1"
            ]
        );
    }

    #[test]
    fn timeout_fails_only_the_slow_test() {
        let specs = vec![
            TestSpec::script("spin", "while (true) {}"),
            TestSpec::script("after", "expect(true).toBeTruthy()"),
        ];
        let report = run(&specs, &EngineOptions::with_timeout_ms(50));
        assert_eq!(
            statuses(&report),
            vec![
                (
                    "spin",
                    TestStatus::Failed,
                    Some("test exceeded timeout of 50ms")
                ),
                ("after", TestStatus::Passed, None),
            ]
        );
        assert!(report.tests[0].duration_ms() >= 50);
    }
}
