use pretty_assertions::assert_eq;
use selftest::runner::engine;
use selftest::{EngineOptions, Report, Suite, TestSpec, TestStatus, Value};

fn run_script(tests: &[(&str, &str)]) -> Report {
    let specs: Vec<_> = tests
        .iter()
        .map(|(name, code)| TestSpec::script(*name, *code))
        .collect();
    engine::run(&specs, &EngineOptions::default())
}

fn outcomes(report: &Report) -> Vec<(String, TestStatus, Option<String>)> {
    report
        .tests
        .iter()
        .map(|t| (t.name().to_string(), t.status(), t.error().map(str::to_string)))
        .collect()
}

#[test]
fn passing_and_failing_tests_are_reported_in_order() {
    let report = run_script(&[("a", "expect(1).toBe(1)"), ("b", "expect(2).toBe(3)")]);

    assert_eq!(
        outcomes(&report),
        vec![
            ("a".to_string(), TestStatus::Passed, None),
            (
                "b".to_string(),
                TestStatus::Failed,
                Some("Expected 2 toBe 3".to_string())
            ),
        ]
    );
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.passed, 1);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.meta.framework, "selftest-core");
}

#[test]
fn empty_input_gives_an_empty_report() {
    let report = run_script(&[]);
    assert!(report.tests.is_empty());
    assert_eq!(report.summary.total, 0);
    assert_eq!(report.summary.passed, 0);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.duration_ms, 0);
}

#[test]
fn summary_agrees_with_results() {
    let report = run_script(&[
        ("one", "expect([1, 2]).toEqual([1, 2])"),
        ("two", "expect('x').toBeFalsy()"),
        ("three", "let n = 0\nfor (let i = 0; i < 100; i++) { n += i }\nexpect(n).toBe(4950)"),
        ("four", "throw new Error('broken')"),
    ]);

    let s = &report.summary;
    assert_eq!(s.total, report.tests.len());
    assert_eq!(s.passed + s.failed, s.total);
    assert_eq!(
        s.duration_ms,
        report.tests.iter().map(|t| t.duration_ms()).sum::<u64>()
    );
    for test in &report.tests {
        assert_eq!(test.error().is_some(), test.status() == TestStatus::Failed);
    }
    assert_eq!(report.tests[3].error(), Some("broken"));
}

#[test]
fn faults_are_contained_per_test() {
    let report = run_script(&[
        ("missing", "undefinedFn()"),
        ("syntax", "expect(1).toBe("),
        ("after", "expect(true).toBeTruthy()"),
    ]);

    assert_eq!(report.tests[0].error(), Some("undefinedFn is not defined"));
    assert_eq!(report.tests[1].status(), TestStatus::Failed);
    assert_eq!(report.tests[2].status(), TestStatus::Passed);
}

#[test]
fn zero_is_falsy() {
    let report = run_script(&[
        ("truthy", "expect(0).toBeTruthy()"),
        ("falsy", "expect(0).toBeFalsy()"),
    ]);
    assert_eq!(report.tests[0].error(), Some("Expected 0 toBeTruthy"));
    assert_eq!(report.tests[1].status(), TestStatus::Passed);
}

#[test]
fn to_equal_ignores_key_order_but_to_be_checks_identity() {
    let report = run_script(&[
        ("deep", "expect({ a: 1, b: [2] }).toEqual({ b: [2], a: 1 })"),
        ("identity", "expect({ a: 1 }).toBe({ a: 1 })"),
        ("same ref", "const o = { a: 1 }\nexpect(o).toBe(o)"),
    ]);
    assert_eq!(report.tests[0].status(), TestStatus::Passed);
    assert_eq!(report.tests[1].status(), TestStatus::Failed);
    assert_eq!(report.tests[2].status(), TestStatus::Passed);
}

#[test]
fn a_slow_test_times_out_without_stopping_the_run() {
    let specs = vec![
        TestSpec::script("spins", "while (true) {}"),
        TestSpec::script("next", "expect(1).toBe(1)"),
    ];
    let report = engine::run(&specs, &EngineOptions::with_timeout_ms(50));

    assert_eq!(report.tests[0].status(), TestStatus::Failed);
    assert_eq!(
        report.tests[0].error(),
        Some("test exceeded timeout of 50ms")
    );
    assert_eq!(report.tests[1].status(), TestStatus::Passed);
}

#[test]
fn malformed_entries_fail_in_place() {
    let specs = TestSpec::parse_list(
        r#"[
            {"name": "ok", "code": "expect(1).toBe(1)"},
            {"name": "no code"},
            {"code": "expect(1).toBe(1)"}
        ]"#,
    )
    .unwrap();
    let report = engine::run(&specs, &EngineOptions::default());

    assert_eq!(
        outcomes(&report),
        vec![
            ("ok".to_string(), TestStatus::Passed, None),
            (
                "no code".to_string(),
                TestStatus::Failed,
                Some("test entry is missing \"code\"".to_string())
            ),
            (
                "<unnamed test #3>".to_string(),
                TestStatus::Failed,
                Some("test entry is missing \"name\"".to_string())
            ),
        ]
    );
}

#[test]
fn suites_mix_script_and_native_bodies() {
    let mut suite = Suite::new();
    suite
        .selftest("script", "expect('ab'.toUpperCase()).toBe('AB')")
        .native("native", |expect| {
            expect(Value::from(vec![1, 2])).to_equal(vec![1, 2])?;
            expect(Value::from(0)).to_be_truthy()?;
            Ok(())
        });

    let report = suite.run(&EngineOptions::default());
    assert_eq!(report.tests[0].status(), TestStatus::Passed);
    assert_eq!(report.tests[1].error(), Some("Expected 0 toBeTruthy"));
}

#[test]
fn a_self_containing_array_does_not_take_down_the_run() {
    let report = run_script(&[
        ("cyclic", "const a = [1]\na.push(a)\nconst s = '' + a\nexpect(s).toBe('1,')"),
        ("thrown", "const b = [1]\nb.push(b)\nthrow b"),
        ("after", "expect(1).toBe(1)"),
    ]);

    assert_eq!(
        outcomes(&report),
        vec![
            ("cyclic".to_string(), TestStatus::Passed, None),
            ("thrown".to_string(), TestStatus::Failed, Some("1,".to_string())),
            ("after".to_string(), TestStatus::Passed, None),
        ]
    );
}

#[test]
fn recursion_runs_deep_and_runaway_recursion_fails_cleanly() {
    let report = run_script(&[
        (
            "deep",
            "function f(n) { return n === 0 ? 0 : 1 + f(n - 1) }\nexpect(f(1000)).toBe(1000)",
        ),
        ("runaway", "function g() { return g() }\ng()"),
        ("after", "expect(true).toBeTruthy()"),
    ]);

    assert_eq!(
        outcomes(&report),
        vec![
            ("deep".to_string(), TestStatus::Passed, None),
            (
                "runaway".to_string(),
                TestStatus::Failed,
                Some("Maximum call stack size exceeded".to_string())
            ),
            ("after".to_string(), TestStatus::Passed, None),
        ]
    );
}

#[test]
fn running_the_same_tests_twice_gives_the_same_outcomes() {
    let specs = vec![
        TestSpec::script("passes", "expect([1, { a: 2 }]).toEqual([1, { a: 2 }])"),
        TestSpec::script("asserts", "expect('x').toBe('y')"),
        TestSpec::script("references", "missingName + 1"),
        TestSpec::script("throws", "throw new TypeError('bad')"),
    ];

    let first = engine::run(&specs, &EngineOptions::default());
    let second = engine::run(&specs, &EngineOptions::default());

    assert_eq!(outcomes(&first), outcomes(&second));
    assert_eq!(
        outcomes(&first)
            .into_iter()
            .map(|(_, status, _)| status)
            .collect::<Vec<_>>(),
        vec![
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::Failed,
            TestStatus::Failed
        ]
    );
    assert_eq!(
        (first.summary.passed, first.summary.failed),
        (second.summary.passed, second.summary.failed)
    );
}
