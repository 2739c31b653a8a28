use crate::{
    app::App,
    models::{Summary, TestResult, TestStatus},
};

/// Events streamed from the engine to the presentation side.
#[derive(Debug, Clone)]
pub enum TestEvent {
    RunStarted {
        total: usize,
    },
    TestStarted {
        index: usize,
        name: String,
    },
    TestFinished {
        index: usize,
        result: TestResult,
    },
    RunFinished {
        summary: Summary,
    },
}

/// Fold an engine event into the app state.
pub fn handle_test_event(app: &mut App, event: TestEvent) {
    match event {
        TestEvent::RunStarted { total } => {
            app.progress_total = total;
            app.progress_done = 0;
            app.passed = 0;
            app.failed = 0;
            app.summary = None;
            app.current = None;
            app.running = true;
        }

        TestEvent::TestStarted { name, .. } => {
            app.current = Some(name);
        }

        TestEvent::TestFinished { result, .. } => {
            app.progress_done += 1;
            match result.status() {
                TestStatus::Passed => app.passed += 1,
                TestStatus::Failed => app.failed += 1,
            }
            app.current = None;
            app.finished.push_back(result);
        }

        TestEvent::RunFinished { summary } => {
            app.running = false;
            app.summary = Some(summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_progress_and_outcomes() {
        let mut app = App::new();
        handle_test_event(&mut app, TestEvent::RunStarted { total: 2 });
        assert!(app.running);

        handle_test_event(
            &mut app,
            TestEvent::TestStarted {
                index: 0,
                name: "a".into(),
            },
        );
        assert_eq!(app.current.as_deref(), Some("a"));

        handle_test_event(
            &mut app,
            TestEvent::TestFinished {
                index: 0,
                result: TestResult::failed("a", "boom", 1),
            },
        );
        assert_eq!((app.progress_done, app.passed, app.failed), (1, 0, 1));
        assert_eq!(app.finished.len(), 1);
        assert_eq!(app.current, None);

        let summary = Summary {
            total: 1,
            passed: 0,
            failed: 1,
            duration_ms: 1,
        };
        handle_test_event(&mut app, TestEvent::RunFinished { summary });
        assert!(!app.running);
        assert_eq!(app.summary, Some(summary));
    }
}
