use std::path::Path;

use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::theme;
use crate::{
    app::App,
    models::{Summary, TestResult},
};

/// Dev-mode console output on stderr: a progress bar with one line per
/// finished test printed above it.
pub struct Console {
    bar: ProgressBar,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} RUNNING [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Bring the console up to date with `app`, draining finished results.
    pub fn draw(&mut self, app: &mut App) {
        self.bar.set_length(app.progress_total as u64);
        self.bar.set_position(app.progress_done as u64);
        self.bar.set_message(format!(
            "{} passed, {} failed {}",
            app.passed,
            app.failed,
            app.current.as_deref().unwrap_or_default()
        ));

        while let Some(result) = app.finished.pop_front() {
            let line = result_line(&result);
            self.bar.suspend(|| eprintln!("{}", line));
        }

        if !app.running && app.summary.is_some() {
            self.bar.finish_and_clear();
        }
    }

    pub fn wrote_results(&self, path: &Path) {
        eprintln!(
            "{}",
            format!("Wrote results to {}", path.display()).with(theme::YELLOW)
        );
    }

    pub fn print_summary(&self, summary: &Summary) {
        eprintln!("{}", summary_block(summary));
    }
}

/// `✔ name (3ms)`, or `✖ name (3ms)` followed by the indented error.
pub fn result_line(result: &TestResult) -> String {
    let status = result.status();
    let mut line = format!(
        "{} {} {}",
        status.icon().with(status.color()),
        result.name(),
        format!("({}ms)", result.duration_ms()).with(theme::OVERLAY0)
    );
    if let Some(error) = result.error() {
        line.push_str(&format!("\n  {}", error.with(theme::RED)));
    }
    line
}

pub fn summary_block(summary: &Summary) -> String {
    [
        format!("\n=== {} ===", "SUMMARY".bold()),
        format!("{}: {}", "Total".with(theme::BLUE), summary.total),
        format!("{}: {}", "Passed".with(theme::GREEN), summary.passed),
        format!("{}: {}", "Failed".with(theme::RED), summary.failed),
        format!("Duration: {} ms", summary.duration_ms)
            .with(theme::SUBTEXT0)
            .to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passed_line_has_name_and_duration() {
        let line = result_line(&TestResult::passed("adds", 3));
        assert!(line.contains("✔"));
        assert!(line.contains("adds"));
        assert!(line.contains("(3ms)"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn failed_line_carries_the_error() {
        let line = result_line(&TestResult::failed("breaks", "Expected 1 toBe 2", 0));
        assert!(line.contains("✖"));
        let (_, detail) = line.split_once('\n').unwrap();
        assert!(detail.starts_with("  "));
        assert!(detail.contains("Expected 1 toBe 2"));
    }

    #[test]
    fn summary_block_lists_counts() {
        let block = summary_block(&Summary {
            total: 3,
            passed: 2,
            failed: 1,
            duration_ms: 12,
        });
        assert!(block.contains("SUMMARY"));
        assert!(block.contains(": 3"));
        assert!(block.contains(": 2"));
        assert!(block.contains(": 1"));
        assert!(block.contains("Duration: 12 ms"));
    }

    #[test]
    fn draw_drains_finished_results() {
        let mut app = App::new();
        app.progress_total = 1;
        app.progress_done = 1;
        app.finished.push_back(TestResult::passed("a", 0));
        let mut console = Console {
            bar: ProgressBar::hidden(),
        };
        console.draw(&mut app);
        assert!(app.finished.is_empty());
    }
}
