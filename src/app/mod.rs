use std::collections::VecDeque;

use crate::models::{Summary, TestResult};

pub mod events;

pub use events::{TestEvent, handle_test_event};

/// Presentation-side view of a run, built from engine events.
#[derive(Debug, Default)]
pub struct App {
    pub running: bool,
    pub progress_total: usize,
    pub progress_done: usize,
    pub passed: usize,
    pub failed: usize,
    /// Name of the test currently executing.
    pub current: Option<String>,
    /// Results not yet drawn.
    pub finished: VecDeque<TestResult>,
    pub summary: Option<Summary>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }
}
