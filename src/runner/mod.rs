pub mod engine;
pub mod subprocess;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::app::TestEvent;
use crate::config::WrapperConfig;
use crate::models::{Report, TestSpec};

pub use engine::EngineOptions;
pub use subprocess::SubprocessRunner;

/// Something that can turn a list of specs into a report.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run all specs in order, streaming progress over `events` when given.
    async fn run(
        &self,
        specs: Vec<TestSpec>,
        events: Option<mpsc::UnboundedSender<TestEvent>>,
    ) -> Result<Report>;

    /// Display name for this runner (e.g., "in-process").
    fn name(&self) -> &str;
}

/// Runs the engine in this process on a blocking worker thread.
pub struct InProcessRunner {
    options: EngineOptions,
}

impl InProcessRunner {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl TestRunner for InProcessRunner {
    async fn run(
        &self,
        specs: Vec<TestSpec>,
        events: Option<mpsc::UnboundedSender<TestEvent>>,
    ) -> Result<Report> {
        let options = self.options;
        tokio::task::spawn_blocking(move || {
            engine::run_with_events(&specs, &options, events.as_ref())
        })
        .await
        .context("test engine task failed")
    }

    fn name(&self) -> &str {
        "in-process"
    }
}

/// Construct the runner for this invocation.
pub fn select(
    subprocess: bool,
    options: EngineOptions,
    wrapper: &WrapperConfig,
    dev: bool,
) -> Arc<dyn TestRunner> {
    if subprocess {
        Arc::new(SubprocessRunner::new(wrapper, options, dev))
    } else {
        Arc::new(InProcessRunner::new(options))
    }
}
