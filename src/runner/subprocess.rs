//! Runs specs in a child engine process through the file contract:
//! specs go to a JSON file in the cache directory, the child is invoked as
//! `<engine> <tests file> [--dev] --json <result file>`, and the report is
//! read back from the result file.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::app::TestEvent;
use crate::config::WrapperConfig;
use crate::error::RunError;
use crate::models::{Report, TestBody, TestResult, TestSpec};

use super::{EngineOptions, TestRunner};

/// Guard that kills the child process (and its entire process group) on drop.
struct ChildGuard {
    child: Option<tokio::process::Child>,
    /// Process group ID saved at spawn time so we can kill the whole group.
    #[cfg(unix)]
    pgid: Option<u32>,
}

impl ChildGuard {
    fn new(child: tokio::process::Child) -> Self {
        #[cfg(unix)]
        let pgid = child.id();
        Self {
            child: Some(child),
            #[cfg(unix)]
            pgid,
        }
    }

    /// Wait for the child to exit; an exited child is not killed on drop.
    async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        let Some(child) = self.child.as_mut() else {
            return Err(std::io::Error::other("child already reaped"));
        };
        let status = child.wait().await?;
        self.child = None;
        #[cfg(unix)]
        {
            self.pgid = None;
        }
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
        }
        if let Some(ref mut child) = self.child {
            let _ = child.start_kill();
        }
    }
}

pub struct SubprocessRunner {
    command: String,
    cache_dir: PathBuf,
    keep_cache: bool,
    options: EngineOptions,
    dev: bool,
}

impl SubprocessRunner {
    pub fn new(wrapper: &WrapperConfig, options: EngineOptions, dev: bool) -> Self {
        Self {
            command: wrapper.command.clone(),
            cache_dir: wrapper.cache_dir.clone(),
            keep_cache: wrapper.keep_cache,
            options,
            dev,
        }
    }

    /// Program and leading arguments of the engine command.
    fn engine_command(&self) -> Result<(PathBuf, Vec<String>)> {
        let mut words = shell_words::split(&self.command)
            .with_context(|| format!("invalid engine command `{}`", self.command))?;
        if words.is_empty() {
            let exe = std::env::current_exe().context("failed to locate current executable")?;
            return Ok((exe, Vec::new()));
        }
        let program = PathBuf::from(words.remove(0));
        Ok((program, words))
    }

    /// Input document for the child. Malformed specs are written by name only;
    /// their original reason is restored after the run.
    fn input_document(specs: &[TestSpec]) -> Result<String, RunError> {
        let entries = specs
            .iter()
            .map(|spec| match &spec.body {
                TestBody::Native(_) => Err(RunError::NotSerializable(spec.name.clone())),
                TestBody::Malformed(_) => Ok(serde_json::json!({ "name": spec.name })),
                TestBody::Script(_) => Ok(serde_json::to_value(spec.to_wire())?),
            })
            .collect::<Result<Vec<_>, RunError>>()?;
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    fn temp_file(&self, prefix: &str) -> Result<tempfile::NamedTempFile> {
        tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".json")
            .tempfile_in(&self.cache_dir)
            .map_err(|source| RunError::io(&self.cache_dir, source))
            .context("failed to create cache file")
    }

    async fn spawn_and_wait(&self, tests_path: &Path, result_path: &Path) -> Result<()> {
        let (program, leading) = self.engine_command()?;

        let mut cmd = Command::new(&program);
        cmd.args(&leading).arg(tests_path);
        if self.dev {
            cmd.arg("--dev");
        }
        cmd.arg("--json").arg(result_path);
        if let Some(timeout) = self.options.timeout {
            cmd.arg("--timeout-ms").arg(timeout.as_millis().to_string());
        }

        debug!(command = ?cmd.as_std(), "spawning engine");

        // Own process group, so the guard can take down anything the engine forks.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.as_std_mut().process_group(0);
        }

        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| RunError::Subprocess(format!("failed to spawn {}: {}", program.display(), e)))?;

        let mut child_guard = ChildGuard::new(child);
        let status = child_guard
            .wait()
            .await
            .map_err(|e| RunError::Subprocess(format!("failed to wait for engine: {}", e)))?;
        if !status.success() {
            return Err(RunError::Subprocess(format!(
                "engine exited with code {}",
                status.code().unwrap_or(-1)
            ))
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl TestRunner for SubprocessRunner {
    async fn run(
        &self,
        specs: Vec<TestSpec>,
        events: Option<mpsc::UnboundedSender<TestEvent>>,
    ) -> Result<Report> {
        let document = Self::input_document(&specs)?;

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|source| RunError::io(&self.cache_dir, source))?;

        let stamp = chrono::Utc::now().timestamp_millis();
        let tests_file = self.temp_file(&format!("tests-{}-", stamp))?;
        let result_file = self.temp_file(&format!("result-{}-", stamp))?;
        let tests_path = tests_file.path().to_path_buf();
        let result_path = result_file.path().to_path_buf();

        tokio::fs::write(&tests_path, document)
            .await
            .map_err(|source| RunError::io(&tests_path, source))?;

        info!(tests = %tests_path.display(), "running tests in child process");
        self.spawn_and_wait(&tests_path, &result_path).await?;

        let text = tokio::fs::read_to_string(&result_path)
            .await
            .map_err(|source| RunError::io(&result_path, source))?;
        let mut report: Report = serde_json::from_str(&text).map_err(|source| RunError::Input {
            path: result_path.clone(),
            source,
        })?;

        if report.tests.len() != specs.len() {
            return Err(RunError::Subprocess(format!(
                "engine reported {} results for {} tests",
                report.tests.len(),
                specs.len()
            ))
            .into());
        }
        for (result, spec) in report.tests.iter_mut().zip(&specs) {
            if let TestBody::Malformed(reason) = &spec.body {
                *result = TestResult::failed(spec.name.clone(), reason.clone(), 0);
            }
        }

        if self.keep_cache {
            tests_file
                .keep()
                .context("failed to keep tests cache file")?;
            result_file
                .keep()
                .context("failed to keep result cache file")?;
        }

        if let Some(tx) = events {
            let _ = tx.send(TestEvent::RunStarted {
                total: report.tests.len(),
            });
            for (index, result) in report.tests.iter().enumerate() {
                let _ = tx.send(TestEvent::TestFinished {
                    index,
                    result: result.clone(),
                });
            }
            let _ = tx.send(TestEvent::RunFinished {
                summary: report.summary,
            });
        }

        Ok(report)
    }

    fn name(&self) -> &str {
        "subprocess"
    }
}
