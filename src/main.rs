use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use selftest::app::{App, TestEvent, handle_test_event};
use selftest::cli::Cli;
use selftest::error::{RunError, run_exit_code};
use selftest::runner;
use selftest::ui::Console;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env("SELFTEST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            let code = e.downcast_ref::<RunError>().map_or(3, RunError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let settings = cli.into_settings()?;
    let specs = settings.source.load(&settings.config.discovery)?;
    info!(tests = specs.len(), "loaded tests");

    let runner = runner::select(
        settings.subprocess,
        settings.options,
        &settings.config.wrapper,
        settings.dev,
    );
    debug!(runner = runner.name(), "selected runner");

    // In subprocess mode the child draws its own dev output.
    let draw = settings.dev && !settings.subprocess;
    let (events, console) = if draw {
        let (tx, rx) = mpsc::unbounded_channel();
        (Some(tx), Some(tokio::spawn(present(rx))))
    } else {
        (None, None)
    };

    let report = runner.run(specs, events).await?;
    let console = match console {
        Some(handle) => handle.await.context("console task failed")?,
        None => Console::new(),
    };

    match &settings.json {
        Some(path) => {
            report
                .write_to(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if settings.dev {
                console.wrote_results(path);
            }
        }
        None => println!("{}", report.to_json_pretty()?),
    }

    if draw {
        console.print_summary(&report.summary);
    }

    Ok(run_exit_code(report.has_failures(), settings.fail_on_error))
}

/// Draw engine events until the sender side is dropped.
async fn present(mut rx: mpsc::UnboundedReceiver<TestEvent>) -> Console {
    let mut app = App::new();
    let mut console = Console::new();
    while let Some(event) = rx.recv().await {
        handle_test_event(&mut app, event);
        console.draw(&mut app);
    }
    console
}
