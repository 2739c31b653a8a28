use std::path::PathBuf;

use thiserror::Error;

/// Errors that end a run. Faults inside test bodies never become one of these;
/// they are recorded in the report instead.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Usage(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid test input {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("test '{0}' has a native body and cannot run in a child process")]
    NotSerializable(String),

    #[error("child process failed: {0}")]
    Subprocess(String),

    #[error("failed to discover tests: {0}")]
    Discovery(String),
}

impl RunError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Usage(_) => 2,
            _ => 3,
        }
    }
}

/// Process exit status for a finished run.
pub fn run_exit_code(has_failures: bool, fail_on_error: bool) -> u8 {
    u8::from(has_failures && fail_on_error)
}
