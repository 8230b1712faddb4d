use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutcomeKind {
    Log,
    Result,
    Error,
}

/// One captured line of output from a single adapter invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub kind: OutcomeKind,
    pub content: String,
}

impl ExecutionOutcome {
    pub fn log(content: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Log,
            content: content.into(),
        }
    }

    pub fn result(content: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Result,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Error,
            content: content.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == OutcomeKind::Error
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("RuntimeError: {0}")]
    Runtime(String),

    #[error("SinkUnavailable: the {0} interpreter has not been booted")]
    SinkUnavailable(&'static str),

    #[error("TimeoutError: execution exceeded {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("SpawnError: failed to spawn '{}': {source}", .program.to_string_lossy())]
    Spawn {
        program: PathBuf,

        #[source]
        source: std::io::Error,
    },

    #[error("ProtocolError: {0}")]
    Protocol(String),
}

impl From<ExecutionError> for ExecutionOutcome {
    fn from(e: ExecutionError) -> Self {
        ExecutionOutcome::error(e.to_string())
    }
}

/// Classifies an `error` line produced by an interpreter driver.
pub fn classify_error_line(content: &str) -> &'static str {
    match content.split_once(':').map(|(name, _)| name.trim()) {
        Some("SyntaxError" | "IndentationError" | "TabError") => "SyntaxError",
        Some("SinkUnavailable") => "SinkUnavailable",
        _ => "RuntimeError",
    }
}
