use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use thiserror::Error;

/// Step of the bootstrap run that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    UnsupportedScheme,
    ExistenceCheck,
    Create,
    Migrate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::UnsupportedScheme => "unsupported-scheme",
            Stage::ExistenceCheck => "existence-check",
            Stage::Create => "create",
            Stage::Migrate => "migrate",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Classified cause of a failed stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FailureReason {
    #[error("unparseable connection URL: {0}")]
    UnparseableUrl(String),
    #[error("missing database name")]
    MissingDatabaseName,
    #[error("unsupported database scheme: {0}")]
    UnsupportedScheme(String),
    #[error("connection refused")]
    ConnectionRefused,
    #[error("authentication failed")]
    AuthFailure,
    #[error("permission denied")]
    PermissionDenied,
    #[error("backend error: {0}")]
    Backend(String),
    #[error("migration tool '{0}' not found")]
    ExecutableNotFound(String),
    #[error("migration tool exited with {}", exit_code_display(.exit_code))]
    MigrationError { exit_code: Option<i32> },
    #[error("migration tool timed out after {0:?}")]
    Timeout(Duration),
}

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl FailureReason {
    /// Short machine-usable classification.
    ///
    /// An unsupported scheme reports the raw scheme string itself.
    pub fn code(&self) -> &str {
        match self {
            FailureReason::UnparseableUrl(_) => "unparseable-url",
            FailureReason::MissingDatabaseName => "missing-database-name",
            FailureReason::UnsupportedScheme(scheme) => scheme,
            FailureReason::ConnectionRefused => "connection-refused",
            FailureReason::AuthFailure => "auth-failure",
            FailureReason::PermissionDenied => "permission-denied",
            FailureReason::Backend(_) => "backend-error",
            FailureReason::ExecutableNotFound(_) => "executable-not-found",
            FailureReason::MigrationError { .. } => "migration-error",
            FailureReason::Timeout(_) => "timeout",
        }
    }
}

/// A stage failure: the error half of a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {reason}")]
pub struct BootstrapFailure {
    pub stage: Stage,
    pub reason: FailureReason,
}

impl BootstrapFailure {
    pub fn new(stage: Stage, reason: FailureReason) -> Self {
        Self { stage, reason }
    }
}

/// Problems loading settings. Raised before any bootstrap stage runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("failed to resolve project directory: {0}")]
    ProjectDir(#[from] std::io::Error),
}
