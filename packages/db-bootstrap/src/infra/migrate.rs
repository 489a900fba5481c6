//! External migration tool invocation.
//!
//! The tool is resolved from the project first (e.g. `venv/bin/alembic`) and
//! then from `PATH`. It runs with the project directory as its working
//! directory under a wall-clock timeout; on expiry the child is killed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::settings::MigrationToolConfig;
use crate::error::FailureReason;

/// Captured result of one migration tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutput {
    pub program: PathBuf,
    /// `None` when the process was ended by a signal.
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct MigrationFailure {
    pub reason: FailureReason,
    /// Present whenever the tool was started, including on timeout.
    pub output: Option<MigrationOutput>,
}

impl MigrationFailure {
    fn without_output(reason: FailureReason) -> Self {
        Self {
            reason,
            output: None,
        }
    }
}

/// How long to wait for a pipe to reach EOF once the tool has exited or been
/// killed. A grandchild holding the pipe open would otherwise block forever.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Reads one child pipe in the background so that whatever was written before
/// a timeout is still available after the child is killed.
struct PipeCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl PipeCapture {
    fn start<P>(pipe: Option<P>) -> Self
    where
        P: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            }
        });
        Self { buf, task }
    }

    async fn finish(mut self) -> String {
        if tokio::time::timeout(PIPE_DRAIN_GRACE, &mut self.task)
            .await
            .is_err()
        {
            self.task.abort();
        }
        let text = match self.buf.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => String::new(),
        };
        text
    }
}

#[async_trait]
pub trait MigrationRunner: Send + Sync {
    /// Upgrade the schema to the latest version.
    async fn run(&self, project_dir: &Path) -> Result<MigrationOutput, MigrationFailure>;
}

/// [`MigrationRunner`] that shells out to a configured executable.
#[derive(Debug, Clone)]
pub struct ToolMigrationRunner {
    config: MigrationToolConfig,
}

impl ToolMigrationRunner {
    pub fn new(config: MigrationToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MigrationToolConfig {
        &self.config
    }

    /// Project-local copy first, then `PATH`.
    pub fn resolve_executable(&self, project_dir: &Path) -> Result<PathBuf, FailureReason> {
        let local = project_dir
            .join(&self.config.local_dir)
            .join(&self.config.program);
        if local.is_file() {
            return Ok(local);
        }

        which::which(&self.config.program)
            .map_err(|_| FailureReason::ExecutableNotFound(self.config.program.clone()))
    }
}

#[async_trait]
impl MigrationRunner for ToolMigrationRunner {
    async fn run(&self, project_dir: &Path) -> Result<MigrationOutput, MigrationFailure> {
        let program = self
            .resolve_executable(project_dir)
            .map_err(MigrationFailure::without_output)?;

        info!(
            program = %program.display(),
            args = ?self.config.args,
            cwd = %project_dir.display(),
            timeout_s = self.config.timeout.as_secs(),
            "migrate=start"
        );

        let mut cmd = Command::new(&program);
        cmd.args(&self.config.args)
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            error!(program = %program.display(), error = %e, "failed to spawn migration tool");
            let reason = match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    FailureReason::ExecutableNotFound(self.config.program.clone())
                }
                _ => FailureReason::MigrationError { exit_code: None },
            };
            MigrationFailure::without_output(reason)
        })?;

        let stdout = PipeCapture::start(child.stdout.take());
        let stderr = PipeCapture::start(child.stderr.take());

        let start = Instant::now();
        let waited = tokio::time::timeout(self.config.timeout, child.wait()).await;

        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                error!(error = %e, "I/O error waiting for migration tool");
                return Err(MigrationFailure::without_output(
                    FailureReason::MigrationError { exit_code: None },
                ));
            }
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill timed-out migration tool");
                }
                warn!(
                    elapsed_ms = start.elapsed().as_millis(),
                    "migrate=timeout child terminated"
                );
                return Err(MigrationFailure {
                    reason: FailureReason::Timeout(self.config.timeout),
                    output: Some(MigrationOutput {
                        program,
                        status_code: None,
                        stdout: stdout.finish().await,
                        stderr: stderr.finish().await,
                    }),
                });
            }
        };

        let captured = MigrationOutput {
            program,
            status_code: status.code(),
            stdout: stdout.finish().await,
            stderr: stderr.finish().await,
        };

        if !status.success() {
            warn!(
                status = ?captured.status_code,
                elapsed_ms = start.elapsed().as_millis(),
                "migrate=failed"
            );
            return Err(MigrationFailure {
                reason: FailureReason::MigrationError {
                    exit_code: captured.status_code,
                },
                output: Some(captured),
            });
        }

        info!(elapsed_ms = start.elapsed().as_millis(), "migrate=done");
        Ok(captured)
    }
}
