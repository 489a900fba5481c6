//! Fakes for driving the bootstrap controller without a server or a
//! migration tool. Every fake counts its calls so tests can assert what was
//! (and was not) invoked.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use db_bootstrap::{
    BootstrapEvent, ConnectionDescriptor, CreateOutcome, DatabaseAdmin, FailureReason,
    MigrationFailure, MigrationOutput, MigrationRunner, MigrationToolConfig, Reporter, Settings,
};

pub fn settings(url: &str) -> Settings {
    Settings {
        database_url: url.to_string(),
        project_dir: PathBuf::from("/srv/project"),
        migration: MigrationToolConfig::default(),
    }
}

struct FakeAdminState {
    exists: Result<bool, FailureReason>,
    create: Result<CreateOutcome, FailureReason>,
    exists_calls: AtomicUsize,
    create_calls: AtomicUsize,
    seen: Mutex<Vec<(String, String)>>,
}

#[derive(Clone)]
pub struct FakeAdmin {
    state: Arc<FakeAdminState>,
}

impl FakeAdmin {
    pub fn new(
        exists: Result<bool, FailureReason>,
        create: Result<CreateOutcome, FailureReason>,
    ) -> Self {
        Self {
            state: Arc::new(FakeAdminState {
                exists,
                create,
                exists_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn absent() -> Self {
        Self::new(Ok(false), Ok(CreateOutcome::Created))
    }

    pub fn present() -> Self {
        Self::new(Ok(true), Ok(CreateOutcome::Created))
    }

    pub fn exists_calls(&self) -> usize {
        self.state.exists_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.state.create_calls.load(Ordering::SeqCst)
    }

    /// `(host:port, database)` pairs seen by either operation.
    pub fn seen(&self) -> Vec<(String, String)> {
        self.state.seen.lock().unwrap().clone()
    }

    fn record(&self, target: &ConnectionDescriptor, name: &str) {
        self.state
            .seen
            .lock()
            .unwrap()
            .push((target.server_address(), name.to_string()));
    }
}

#[async_trait]
impl DatabaseAdmin for FakeAdmin {
    async fn database_exists(
        &self,
        target: &ConnectionDescriptor,
        name: &str,
    ) -> Result<bool, FailureReason> {
        self.state.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.record(target, name);
        self.state.exists.clone()
    }

    async fn create_database(
        &self,
        target: &ConnectionDescriptor,
        name: &str,
    ) -> Result<CreateOutcome, FailureReason> {
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        self.record(target, name);
        self.state.create.clone()
    }
}

struct FakeMigratorState {
    result: Result<MigrationOutput, MigrationFailure>,
    calls: AtomicUsize,
    dirs: Mutex<Vec<PathBuf>>,
}

#[derive(Clone)]
pub struct FakeMigrator {
    state: Arc<FakeMigratorState>,
}

pub fn output(code: i32, stdout: &str, stderr: &str) -> MigrationOutput {
    MigrationOutput {
        program: PathBuf::from("/srv/project/venv/bin/alembic"),
        status_code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

impl FakeMigrator {
    pub fn new(result: Result<MigrationOutput, MigrationFailure>) -> Self {
        Self {
            state: Arc::new(FakeMigratorState {
                result,
                calls: AtomicUsize::new(0),
                dirs: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Ok(output(0, "INFO  Running upgrade -> head", "")))
    }

    pub fn exiting_with(code: i32) -> Self {
        Self::new(Err(MigrationFailure {
            reason: FailureReason::MigrationError {
                exit_code: Some(code),
            },
            output: Some(output(code, "", "FAILED: Can't locate revision")),
        }))
    }

    pub fn timing_out() -> Self {
        Self::new(Err(MigrationFailure {
            reason: FailureReason::Timeout(Duration::from_secs(60)),
            output: None,
        }))
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        self.state.dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl MigrationRunner for FakeMigrator {
    async fn run(&self, project_dir: &Path) -> Result<MigrationOutput, MigrationFailure> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .dirs
            .lock()
            .unwrap()
            .push(project_dir.to_path_buf());
        self.state.result.clone()
    }
}

/// Records event kinds plus everything a console renderer could print.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
    rendered: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn kinds(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn rendered(&self) -> String {
        self.rendered.lock().unwrap().join("\n")
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &BootstrapEvent<'_>) {
        self.events.lock().unwrap().push(event.kind().to_string());
        self.rendered.lock().unwrap().push(format!("{event:?}"));
    }
}
