//! Bootstrap controller.
//!
//! `parse → [existence check → create] → migrate`, strictly forward. The first
//! failing stage ends the run and becomes the verdict. Nothing is rolled
//! back: a database created before a failed migration stays in place and the
//! next run resumes at "exists, migrate".

use std::path::Path;

use tracing::debug;

use crate::config::settings::Settings;
use crate::descriptor::{parse_connection_url, redacted_url, Backend, ConnectionDescriptor};
use crate::error::{BootstrapFailure, FailureReason, Stage};
use crate::infra::db::DatabaseAdmin;
use crate::infra::migrate::{MigrationOutput, MigrationRunner};
use crate::report::{BootstrapEvent, Reporter};

/// Verdict of one bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Success,
    Failure { stage: Stage, reason: FailureReason },
}

impl BootstrapOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BootstrapOutcome::Success)
    }

    /// Process exit status: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            BootstrapOutcome::Success => 0,
            BootstrapOutcome::Failure { .. } => 1,
        }
    }
}

impl From<Result<(), BootstrapFailure>> for BootstrapOutcome {
    fn from(result: Result<(), BootstrapFailure>) -> Self {
        match result {
            Ok(()) => BootstrapOutcome::Success,
            Err(BootstrapFailure { stage, reason }) => BootstrapOutcome::Failure { stage, reason },
        }
    }
}

pub struct Bootstrapper<A, M, R> {
    admin: A,
    migrator: M,
    reporter: R,
}

impl<A, M, R> Bootstrapper<A, M, R>
where
    A: DatabaseAdmin,
    M: MigrationRunner,
    R: Reporter,
{
    pub fn new(admin: A, migrator: M, reporter: R) -> Self {
        Self {
            admin,
            migrator,
            reporter,
        }
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Run the whole bootstrap once. Always reports `Finished` exactly once.
    pub async fn run(&self, settings: &Settings) -> BootstrapOutcome {
        self.reporter.report(&BootstrapEvent::Started {
            display_url: redacted_url(&settings.database_url),
        });

        let outcome = BootstrapOutcome::from(self.execute(settings).await);

        debug!(exit_code = outcome.exit_code(), "bootstrap=done");
        self.reporter
            .report(&BootstrapEvent::Finished { outcome: &outcome });
        outcome
    }

    async fn execute(&self, settings: &Settings) -> Result<(), BootstrapFailure> {
        let descriptor = match parse_connection_url(&settings.database_url) {
            Ok(descriptor) => descriptor,
            Err(reason) => return Err(self.fail(Stage::Parse, reason, None, None, None)),
        };
        debug!(backend = ?descriptor.backend, "bootstrap=parsed");

        match &descriptor.backend {
            Backend::Unsupported(scheme) => Err(self.fail(
                Stage::UnsupportedScheme,
                FailureReason::UnsupportedScheme(scheme.clone()),
                Some(&descriptor),
                None,
                None,
            )),
            Backend::Embedded => {
                self.reporter
                    .report(&BootstrapEvent::BackendDetected { descriptor: &descriptor });
                self.migrate(settings, &descriptor).await
            }
            Backend::ClientServer => {
                let Some(database) = descriptor.database.as_deref() else {
                    return Err(self.fail(
                        Stage::Parse,
                        FailureReason::MissingDatabaseName,
                        Some(&descriptor),
                        None,
                        None,
                    ));
                };
                self.reporter
                    .report(&BootstrapEvent::BackendDetected { descriptor: &descriptor });
                self.ensure_database(&descriptor, database).await?;
                self.migrate(settings, &descriptor).await
            }
        }
    }

    async fn ensure_database(
        &self,
        descriptor: &ConnectionDescriptor,
        database: &str,
    ) -> Result<(), BootstrapFailure> {
        let exists = self
            .admin
            .database_exists(descriptor, database)
            .await
            .map_err(|reason| {
                self.fail(Stage::ExistenceCheck, reason, Some(descriptor), None, None)
            })?;
        self.reporter
            .report(&BootstrapEvent::ExistenceChecked { database, exists });

        if exists {
            return Ok(());
        }

        let outcome = self
            .admin
            .create_database(descriptor, database)
            .await
            .map_err(|reason| self.fail(Stage::Create, reason, Some(descriptor), None, None))?;
        self.reporter
            .report(&BootstrapEvent::DatabaseCreated { database, outcome });
        Ok(())
    }

    async fn migrate(
        &self,
        settings: &Settings,
        descriptor: &ConnectionDescriptor,
    ) -> Result<(), BootstrapFailure> {
        self.reporter.report(&BootstrapEvent::MigrationsStarted);

        match self.migrator.run(&settings.project_dir).await {
            Ok(output) => {
                self.reporter
                    .report(&BootstrapEvent::MigrationsApplied { output: &output });
                Ok(())
            }
            Err(failure) => Err(self.fail(
                Stage::Migrate,
                failure.reason,
                Some(descriptor),
                failure.output.as_ref(),
                Some(settings.migration.local_dir.as_path()),
            )),
        }
    }

    fn fail(
        &self,
        stage: Stage,
        reason: FailureReason,
        descriptor: Option<&ConnectionDescriptor>,
        output: Option<&MigrationOutput>,
        tool_dir: Option<&Path>,
    ) -> BootstrapFailure {
        let failure = BootstrapFailure::new(stage, reason);
        self.reporter.report(&BootstrapEvent::Failed {
            failure: &failure,
            descriptor,
            output,
            tool_dir,
        });
        failure
    }
}
