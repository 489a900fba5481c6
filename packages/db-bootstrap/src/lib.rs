//! Database bootstrap orchestration.
//! Brings a target database from an unknown state to "exists with all
//! migrations applied". Used by the `bootstrap-db` CLI.

pub mod bootstrap;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod infra;
pub mod report;

pub use bootstrap::{BootstrapOutcome, Bootstrapper};
pub use config::settings::{MigrationToolConfig, Settings};
pub use descriptor::{parse_connection_url, redacted_url, Backend, ConnectionDescriptor};
pub use error::{BootstrapFailure, ConfigError, FailureReason, Stage};
pub use infra::db::{CreateOutcome, DatabaseAdmin, PgAdmin};
pub use infra::migrate::{MigrationFailure, MigrationOutput, MigrationRunner, ToolMigrationRunner};
pub use report::{BootstrapEvent, ConsoleReporter, Reporter};
