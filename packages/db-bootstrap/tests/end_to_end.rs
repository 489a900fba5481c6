//! Real migration tool and real admin connection, no fakes on the hot path.

mod support;

use std::time::Duration;

use db_bootstrap::{
    BootstrapOutcome, Bootstrapper, FailureReason, MigrationToolConfig, PgAdmin, Settings, Stage,
    ToolMigrationRunner,
};
use support::{FakeAdmin, RecordingReporter};

#[cfg(unix)]
mod unix {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    fn project_with_tool(body: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("venv").join("bin");
        fs::create_dir_all(&bin).unwrap();
        let tool = bin.join("alembic");
        fs::write(&tool, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        dir
    }

    fn settings_for(dir: &TempDir, url: &str, timeout: Duration) -> Settings {
        Settings {
            database_url: url.to_string(),
            project_dir: dir.path().to_path_buf(),
            migration: MigrationToolConfig {
                timeout,
                ..MigrationToolConfig::default()
            },
        }
    }

    #[tokio::test]
    #[serial]
    async fn sqlite_bootstrap_runs_project_tool() {
        bootstrap_test_support::logging::init();
        let dir = project_with_tool("touch migrated.marker\necho 'upgrade ok'");
        let settings = settings_for(&dir, "sqlite:///./snake_game.db", Duration::from_secs(10));

        let admin = FakeAdmin::absent();
        let b = Bootstrapper::new(
            admin.clone(),
            ToolMigrationRunner::new(settings.migration.clone()),
            RecordingReporter::default(),
        );
        let outcome = b.run(&settings).await;

        assert_eq!(outcome, BootstrapOutcome::Success);
        assert!(dir.path().join("migrated.marker").exists());
        assert_eq!(admin.exists_calls(), 0);
    }

    #[tokio::test]
    #[serial]
    async fn hanging_tool_fails_with_timeout() {
        bootstrap_test_support::logging::init();
        let dir = project_with_tool("echo 'waiting for lock' >&2\nexec sleep 30");
        let settings = settings_for(&dir, "sqlite:///./snake_game.db", Duration::from_secs(1));

        let b = Bootstrapper::new(
            FakeAdmin::absent(),
            ToolMigrationRunner::new(settings.migration.clone()),
            RecordingReporter::default(),
        );
        let outcome = b.run(&settings).await;

        assert_eq!(
            outcome,
            BootstrapOutcome::Failure {
                stage: Stage::Migrate,
                reason: FailureReason::Timeout(Duration::from_secs(1)),
            }
        );
        let rendered = b.reporter().rendered();
        assert!(rendered.contains("waiting for lock"), "{rendered}");
    }
}

#[tokio::test]
async fn unreachable_server_fails_existence_check() {
    bootstrap_test_support::logging::init();
    // Port 1 on loopback has no listener.
    let settings = Settings {
        database_url: "postgresql://postgres:pw@127.0.0.1:1/snake_game".to_string(),
        project_dir: std::env::temp_dir(),
        migration: MigrationToolConfig {
            program: "definitely-not-a-migration-tool-4242".to_string(),
            ..MigrationToolConfig::default()
        },
    };

    let b = Bootstrapper::new(
        PgAdmin::new().with_acquire_timeout(Duration::from_secs(2)),
        ToolMigrationRunner::new(settings.migration.clone()),
        RecordingReporter::default(),
    );
    let outcome = b.run(&settings).await;

    assert_eq!(
        outcome,
        BootstrapOutcome::Failure {
            stage: Stage::ExistenceCheck,
            reason: FailureReason::ConnectionRefused,
        }
    );
    assert!(!b.reporter().kinds().contains(&"migrations_started".to_string()));
}
