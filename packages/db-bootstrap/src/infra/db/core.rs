use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    Statement,
};
use tracing::{debug, info, warn};

use super::errors::{classify_db_err, DbErrorClass};
use super::{CreateOutcome, DatabaseAdmin};
use crate::descriptor::ConnectionDescriptor;
use crate::error::FailureReason;

/// Maintenance database every PostgreSQL server ships with.
pub const ADMIN_DATABASE: &str = "postgres";

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the administrative connection URL for `target`, pointed at
/// `database` instead of the bootstrap target.
pub fn admin_url(target: &ConnectionDescriptor, database: &str) -> String {
    format!(
        "postgresql://{}:{}@{}/{}",
        utf8_percent_encode(&target.user, NON_ALPHANUMERIC),
        utf8_percent_encode(&target.password, NON_ALPHANUMERIC),
        target.server_address(),
        utf8_percent_encode(database, NON_ALPHANUMERIC),
    )
}

/// Quote a PostgreSQL identifier, doubling embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Map the result of a `CREATE DATABASE` to the creator's contract.
pub(crate) fn create_outcome(result: Result<(), DbErr>) -> Result<CreateOutcome, FailureReason> {
    match result {
        Ok(()) => Ok(CreateOutcome::Created),
        Err(e) => match classify_db_err(&e) {
            DbErrorClass::DuplicateDatabase => {
                debug!(raw_error = %e, "create raced with another creator");
                Ok(CreateOutcome::AlreadyExisted)
            }
            class => {
                debug!(raw_error = %e, class = ?class, "create failed");
                Err(class.into_reason(&e))
            }
        },
    }
}

fn failure_reason(e: &DbErr) -> FailureReason {
    let class = classify_db_err(e);
    debug!(raw_error = %e, class = ?class, "admin connection error");
    class.into_reason(e)
}

/// [`DatabaseAdmin`] for PostgreSQL via SeaORM.
#[derive(Debug, Clone)]
pub struct PgAdmin {
    admin_database: String,
    acquire_timeout: Duration,
}

impl Default for PgAdmin {
    fn default() -> Self {
        Self::new()
    }
}

impl PgAdmin {
    pub fn new() -> Self {
        Self {
            admin_database: ADMIN_DATABASE.to_string(),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    async fn connect(&self, target: &ConnectionDescriptor) -> Result<DatabaseConnection, DbErr> {
        let mut opt = ConnectOptions::new(admin_url(target, &self.admin_database));
        opt.min_connections(1)
            .max_connections(1)
            .connect_timeout(self.acquire_timeout)
            .acquire_timeout(self.acquire_timeout)
            .sqlx_logging(false);

        debug!(
            server = %target.server_address(),
            user = %target.user,
            database = %self.admin_database,
            "opening admin connection"
        );
        Database::connect(opt).await
    }
}

async fn close(conn: DatabaseConnection) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "failed to close admin connection");
    }
}

#[async_trait]
impl DatabaseAdmin for PgAdmin {
    async fn database_exists(
        &self,
        target: &ConnectionDescriptor,
        name: &str,
    ) -> Result<bool, FailureReason> {
        let conn = self.connect(target).await.map_err(|e| failure_reason(&e))?;

        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "SELECT 1 FROM pg_database WHERE datname = $1",
            vec![name.into()],
        );
        let row = conn.query_one(stmt).await;
        close(conn).await;

        let exists = row.map_err(|e| failure_reason(&e))?.is_some();
        info!(database = name, exists, "existence_check=done");
        Ok(exists)
    }

    async fn create_database(
        &self,
        target: &ConnectionDescriptor,
        name: &str,
    ) -> Result<CreateOutcome, FailureReason> {
        let conn = self.connect(target).await.map_err(|e| failure_reason(&e))?;

        let stmt = Statement::from_string(
            DatabaseBackend::Postgres,
            format!("CREATE DATABASE {}", quote_ident(name)),
        );
        let result = conn.execute(stmt).await.map(|_| ());
        close(conn).await;

        let outcome = create_outcome(result)?;
        info!(database = name, outcome = ?outcome, "create=done");
        Ok(outcome)
    }
}
