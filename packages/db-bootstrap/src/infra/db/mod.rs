pub mod core;
pub mod errors;

use async_trait::async_trait;

use crate::descriptor::ConnectionDescriptor;
use crate::error::FailureReason;

pub use self::core::{admin_url, PgAdmin, ADMIN_DATABASE};
pub use self::errors::{classify_db_err, DbErrorClass};

/// Result of a create request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// Someone else created it first. Counts as success.
    AlreadyExisted,
}

/// Server-side database management for client/server backends.
///
/// Every call opens and closes its own administrative connection.
#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    /// Whether `name` exists on the server. Connection problems are errors,
    /// never a `false`.
    async fn database_exists(
        &self,
        target: &ConnectionDescriptor,
        name: &str,
    ) -> Result<bool, FailureReason>;

    /// Create `name`. A duplicate-database error resolves to
    /// [`CreateOutcome::AlreadyExisted`].
    async fn create_database(
        &self,
        target: &ConnectionDescriptor,
        name: &str,
    ) -> Result<CreateOutcome, FailureReason>;
}
