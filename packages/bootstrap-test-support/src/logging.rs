//! Tracing setup shared by the db-bootstrap test suites.

use once_cell::sync::Lazy;
use tracing_subscriber::{fmt, EnvFilter};

/// Applied when neither `TEST_LOG` nor `RUST_LOG` holds a valid directive.
/// Keeps the reporter's failure lines and driver warnings, drops the narration.
const DEFAULT_FILTER: &str = "db_bootstrap=warn,sqlx=warn,sea_orm=warn";

static SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = fmt()
        .with_env_filter(test_filter())
        .with_test_writer()
        .without_time()
        .compact()
        .try_init();
});

/// Install the test subscriber once per process. Every test may call this.
pub fn init() {
    Lazy::force(&SUBSCRIBER);
}

fn test_filter() -> EnvFilter {
    ["TEST_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init();
        init();
    }
}
