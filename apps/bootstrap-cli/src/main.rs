use std::path::PathBuf;

use clap::Parser;
use db_bootstrap::config::settings::parse_timeout_secs;
use db_bootstrap::{Bootstrapper, ConsoleReporter, PgAdmin, Settings, ToolMigrationRunner};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bootstrap-db")]
#[command(about = "Create the database if needed and apply all migrations")]
struct Args {
    /// Connection URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Project root the migration tool runs in (overrides BOOTSTRAP_PROJECT_DIR)
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Migration tool executable name (overrides MIGRATION_TOOL)
    #[arg(long)]
    migration_tool: Option<String>,

    /// Migration timeout in seconds (overrides MIGRATION_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("db_bootstrap=info,bootstrap_db=info,sqlx=warn,sea_orm=warn")
    });

    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .without_time()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_env_filter(filter)
        .init();
}

fn load_settings(args: Args) -> Result<Settings, db_bootstrap::ConfigError> {
    let mut settings = Settings::from_env()?;

    if let Some(url) = args.database_url {
        settings.database_url = url;
    }
    if let Some(dir) = args.project_dir {
        settings.project_dir = dir;
    }
    if let Some(program) = args.migration_tool {
        settings.migration.program = program;
    }
    if let Some(secs) = args.timeout_secs {
        settings.migration.timeout = parse_timeout_secs("--timeout-secs", &secs)?;
    }
    Ok(settings)
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args = Args::parse();

    let settings = match load_settings(args) {
        Ok(settings) => settings,
        Err(e) => {
            error!("❌ {e}");
            std::process::exit(1);
        }
    };

    let bootstrapper = Bootstrapper::new(
        PgAdmin::new(),
        ToolMigrationRunner::new(settings.migration.clone()),
        ConsoleReporter::new(),
    );

    let outcome = bootstrapper.run(&settings).await;
    std::process::exit(outcome.exit_code());
}
