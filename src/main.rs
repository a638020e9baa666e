//! Transfer Ledger HTTP server
//!
//! ```text
//! transfer_ledger [--env <name>] [--port <u16>] [--migrate]
//! ```
//!
//! Reads `config/<env>.yaml` (default `dev`).

use transfer_ledger::config::AppConfig;
use transfer_ledger::db::Database;
use transfer_ledger::gateway::{self, AppState};
use transfer_ledger::logging;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn run_migrations() -> bool {
    std::env::args().any(|a| a == "--migrate")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        config.server.port = port;
    }

    let _guard = logging::init_logging(&config.logging);
    tracing::info!(
        env = %env,
        version = transfer_ledger::VERSION,
        isolation = %config.database.isolation,
        max_attempts = config.transfer.max_attempts,
        max_amount = %config.transfer.max_amount,
        "starting transfer ledger"
    );

    let db = Database::connect(&config.database).await?;
    if run_migrations() {
        db.migrate().await?;
    }

    let state = AppState::with_postgres(&db, &config);
    gateway::run_server(&config.server, state).await?;

    db.pool().close().await;
    Ok(())
}
