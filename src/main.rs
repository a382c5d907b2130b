use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;

use vigil_core::events::DashboardEvent;
use vigil_gateway::discord::DiscordGatewayFactory;
use vigil_store::Database;
use vigil_supervisor::BotSupervisor;
use vigil_telemetry::TelemetryConfig;

#[derive(Parser)]
#[command(name = "vigil", about = "Discord bot connection supervisor with live dashboard")]
struct Cli {
    /// Port for the HTTP + WebSocket server.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Directory holding the databases. Defaults to ~/.vigil.
    #[arg(long)]
    db_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let db_dir = cli.db_dir.unwrap_or_else(|| dirs_home().join(".vigil"));
    std::fs::create_dir_all(&db_dir).expect("Failed to create database directory");

    let _telemetry = vigil_telemetry::init_telemetry(TelemetryConfig {
        log_db_path: db_dir.join("logs.db"),
        ..Default::default()
    });

    tracing::info!("Starting vigil");

    let db_path = db_dir.join("vigil.db");
    let db = Database::open(&db_path).expect("Failed to open database");
    tracing::info!(path = %db_path.display(), "Database opened");

    let (event_tx, _) = broadcast::channel::<DashboardEvent>(1024);

    let factory = Arc::new(DiscordGatewayFactory::default());
    let supervisor = BotSupervisor::new(db.clone(), factory, event_tx);

    let config = vigil_server::ServerConfig {
        port: cli.port,
        ..Default::default()
    };
    let handle = vigil_server::start(config, db, supervisor)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "vigil ready");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
