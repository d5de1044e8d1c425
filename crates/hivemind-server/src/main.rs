use std::io;
use std::path::PathBuf;

use clap::Parser;
use hivemind_metrics::ObserveConfig;
use hivemind_server::logging::init_logging;
use hivemind_server::run_server;

#[derive(Parser, Debug, Clone)]
#[command(name = "hivemind-server")]
#[command(about = "Hivemind observability HTTP server")]
#[command(version)]
struct Cli {
    /// Enable debug mode
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Server port
    #[arg(long, env = "PORT", default_value = "8090")]
    port: u16,

    /// SQLite database file
    #[arg(long, env = "HIVEMIND_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Log level (overrides debug flag)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    match &cli.log_level {
        Some(level) => env_logger::Builder::new().parse_filters(level).init(),
        None => init_logging(cli.debug),
    }

    let mut config = ObserveConfig::from_env();
    if let Some(db_path) = cli.db_path {
        config = config.with_db_path(db_path);
    }

    log::info!("Starting Hivemind observability server on port {}", cli.port);
    if cli.debug {
        log::debug!("Configuration: {:?}", config);
    }

    run_server(cli.port, config).await
}
