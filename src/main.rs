use std::process::ExitCode;
use std::sync::Arc;

use tabletop_recs::config::{LoggingSettings, Settings};
use tabletop_recs::core::Recommender;
use tabletop_recs::routes::ToolRegistry;
use tabletop_recs::server::{encode_response, startup_error, Shutdown, ToolServer};
use tabletop_recs::services::{CatalogStore, PostgresStore};
use tokio::io::{self, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber; stdout is reserved for protocol lines
fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    match logging.format.as_str() {
        "json" => subscriber.json().init(),
        "pretty" => subscriber.pretty().init(),
        _ => subscriber.compact().init(),
    }
}

/// Write the single fatal error line before exiting
async fn emit_startup_error(message: &str) {
    let Ok(line) = encode_response(&startup_error(message)) else {
        return;
    };

    let mut stdout = io::stdout();
    let written = async {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await
    };
    if let Err(e) = written.await {
        error!("Failed to write startup error: {}", e);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(&LoggingSettings::default());
            error!("Failed to load configuration: {}", e);
            emit_startup_error("Configuration error").await;
            return ExitCode::from(2);
        }
    };

    init_logging(&settings.logging);
    info!("Starting tabletop-recs tool server...");

    if let Err(e) = settings.database.require_credentials() {
        error!("{}", e);
        emit_startup_error("Database credentials not set").await;
        return ExitCode::from(2);
    }

    let store = match PostgresStore::from_settings(&settings.database).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to connect to PostgreSQL: {}", e);
            emit_startup_error("Database unavailable").await;
            return ExitCode::from(1);
        }
    };

    match store.health_check().await {
        Ok(true) => info!("Database connection established"),
        Ok(false) | Err(_) => {
            error!("PostgreSQL health check failed");
            emit_startup_error("Database unavailable").await;
            store.close().await;
            return ExitCode::from(1);
        }
    }

    let store: Arc<dyn CatalogStore> = store;
    let recommender = Recommender::new(store);
    let registry = ToolRegistry::standard();
    let server = ToolServer::new(&registry, &recommender);

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let outcome = server
        .serve_until(BufReader::new(io::stdin()), io::stdout(), interrupted)
        .await;

    recommender.close().await;
    info!("Database connection closed");

    match outcome {
        Ok(Shutdown::InputClosed(handled)) => {
            info!("Handled {} requests", handled);
            ExitCode::SUCCESS
        }
        Ok(Shutdown::Interrupted) => {
            info!("Interrupted, shutting down");
            // The pending stdin read sits on the blocking pool and would
            // hold up runtime shutdown until the next line arrives
            std::process::exit(0)
        }
        Err(e) => {
            error!("Transport failure: {}", e);
            ExitCode::from(1)
        }
    }
}
