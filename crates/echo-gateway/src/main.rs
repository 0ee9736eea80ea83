use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use echo_core::config::EchoConfig;
use echo_dispatch::{Dispatcher, HmacMediaResolver, ResendMailer};
use echo_store::DeliveryStore;

mod app;
mod auth;
mod http;

#[derive(Parser, Debug)]
#[command(name = "echo-gateway", about = "Echo delivery gateway")]
struct Args {
    /// Path to a config file (overrides ECHO_CONFIG and the default path).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "echo_gateway=info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();

    // load config: explicit path > ECHO_CONFIG env > ~/.echo/echo.toml
    let config_path = args.config.or_else(|| std::env::var("ECHO_CONFIG").ok());
    let config = EchoConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        EchoConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    echo_store::db::init_db(&db)?;
    info!("database migrations complete");

    let store = Arc::new(DeliveryStore::new(db));

    // The worker stays disabled (returning "Missing env") until both the
    // bearer secret and the mail provider key are present.
    let missing = config.missing_required();
    let dispatcher = if missing.is_empty() {
        let api_key = config.mailer.key.clone().unwrap_or_default();
        let mailer = ResendMailer::new(api_key, &config.mailer);
        let media = HmacMediaResolver::from_config(&config.media);
        Some(Arc::new(Dispatcher::new(
            Arc::clone(&store),
            Box::new(mailer),
            Box::new(media),
            &config.worker,
        )))
    } else {
        warn!(?missing, "delivery worker disabled until required settings are present");
        None
    };

    let state = Arc::new(app::AppState {
        config,
        store,
        dispatcher,
    });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("Echo gateway listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
