use std::sync::Arc;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursedrop::config::Config;
use coursedrop::db::{AppState, create_pool, init_db, queries};
use coursedrop::email::EmailService;
use coursedrop::handlers;
use coursedrop::models::to_iso8601;
use coursedrop::payments::StripeClient;
use coursedrop::tokens;

#[derive(Parser, Debug)]
#[command(name = "coursedrop")]
#[command(about = "Checkout relay and single-use download links for a paid course")]
struct Cli {
    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,

    /// Mint a download link for this email, print it and exit
    #[arg(long, value_name = "EMAIL")]
    issue: Option<String>,
}

/// Manual fulfilment: issue a token without going through checkout.
fn issue_from_cli(state: &AppState, email: &str) -> Result<(), String> {
    let conn = state
        .db
        .get()
        .map_err(|e| format!("Failed to get db connection: {}", e))?;

    let issued = tokens::issue(&conn, email, &state.download_base_url, queries::now())
        .map_err(|e| format!("Failed to issue download link: {}", e))?;

    println!();
    println!("============================================================");
    println!("DOWNLOAD LINK ISSUED");
    println!("============================================================");
    println!("Email:      {}", issued.email);
    println!("Link:       {}", issued.download_url);
    println!("Expires at: {}", to_iso8601(issued.expires_at));
    println!("============================================================");
    println!();

    Ok(())
}

fn remove_database_files(db_path: &str) {
    if let Err(e) = std::fs::remove_file(db_path) {
        tracing::warn!("Failed to remove {}: {}", db_path, e);
    } else {
        tracing::info!("Removed {}", db_path);
    }
    for suffix in ["-wal", "-shm"] {
        let path = format!("{}{}", db_path, suffix);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::debug!("Failed to remove {}: {}", path, e);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursedrop=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    if config.stripe.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set: checkout and webhook are disabled");
    }
    if config.service_api_key.is_none() {
        tracing::warn!("SERVICE_API_KEY not set: /generate-download-link rejects all requests");
    }

    let state = AppState {
        db: db_pool,
        download_base_url: config.download_base_url.clone(),
        resource_url: config.resource_url.clone(),
        service_api_key: config.service_api_key.clone(),
        stripe: config.stripe.as_ref().map(StripeClient::new),
        email_service: Arc::new(EmailService::new(
            config.resend_api_key.clone(),
            config.email_from.clone(),
        )),
    };

    if let Some(ref email) = cli.issue {
        if let Err(e) = issue_from_cli(&state, email) {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let app = handlers::router(state.clone(), Some(config.rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    if cli.ephemeral && !config.dev_mode {
        tracing::warn!("--ephemeral ignored: not in dev mode (set COURSEDROP_ENV=dev)");
    }
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("coursedrop listening on {}", addr);

    // Connect info feeds the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        remove_database_files(&config.database_path);
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
