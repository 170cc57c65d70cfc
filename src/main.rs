mod backend;
mod config;
mod db;
mod dispatch;
mod error;
mod fallback;
mod prompts;
mod server;
mod service;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tracing::{error, info};

use crate::config::Config;
use crate::service::TaskService;
use crate::store::TaskStore;

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything reads env vars
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if args.iter().any(|a| a == "--default-config") {
        print!("{}", Config::default_config_contents());
        return;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            return;
        }
    };

    if let Err(e) = config.validate() {
        error!("invalid config: {e}");
        return;
    }

    if args.iter().any(|a| a == "--check") {
        run_checks(&config);
        return;
    }

    info!(
        bind = %config.server.bind,
        chat_model = %config.llm.chat_model,
        image_model = %config.image.model,
        "taskrelay starting"
    );

    // Open database
    let data_dir = Config::data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        error!("failed to create data dir {}: {e}", data_dir.display());
        return;
    }
    let db = match db::open(&data_dir.join("taskrelay.db")) {
        Ok(d) => d,
        Err(e) => {
            error!("failed to open database: {e}");
            return;
        }
    };
    let store = TaskStore::new(Arc::new(Mutex::new(db)));

    // Build the task service (fails fast without an API key)
    let service = match TaskService::new(&config, store) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("failed to initialize task service: {e}");
            return;
        }
    };

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start the API server
    let server_handle = {
        let config = config.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = server::serve(config, service, shutdown_rx).await {
                error!("server error: {e}");
                std::process::exit(1);
            }
        })
    };

    info!("taskrelay is running — press Ctrl+C to stop");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");

    info!("shutdown signal received, stopping...");
    let _ = shutdown_tx.send(());

    let _ = server_handle.await;
    info!("taskrelay stopped");
}

fn print_usage() {
    println!(
        "taskrelay — resilient AI task backend

USAGE:
    taskrelay [OPTIONS]

OPTIONS:
    --config <path>     Use the given config file
    --default-config    Print the default config file and exit
    --check             Validate config and environment, then exit
    -h, --help          Show this help

ENVIRONMENT:
    OPENROUTER_API_KEY  API key for the hosted model endpoint (required)
    API_PASSWORD        Password accepted by POST /token (required)
    JWT_SECRET          HS256 signing secret for issued tokens (required)
    RUST_LOG            Log filter (default: info)"
    );
}

fn run_checks(config: &Config) {
    info!("running pre-flight checks...");

    info!("config: OK");
    info!("  bind: {}", config.server.bind);
    info!("  base_url: {}", config.llm.base_url);
    info!(
        "  chat models: {} / {}",
        config.llm.chat_model, config.llm.chat_model_alternative
    );
    info!(
        "  image models: {} / {} ({})",
        config.image.model, config.image.model_alternative, config.image.size
    );

    for check in [
        Config::openrouter_api_key().map(|_| "OPENROUTER_API_KEY"),
        Config::api_password().map(|_| "API_PASSWORD"),
        Config::jwt_secret().map(|_| "JWT_SECRET"),
    ] {
        match check {
            Ok(name) => info!("{name}: set"),
            Err(e) => error!("{e}"),
        }
    }
}
