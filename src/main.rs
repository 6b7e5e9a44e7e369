//! Service entry point: configuration, logging, state wiring, listener.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use formgate::config::{default_config, load_config};
use formgate::http::server::{self, AppState};
use formgate::lifecycle::{shutdown_signal, Shutdown};
use formgate::observability::{logging, metrics};
use formgate::services::{FormCorsPolicy, MemoryFormStore, MemorySubscriptionStore, MemoryUserStore};
use formgate::session::{spawn_sweeper, Role};

#[derive(Debug, Parser)]
#[command(name = "formgate", about = "Form collection service", version)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.config.as_deref().map(load_config).unwrap_or_else(default_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.app.env, &config.observability.log_level);
    tracing::info!(
        env = %config.app.env,
        bind_address = %config.app.bind_address(),
        "Starting formgate"
    );

    let metrics_handle = if config.observability.metrics_enabled {
        metrics::install()
    } else {
        None
    };

    // In-memory services with a seeded development account and demo form.
    // A persistent deployment swaps these behind the same traits.
    let users = Arc::new(MemoryUserStore::new().with_user(
        "demo@example.com",
        "Demo User",
        "demo-password",
        Role::User,
    ));
    let forms = Arc::new(MemoryFormStore::new().with_form(
        "demo",
        Some(FormCorsPolicy {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allowed_methods: vec!["POST".to_string(), "OPTIONS".to_string()],
            allow_credentials: false,
        }),
    ));
    let subscriptions = Arc::new(MemorySubscriptionStore::new());

    let state = AppState::new(config, users, forms, subscriptions, metrics_handle);

    let shutdown = Arc::new(Shutdown::new());
    spawn_sweeper(state.sessions.clone(), &shutdown);
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let listener = match TcpListener::bind(state.config.app.bind_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(
                bind_address = %state.config.app.bind_address(),
                error = %e,
                "Failed to bind listener"
            );
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(address = %state.config.app.bind_address(), "Listening");

    if let Err(e) = server::run(listener, state, shutdown).await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
